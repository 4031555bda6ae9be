//! Fixed-size tensor arena.
//!
//! All tensor and intermediate storage for one interpreter comes out of a
//! single region allocated once at setup and never resized. The right size
//! for a given model is discovered empirically: setup reports usage in
//! debug mode so the caller can shrink the compile-time size across builds.

use std::ops::Range;

use crate::error::{MicroliteError, Result};
use crate::tensor::{TensorBinding, TensorSpec};

/// Bump allocator over a fixed byte region.
///
/// Allocations hand out ranges into the region rather than references, so
/// tensor bindings stay plain data and the interpreter keeps sole ownership
/// of the storage.
pub struct Arena {
    // Backing store is u64 so every tensor element type stays aligned no
    // matter where an allocation starts relative to the base pointer.
    buf: Box<[u64]>,
    capacity: usize,
    used: usize,
}

impl Arena {
    pub(crate) fn with_capacity(capacity: usize) -> Self {
        let words = capacity.div_ceil(8);
        Self {
            buf: vec![0u64; words].into_boxed_slice(),
            capacity,
            used: 0,
        }
    }

    /// Reserve `size` bytes aligned to `align`, bumping the high-water mark.
    pub fn alloc(&mut self, size: usize, align: usize) -> Result<Range<usize>> {
        debug_assert!(align.is_power_of_two());
        let start = self.used.next_multiple_of(align);
        let end = start.checked_add(size).unwrap_or(usize::MAX);
        if end > self.capacity {
            return Err(MicroliteError::ArenaExhausted {
                needed: size,
                remaining: self.capacity.saturating_sub(self.used),
                capacity: self.capacity,
            });
        }
        self.used = end;
        Ok(start..end)
    }

    /// Reserve storage for one tensor, aligned to its element type.
    pub fn alloc_tensor(&mut self, spec: &TensorSpec) -> Result<TensorBinding> {
        let range = self.alloc(spec.byte_len(), spec.dtype.align())?;
        Ok(TensorBinding {
            spec: spec.clone(),
            range,
        })
    }

    /// Bytes consumed so far, including alignment padding.
    pub fn used(&self) -> usize {
        self.used
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn bytes(&self, range: Range<usize>) -> &[u8] {
        &self.as_bytes()[range]
    }

    pub fn bytes_mut(&mut self, range: Range<usize>) -> &mut [u8] {
        let bytes = unsafe {
            // SAFETY: u64 storage reinterpreted as bytes; capacity never
            // exceeds the allocation.
            std::slice::from_raw_parts_mut(self.buf.as_mut_ptr().cast::<u8>(), self.capacity)
        };
        &mut bytes[range]
    }

    fn as_bytes(&self) -> &[u8] {
        unsafe {
            // SAFETY: u64 storage reinterpreted as bytes; capacity never
            // exceeds the allocation.
            std::slice::from_raw_parts(self.buf.as_ptr().cast::<u8>(), self.capacity)
        }
    }
}
