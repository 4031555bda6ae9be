//! Tensor descriptions and typed views into arena storage.

use std::fmt;
use std::ops::Range;

use crate::error::{MicroliteError, Result};

/// Element type of a tensor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DType {
    F32,
    I8,
    U8,
    I16,
    I32,
}

impl DType {
    pub fn size(&self) -> usize {
        match self {
            Self::F32 | Self::I32 => 4,
            Self::I16 => 2,
            Self::I8 | Self::U8 => 1,
        }
    }

    pub fn align(&self) -> usize {
        self.size()
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::F32 => "f32",
            Self::I8 => "i8",
            Self::U8 => "u8",
            Self::I16 => "i16",
            Self::I32 => "i32",
        };
        write!(f, "{name}")
    }
}

mod sealed {
    pub trait Sealed {}
}

/// Rust element types a tensor view can be read as.
pub trait Element: sealed::Sealed + Copy {
    const DTYPE: DType;
}

macro_rules! elements {
    ($( $ty:ty => $dtype:expr; )+) => {
        $(
            impl sealed::Sealed for $ty {}
            impl Element for $ty {
                const DTYPE: DType = $dtype;
            }
        )+
    };
}

elements! {
    f32 => DType::F32;
    i8 => DType::I8;
    u8 => DType::U8;
    i16 => DType::I16;
    i32 => DType::I32;
}

/// Shape and element type of one tensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TensorSpec {
    pub dtype: DType,
    pub shape: Vec<usize>,
}

impl TensorSpec {
    pub fn new(dtype: DType, shape: &[usize]) -> Self {
        Self {
            dtype,
            shape: shape.to_vec(),
        }
    }

    pub fn elements(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn byte_len(&self) -> usize {
        self.elements() * self.dtype.size()
    }
}

/// A planned tensor's home in the arena.
#[derive(Debug, Clone)]
pub struct TensorBinding {
    pub spec: TensorSpec,
    pub range: Range<usize>,
}

/// Input and output tensors a backend reports after planning a model.
#[derive(Debug, Default)]
pub struct TensorLayout {
    pub inputs: Vec<TensorBinding>,
    pub outputs: Vec<TensorBinding>,
}

/// Read-only view of one tensor's storage.
pub struct TensorView<'a> {
    pub(crate) spec: &'a TensorSpec,
    pub(crate) bytes: &'a [u8],
}

impl<'a> TensorView<'a> {
    pub fn dtype(&self) -> DType {
        self.spec.dtype
    }

    pub fn shape(&self) -> &[usize] {
        &self.spec.shape
    }

    pub fn elements(&self) -> usize {
        self.spec.elements()
    }

    /// The tensor contents as typed elements. Fails when `T` does not match
    /// the tensor's element type.
    pub fn data<T: Element>(&self) -> Result<&'a [T]> {
        if T::DTYPE != self.spec.dtype {
            return Err(MicroliteError::InvalidInput(format!(
                "tensor holds {} elements, requested {}",
                self.spec.dtype,
                T::DTYPE
            )));
        }
        // SAFETY: reinterpreting plain numeric bytes; arena storage is
        // 8-byte aligned and every allocation is aligned to its element
        // size, so the view splits cleanly.
        let (head, data, tail) = unsafe { self.bytes.align_to::<T>() };
        if !head.is_empty() || !tail.is_empty() {
            return Err(MicroliteError::InvalidInput(format!(
                "tensor storage is not aligned for {} elements",
                T::DTYPE
            )));
        }
        Ok(data)
    }
}
