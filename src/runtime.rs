//! The seam to the inference backend.
//!
//! Everything hard lives on the far side of this trait: kernel
//! implementations, tensor graph execution, and the memory plan that packs
//! intermediate tensors into the arena. The harness stays a thin contract
//! around it, so any engine binding for the target platform can slot in,
//! and tests run against the scripted fake in [`crate::test_utils`].

use crate::arena::Arena;
use crate::error::Result;
use crate::model::ModelInfo;
use crate::ops::OpResolver;
use crate::tensor::TensorLayout;

/// A graph-execution engine bound to one model.
pub trait GraphRuntime {
    /// Plan storage for every tensor the graph needs inside `arena` and
    /// report the graph's input and output tensors.
    ///
    /// `resolver` names the kernels the backend may use; `model` is the raw
    /// blob for backends that walk the graph themselves. Planning more
    /// bytes than the arena holds must fail with the arena's error rather
    /// than spilling to other storage.
    fn allocate_tensors(
        &mut self,
        model: &[u8],
        info: &ModelInfo,
        resolver: &OpResolver,
        arena: &mut Arena,
    ) -> Result<TensorLayout>;

    /// Run one forward pass. Input tensor contents have been written into
    /// the arena at the ranges reported by [`Self::allocate_tensors`];
    /// output contents are only meaningful when this returns `Ok`.
    fn invoke(&mut self, model: &[u8], arena: &mut Arena) -> Result<()>;
}
