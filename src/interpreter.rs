//! Model setup and invocation.
//!
//! [`setup_model`] runs the one-time initialization sequence: schema
//! validation, operator registration, arena construction, and tensor
//! allocation. It returns an owned [`MicroInterpreter`] that is threaded
//! explicitly through every subsequent call; there is no process-wide
//! state, and independent model instances coexist freely.
//!
//! The operator count and arena size are compile-time parameters of the
//! setup call. The arena's real requirement for a given model is only
//! discoverable empirically, so setup reports usage in debug mode and the
//! caller adjusts the constant across rebuilds.

use std::time::Instant;

use log::{error, info, warn};

use crate::arena::Arena;
use crate::error::{MicroliteError, Result};
use crate::model::ModelInfo;
use crate::ops::OpResolver;
use crate::runtime::GraphRuntime;
use crate::tensor::{Element, TensorBinding, TensorView};
use crate::{MIN_ARENA_BYTES, TFLITE_SCHEMA_VERSION};

/// Options for [`setup_model`].
#[derive(Debug, Clone, Copy, Default)]
pub struct SetupOptions {
    /// Report arena consumption after setup and time each invocation.
    pub debug: bool,
}

struct StaticChecks<const OPS: usize, const ARENA_BYTES: usize>;

impl<const OPS: usize, const ARENA_BYTES: usize> StaticChecks<OPS, ARENA_BYTES> {
    const VALID: () = {
        assert!(
            OPS > 0,
            "the number of operators in the model is 0 (which seems wrong)"
        );
        assert!(
            ARENA_BYTES > MIN_ARENA_BYTES,
            "the arena size is too small (<100 bytes)"
        );
    };
}

/// Initialize a model for inference.
///
/// `OPS` is the number of operators the model uses and `ARENA_BYTES` the
/// size of the tensor arena; both are validated at compile time.
/// `build_resolver` receives `OPS` as the table capacity and returns the
/// populated operator table, so only the kernels this model needs are
/// linked in.
///
/// The model blob must outlive the returned interpreter; the borrow
/// enforces it.
///
/// A zero operator count refuses to build:
///
/// ```compile_fail
/// use microlite::test_utils::{ModelBuilder, ScriptedRuntime};
/// use microlite::{setup_model, DType, OpResolver, SetupOptions, TensorSpec};
///
/// let model = ModelBuilder::new(3).builtin(9).build();
/// let runtime = ScriptedRuntime::new(
///     TensorSpec::new(DType::F32, &[1]),
///     TensorSpec::new(DType::F32, &[1]),
/// );
/// let _ = setup_model::<0, 4096, _, _>(
///     &model,
///     runtime,
///     |n| Ok(OpResolver::with_capacity(n)),
///     SetupOptions::default(),
/// );
/// ```
///
/// So does an arena at or below the 100-byte floor:
///
/// ```compile_fail
/// use microlite::test_utils::{ModelBuilder, ScriptedRuntime};
/// use microlite::{setup_model, DType, OpResolver, SetupOptions, TensorSpec};
///
/// let model = ModelBuilder::new(3).builtin(9).build();
/// let runtime = ScriptedRuntime::new(
///     TensorSpec::new(DType::F32, &[1]),
///     TensorSpec::new(DType::F32, &[1]),
/// );
/// let _ = setup_model::<1, 64, _, _>(
///     &model,
///     runtime,
///     |n| Ok(OpResolver::with_capacity(n)),
///     SetupOptions::default(),
/// );
/// ```
pub fn setup_model<'m, const OPS: usize, const ARENA_BYTES: usize, R, F>(
    model_bytes: &'m [u8],
    runtime: R,
    build_resolver: F,
    options: SetupOptions,
) -> Result<MicroInterpreter<'m, R>>
where
    R: GraphRuntime,
    F: FnOnce(usize) -> Result<OpResolver>,
{
    let () = StaticChecks::<OPS, ARENA_BYTES>::VALID;

    let info = ModelInfo::parse(model_bytes)?;
    if info.schema_version != TFLITE_SCHEMA_VERSION {
        error!(
            "Model provided is schema version {} not equal to supported version {}.",
            info.schema_version, TFLITE_SCHEMA_VERSION
        );
        return Err(MicroliteError::SchemaVersion {
            found: info.schema_version,
            supported: TFLITE_SCHEMA_VERSION,
        });
    }

    let resolver = build_resolver(OPS)?;
    if resolver.is_empty() {
        warn!("Resolver registered no operators.");
    }
    for op in &info.operators {
        if !resolver.contains(op) {
            error!("Operator {op} is required by the model but missing from the resolver.");
            return Err(MicroliteError::MissingOperator(op.to_string()));
        }
    }

    let mut runtime = runtime;
    let mut arena = Arena::with_capacity(ARENA_BYTES);
    let layout = runtime
        .allocate_tensors(model_bytes, &info, &resolver, &mut arena)
        .inspect_err(|_| {
            error!("Tensor allocation failed, the arena size is (probably) too small.");
        })?;

    if options.debug {
        info!(
            "Arena used {} of {} bytes.",
            arena.used(),
            arena.capacity()
        );
    }

    if layout.inputs.len() != 1 || layout.outputs.len() != 1 {
        error!(
            "Model exposes {} input and {} output tensors, expected exactly one of each.",
            layout.inputs.len(),
            layout.outputs.len()
        );
        return Err(MicroliteError::UnsupportedIoArity {
            inputs: layout.inputs.len(),
            outputs: layout.outputs.len(),
        });
    }
    let mut layout = layout;
    let output = layout.outputs.remove(0);
    let input = layout.inputs.remove(0);

    Ok(MicroInterpreter {
        model: model_bytes,
        info,
        resolver,
        arena,
        runtime,
        input,
        output,
        debug: options.debug,
    })
}

/// An initialized model: the executable binding of model, resolver, and
/// arena, reused for every inference call.
pub struct MicroInterpreter<'m, R: GraphRuntime> {
    model: &'m [u8],
    info: ModelInfo,
    resolver: OpResolver,
    arena: Arena,
    runtime: R,
    input: TensorBinding,
    output: TensorBinding,
    debug: bool,
}

impl<'m, R: GraphRuntime> MicroInterpreter<'m, R> {
    /// Run one forward pass over the input previously written with
    /// [`Self::copy_input`]. After a failed invocation the output tensor's
    /// contents are undefined and must not be trusted.
    pub fn invoke(&mut self) -> Result<()> {
        let started = self.debug.then(Instant::now);

        if let Err(err) = self.runtime.invoke(self.model, &mut self.arena) {
            error!("Invoke failed.");
            return Err(err);
        }

        if let Some(started) = started {
            info!("Invoke completed in {} us.", started.elapsed().as_micros());
        }
        Ok(())
    }

    /// Write input data into the model's input tensor.
    pub fn copy_input<T: Element>(&mut self, data: &[T]) -> Result<()> {
        let spec = &self.input.spec;
        if T::DTYPE != spec.dtype {
            return Err(MicroliteError::InvalidInput(format!(
                "input tensor holds {} elements, got {}",
                spec.dtype,
                T::DTYPE
            )));
        }
        if data.len() != spec.elements() {
            return Err(MicroliteError::InvalidInput(format!(
                "expected {} elements for the input tensor, got {}",
                spec.elements(),
                data.len()
            )));
        }

        // SAFETY: Element types are plain numeric data.
        let src = unsafe {
            std::slice::from_raw_parts(data.as_ptr().cast::<u8>(), std::mem::size_of_val(data))
        };
        self.arena
            .bytes_mut(self.input.range.clone())
            .copy_from_slice(src);
        Ok(())
    }

    /// View of the model's input tensor.
    pub fn input(&self) -> TensorView<'_> {
        TensorView {
            spec: &self.input.spec,
            bytes: self.arena.bytes(self.input.range.clone()),
        }
    }

    /// View of the model's output tensor.
    pub fn output(&self) -> TensorView<'_> {
        TensorView {
            spec: &self.output.spec,
            bytes: self.arena.bytes(self.output.range.clone()),
        }
    }

    /// Arena bytes actually consumed by tensor allocation. Compare against
    /// the compile-time arena size to right-size it.
    pub fn arena_used_bytes(&self) -> usize {
        self.arena.used()
    }

    pub fn arena_capacity(&self) -> usize {
        self.arena.capacity()
    }

    pub fn model_info(&self) -> &ModelInfo {
        &self.info
    }

    pub fn resolver(&self) -> &OpResolver {
        &self.resolver
    }

    /// The backend, mainly useful for inspecting fakes in tests.
    pub fn runtime(&self) -> &R {
        &self.runtime
    }
}
