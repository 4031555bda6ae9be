// Copyright 2025 - Microlite
// Licensed under the Apache License, Version 2.0

//! # Microlite
//!
//! A setup and invocation harness for TFLite Micro style models on
//! constrained devices. The harness owns the narrow contract around an
//! embedded inference backend: it validates the model's schema version,
//! builds the operator resolver, plans tensor storage into a fixed-size
//! arena, and runs single forward passes, optionally timed.
//!
//! Graph execution itself (operator kernels, memory planning, tensor
//! formats) lives behind the [`GraphRuntime`] seam and is supplied by the
//! backend binding for the target platform.
//!
//! ```
//! use microlite::test_utils::{ModelBuilder, ScriptedRuntime};
//! use microlite::{setup_model, BuiltinOp, DType, OpResolver, SetupOptions, TensorSpec};
//!
//! let model = ModelBuilder::new(3)
//!     .operator(BuiltinOp::FullyConnected)
//!     .operator(BuiltinOp::Softmax)
//!     .build();
//!
//! let runtime = ScriptedRuntime::new(
//!     TensorSpec::new(DType::F32, &[1, 4]),
//!     TensorSpec::new(DType::F32, &[1, 1]),
//! );
//!
//! let mut interpreter = setup_model::<2, 4096, _, _>(
//!     &model,
//!     runtime,
//!     |capacity| {
//!         let mut resolver = OpResolver::with_capacity(capacity);
//!         resolver.register_builtin(BuiltinOp::FullyConnected)?;
//!         resolver.register_builtin(BuiltinOp::Softmax)?;
//!         Ok(resolver)
//!     },
//!     SetupOptions::default(),
//! )
//! .unwrap();
//!
//! interpreter.copy_input(&[0.1f32, 0.2, 0.3, 0.4]).unwrap();
//! interpreter.invoke().unwrap();
//! let scores = interpreter.output().data::<f32>().unwrap();
//! assert_eq!(scores.len(), 1);
//! ```

pub mod arena;
pub mod error;
pub mod interpreter;
pub mod model;
pub mod ops;
pub mod runtime;
pub mod tensor;
pub mod test_utils;

pub use arena::Arena;
pub use error::{MicroliteError, Result};
pub use interpreter::{setup_model, MicroInterpreter, SetupOptions};
pub use model::ModelInfo;
pub use ops::{registration_name, BuiltinOp, OpResolver, Operator};
pub use runtime::GraphRuntime;
pub use tensor::{DType, Element, TensorBinding, TensorLayout, TensorSpec, TensorView};

/// Schema revision of the serialized model format this build supports.
/// Models carrying any other version are rejected during setup.
pub const TFLITE_SCHEMA_VERSION: u32 = 3;

/// Arenas at or below this size refuse to build. The floor is far below any
/// real model's footprint; it exists to catch obviously wrong sizes early.
pub const MIN_ARENA_BYTES: usize = 100;
