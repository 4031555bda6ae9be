//! Error types for the microlite setup and invocation harness

use thiserror::Error;

/// Result type alias for microlite operations
pub type Result<T> = std::result::Result<T, MicroliteError>;

/// Error types for model setup and invocation
#[derive(Error, Debug)]
pub enum MicroliteError {
    /// The model blob was built for a different schema revision than this
    /// harness supports. Recoverable only by supplying a compatible model.
    #[error("model provided is schema version {found} not equal to supported version {supported}")]
    SchemaVersion { found: u32, supported: u32 },

    #[error("malformed model: {0}")]
    MalformedModel(String),

    #[error("operator resolver error: {0}")]
    Resolver(String),

    /// The model references an operator the resolver never registered.
    #[error("model requires operator {0} which is not registered in the resolver")]
    MissingOperator(String),

    /// The arena cannot satisfy a tensor allocation. Recoverable only by
    /// rebuilding with a larger compile-time arena size.
    #[error("arena exhausted: {needed} bytes requested with {remaining} of {capacity} remaining")]
    ArenaExhausted {
        needed: usize,
        remaining: usize,
        capacity: usize,
    },

    #[error("tensor allocation failed: {0}")]
    AllocateTensors(String),

    /// Only single-input, single-output models are supported by this layer.
    #[error("model exposes {inputs} input and {outputs} output tensors; exactly one of each is supported")]
    UnsupportedIoArity { inputs: usize, outputs: usize },

    #[error("invalid input: {0}")]
    InvalidInput(String),

    #[error("invoke failed: {0}")]
    InvokeFailed(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
