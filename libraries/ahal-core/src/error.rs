/// Core error types for the AHAL device layer
use thiserror::Error;

use crate::types::Direction;

/// Result type alias using `HalError`
pub type Result<T> = std::result::Result<T, HalError>;

// POSIX errno values surfaced to callers as negative integers.
const ENOENT: i32 = 2;
const EIO: i32 = 5;
const ENOMEM: i32 = 12;
const ENODEV: i32 = 19;
const EINVAL: i32 = 22;
const EOPNOTSUPP: i32 = 95;

/// Core error type for capability negotiation and device lifecycle
#[derive(Error, Debug)]
pub enum HalError {
    /// Resource exhaustion while constructing a backend or buffer
    #[error("Allocation failed: {0}")]
    AllocationFailure(String),

    /// Operation attempted on a null or uninitialized handle
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Requested entity (address, rate, cache entry) does not exist
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// No capability model matches the requested direction
    #[error("No {0} device capability available")]
    NoDevice(Direction),

    /// Capability descriptor is missing an expected section
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Descriptor malformed, or the request names something the platform cannot do
    #[error("Unsupported: {0}")]
    Unsupported(String),

    /// Underlying hardware/DSP call returned nonzero
    #[error("Backend {operation} failed with status {code}")]
    BackendFailure {
        operation: &'static str,
        code: i32,
    },

    /// I/O errors (descriptor reads)
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl HalError {
    /// Create an invalid state error
    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState(msg.into())
    }

    /// Create a not found error
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    /// Create a parse error
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    /// Create an unsupported error
    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported(msg.into())
    }

    /// Create a backend failure from a raw status code
    pub fn backend(operation: &'static str, code: i32) -> Self {
        Self::BackendFailure { operation, code }
    }

    /// Negative POSIX status code for this error
    pub fn errno(&self) -> i32 {
        match self {
            Self::AllocationFailure(_) => -ENOMEM,
            Self::InvalidState(_) | Self::ParseError(_) => -EINVAL,
            Self::NotFound { .. } => -ENOENT,
            Self::NoDevice(_) => -ENODEV,
            Self::Unsupported(_) => -EOPNOTSUPP,
            Self::BackendFailure { code, .. } if *code < 0 => *code,
            Self::BackendFailure { .. } | Self::Io(_) => -EIO,
        }
    }
}
