/// Probe error types
use thiserror::Error;

pub type Result<T> = std::result::Result<T, ProbeError>;

#[derive(Debug, Error)]
pub enum ProbeError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Bad argument: {0}")]
    BadArgument(String),

    #[error("Device layer error: {0}")]
    Hal(#[from] ahal_core::HalError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ProbeError {
    /// Negative POSIX status code, used as the process exit status
    pub fn errno(&self) -> i32 {
        match self {
            Self::Hal(e) => e.errno(),
            Self::Config(_) | Self::BadArgument(_) => -22,
            Self::Io(_) => -5,
        }
    }
}
