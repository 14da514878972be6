//! AHAL Probe Library
//!
//! Configuration and collaborator wiring for the `ahal-probe` tool, which
//! dumps USB capabilities, runs format negotiation and exercises the device
//! lifecycle outside of an audio server.
//!
//! This library exposes the components for testing purposes.

pub mod config;
pub mod error;
pub mod resources;

// Re-export commonly used types for convenience
pub use config::ProbeConfig;
pub use error::{ProbeError, Result};
pub use resources::{MixerRoute, ProbeResources};
