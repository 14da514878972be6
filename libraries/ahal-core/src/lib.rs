//! AHAL Core
//!
//! Shared types, traits, and error handling for the audio device layer.
//!
//! # Architecture
//!
//! The core crate defines:
//! - **Domain Types**: `Direction`, `DeviceId`, `DeviceAddress`, `MediaConfig`,
//!   `StreamAttributes`, `DeviceAttributes`
//! - **Collaborator Traits**: `DeviceBackend`, `BackendFactory`, `AudioRoute`,
//!   `ResourceManager`, `CapabilityReader`
//! - **Error Handling**: Unified `HalError` and `Result` types
//!
//! # Example
//!
//! ```rust
//! use ahal_core::{DeviceAttributes, DeviceId, Direction, StreamAttributes};
//!
//! let device = DeviceAttributes::new(DeviceId::OutSpeaker);
//! assert_eq!(device.direction(), Direction::Playback);
//!
//! let request = StreamAttributes::new(Direction::Playback, 48_000, 24, 2);
//! assert_eq!(request.ch_info.channels, 2);
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod traits;
pub mod types;

pub use error::{HalError, Result};
pub use traits::{AudioRoute, BackendFactory, CapabilityReader, DeviceBackend, ResourceManager};
pub use types::{
    BackendKind, ChannelInfo, ChannelMask, ChannelPosition, DeviceAddress, DeviceAttributes,
    DeviceId, Direction, MediaConfig, PcmFormat, StreamAttributes, StreamHandle,
};
