//! AHAL Device - shared device lifecycle
//!
//! Reference-counted lifecycle for audio devices shared by several streams.
//!
//! This crate provides:
//! - `DeviceLifecycle`: open / prepare / start / stop / close under one lock,
//!   activating the hardware once for any number of streams
//! - Two backend strategies (`AlsaBackend`, `GraphBackend`) behind the
//!   `DeviceBackend` trait, built by `DefaultBackendFactory`
//! - `DeviceRegistry`: owner of the per-codec device instances
//!
//! # Architecture
//!
//! The lifecycle never talks to hardware directly. The backend, the routing
//! path and the device names all come from collaborators defined in
//! `ahal-core`, so the state machine runs unchanged against real drivers or
//! test doubles.
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use ahal_core::{
//!     AudioRoute, BackendKind, DeviceAttributes, DeviceId, ResourceManager, Result, StreamHandle,
//! };
//! use ahal_device::{DefaultBackendFactory, DeviceRegistry, LifecycleState};
//!
//! struct Route;
//! impl AudioRoute for Route {
//!     fn enable_device(&self, _name: &str) -> Result<()> { Ok(()) }
//!     fn disable_device(&self, _name: &str) -> Result<()> { Ok(()) }
//! }
//!
//! struct Resources;
//! impl ResourceManager for Resources {
//!     fn backend_kind(&self) -> BackendKind { BackendKind::Alsa }
//!     fn active_streams(&self, _id: DeviceId) -> Result<Vec<StreamHandle>> { Ok(Vec::new()) }
//!     fn device_name(&self, id: DeviceId) -> Result<String> { Ok(id.to_string()) }
//!     fn audio_route(&self) -> Result<Arc<dyn AudioRoute>> { Ok(Arc::new(Route)) }
//! }
//!
//! # fn main() -> Result<()> {
//! let registry = DeviceRegistry::new(Arc::new(Resources), Arc::new(DefaultBackendFactory));
//! let speaker = registry.get_or_create(&DeviceAttributes::new(DeviceId::OutSpeaker))?;
//!
//! speaker.open()?;
//! speaker.start()?;
//! speaker.start()?;
//! assert_eq!(speaker.state(), LifecycleState::Started(2));
//!
//! speaker.stop()?;
//! speaker.stop()?;
//! speaker.close()?;
//! assert_eq!(speaker.state(), LifecycleState::Closed);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod backend;
pub mod lifecycle;
pub mod registry;

pub use backend::{AlsaBackend, DefaultBackendFactory, GraphBackend, GraphSession};
pub use lifecycle::{DeviceLifecycle, LifecycleState};
pub use registry::{CodecSlot, DeviceRegistry};
