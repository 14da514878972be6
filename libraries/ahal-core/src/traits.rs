/// Collaborator traits for the AHAL device layer
use std::sync::Arc;

use crate::error::Result;
use crate::types::{BackendKind, DeviceAddress, DeviceAttributes, DeviceId, StreamHandle};

/// Hardware backend
///
/// Implementers program the actual hardware (PCM, mixer controls, DSP graph)
/// for one device instance. Calls arrive serialized by the owning lifecycle.
pub trait DeviceBackend: Send {
    /// Open the backend against the device attributes
    ///
    /// # Errors
    /// Returns an error if the hardware cannot be opened
    fn open(
        &mut self,
        attributes: &DeviceAttributes,
        resources: &Arc<dyn ResourceManager>,
    ) -> Result<()>;

    /// Release the hardware
    fn close(&mut self) -> Result<()>;

    /// Prepare the hardware for streaming
    fn prepare(&mut self) -> Result<()>;

    /// Start streaming
    fn start(&mut self) -> Result<()>;

    /// Stop streaming
    fn stop(&mut self) -> Result<()>;

    /// Strategy this backend implements
    fn kind(&self) -> BackendKind;
}

/// Constructs backend strategies
pub trait BackendFactory: Send + Sync {
    /// Build a fresh, unopened backend of the given kind
    ///
    /// # Errors
    /// Returns `AllocationFailure` if the backend cannot be constructed
    fn create(&self, kind: BackendKind) -> Result<Box<dyn DeviceBackend>>;
}

/// Audio routing (mixer path) collaborator
///
/// Not idempotent: callers must not enable a path twice.
pub trait AudioRoute: Send + Sync {
    /// Enable the signal path named `device_name`
    fn enable_device(&self, device_name: &str) -> Result<()>;

    /// Disable the signal path named `device_name`
    fn disable_device(&self, device_name: &str) -> Result<()>;
}

/// Device / stream registry collaborator
pub trait ResourceManager: Send + Sync {
    /// Process-wide backend switch
    fn backend_kind(&self) -> BackendKind;

    /// Streams currently routed through `device`
    fn active_streams(&self, device: DeviceId) -> Result<Vec<StreamHandle>>;

    /// Backend (ALSA mixer path) name of a device
    fn device_name(&self, device: DeviceId) -> Result<String>;

    /// Shared routing handle; owned by the resource manager
    fn audio_route(&self) -> Result<Arc<dyn AudioRoute>>;
}

/// Source of raw capability descriptors
pub trait CapabilityReader: Send + Sync {
    /// Read the capability descriptor text of the card at `address`
    ///
    /// # Errors
    /// Returns `NotFound` or `Io` if no descriptor exists for the address
    fn read_descriptor(&self, address: &DeviceAddress) -> Result<String>;
}
