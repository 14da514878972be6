// ahal-usb/src/reader.rs
//
// Capability descriptor sources

use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use ahal_core::{CapabilityReader, DeviceAddress, HalError, Result};
use parking_lot::RwLock;
use tracing::debug;

/// Default procfs root for ALSA cards
pub const DEFAULT_PROCFS_ROOT: &str = "/proc/asound";

/// Reads `<root>/card<N>/stream<D>` descriptors
#[derive(Debug, Clone)]
pub struct ProcfsReader {
    root: PathBuf,
}

impl ProcfsReader {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Descriptor path of a card address
    pub fn descriptor_path(&self, address: &DeviceAddress) -> PathBuf {
        self.root
            .join(format!("card{}", address.card))
            .join(format!("stream{}", address.device))
    }
}

impl Default for ProcfsReader {
    fn default() -> Self {
        Self::new(DEFAULT_PROCFS_ROOT)
    }
}

impl CapabilityReader for ProcfsReader {
    fn read_descriptor(&self, address: &DeviceAddress) -> Result<String> {
        let path = self.descriptor_path(address);
        debug!("Reading capability descriptor {}", path.display());

        std::fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => {
                HalError::not_found("capability descriptor", path.display().to_string())
            }
            _ => HalError::Io(e),
        })
    }
}

/// In-memory descriptors, keyed by address
#[derive(Debug, Default)]
pub struct StaticReader {
    blobs: RwLock<HashMap<DeviceAddress, String>>,
}

impl StaticReader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register the descriptor text of `address`
    pub fn insert(&self, address: DeviceAddress, descriptor: impl Into<String>) {
        self.blobs.write().insert(address, descriptor.into());
    }

    pub fn remove(&self, address: &DeviceAddress) -> Option<String> {
        self.blobs.write().remove(address)
    }
}

impl CapabilityReader for StaticReader {
    fn read_descriptor(&self, address: &DeviceAddress) -> Result<String> {
        self.blobs
            .read()
            .get(address)
            .cloned()
            .ok_or_else(|| HalError::not_found("capability descriptor", address.to_string()))
    }
}
