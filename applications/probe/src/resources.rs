/// Resource manager and routing collaborators backed by the probe config
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::sync::Arc;

use ahal_core::{AudioRoute, BackendKind, DeviceId, HalError, ResourceManager, StreamHandle};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use crate::config::ProbeConfig;

/// Mixer path state
///
/// Enabling a path twice, or disabling one that is not enabled, is reported
/// as `InvalidState` so unbalanced routing shows up in the probe output.
#[derive(Debug, Default)]
pub struct MixerRoute {
    enabled: Mutex<BTreeSet<String>>,
}

impl MixerRoute {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self, device_name: &str) -> bool {
        self.enabled.lock().contains(device_name)
    }

    /// Currently enabled paths, sorted
    pub fn enabled_paths(&self) -> Vec<String> {
        self.enabled.lock().iter().cloned().collect()
    }
}

impl AudioRoute for MixerRoute {
    fn enable_device(&self, device_name: &str) -> ahal_core::Result<()> {
        if !self.enabled.lock().insert(device_name.to_string()) {
            return Err(HalError::invalid_state(format!(
                "route '{device_name}' already enabled"
            )));
        }
        info!("Route '{}' enabled", device_name);
        Ok(())
    }

    fn disable_device(&self, device_name: &str) -> ahal_core::Result<()> {
        if !self.enabled.lock().remove(device_name) {
            return Err(HalError::invalid_state(format!(
                "route '{device_name}' is not enabled"
            )));
        }
        info!("Route '{}' disabled", device_name);
        Ok(())
    }
}

/// Device names, backend switch and active-stream bookkeeping
pub struct ProbeResources {
    backend: BackendKind,
    names: BTreeMap<DeviceId, String>,
    route: Arc<MixerRoute>,
    streams: RwLock<HashMap<DeviceId, Vec<StreamHandle>>>,
}

impl ProbeResources {
    pub fn new(backend: BackendKind, names: BTreeMap<DeviceId, String>) -> Self {
        Self {
            backend,
            names,
            route: Arc::new(MixerRoute::new()),
            streams: RwLock::new(HashMap::new()),
        }
    }

    pub fn from_config(config: &ProbeConfig) -> Self {
        Self::new(config.backend, config.device_name_table())
    }

    pub fn route(&self) -> &Arc<MixerRoute> {
        &self.route
    }

    /// Record `stream` as routed through `device`
    pub fn register_stream(&self, device: DeviceId, stream: StreamHandle) {
        debug!("{} registered on {}", stream, device);
        self.streams.write().entry(device).or_default().push(stream);
    }

    /// Forget `stream`; returns true if it was registered on `device`
    pub fn unregister_stream(&self, device: DeviceId, stream: StreamHandle) -> bool {
        let mut streams = self.streams.write();
        let Some(handles) = streams.get_mut(&device) else {
            return false;
        };
        let before = handles.len();
        handles.retain(|h| *h != stream);
        before != handles.len()
    }
}

impl ResourceManager for ProbeResources {
    fn backend_kind(&self) -> BackendKind {
        self.backend
    }

    fn active_streams(&self, device: DeviceId) -> ahal_core::Result<Vec<StreamHandle>> {
        Ok(self
            .streams
            .read()
            .get(&device)
            .cloned()
            .unwrap_or_default())
    }

    fn device_name(&self, device: DeviceId) -> ahal_core::Result<String> {
        self.names
            .get(&device)
            .cloned()
            .ok_or_else(|| HalError::not_found("device name", device.as_str()))
    }

    fn audio_route(&self) -> ahal_core::Result<Arc<dyn AudioRoute>> {
        let route: Arc<dyn AudioRoute> = self.route.clone();
        Ok(route)
    }
}
