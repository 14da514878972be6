// ahal-device/src/lifecycle.rs
//
// Reference-counted open/start/stop/close state machine of one device instance

use std::sync::Arc;

use ahal_core::{
    AudioRoute, BackendFactory, BackendKind, DeviceAttributes, DeviceBackend, DeviceId, HalError,
    ResourceManager, Result,
};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info, warn};

/// Observable state of a device instance
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "streams", rename_all = "lowercase")]
pub enum LifecycleState {
    /// No backend allocated
    Closed,

    /// Backend open, no stream running
    Opened,

    /// Backend running for `n` streams
    Started(u32),
}

/// Routing path enabled by the first `start`, disabled by the last `stop`
struct ActiveRoute {
    route: Arc<dyn AudioRoute>,
    device_name: String,
}

struct Inner {
    attributes: DeviceAttributes,
    ref_count: u32,
    backend: Option<Box<dyn DeviceBackend>>,
    active_route: Option<ActiveRoute>,
}

/// Shared device instance
///
/// Every stream routed through the device calls `start`/`stop`; the hardware
/// is activated by the first `start` and deactivated by the last `stop`. Each
/// transition runs entirely under the instance lock and mutates shared state
/// only after every hardware step has succeeded.
///
/// The backend strategy is read from the resource manager once, at
/// construction, and every reopen uses the same kind.
pub struct DeviceLifecycle {
    resources: Arc<dyn ResourceManager>,
    backend_kind: BackendKind,
    factory: Arc<dyn BackendFactory>,
    inner: Mutex<Inner>,
}

impl DeviceLifecycle {
    pub fn new(
        attributes: DeviceAttributes,
        resources: Arc<dyn ResourceManager>,
        factory: Arc<dyn BackendFactory>,
    ) -> Self {
        Self {
            backend_kind: resources.backend_kind(),
            resources,
            factory,
            inner: Mutex::new(Inner {
                attributes,
                ref_count: 0,
                backend: None,
                active_route: None,
            }),
        }
    }

    /// Strategy every open of this instance builds
    pub fn backend_kind(&self) -> BackendKind {
        self.backend_kind
    }

    pub fn id(&self) -> DeviceId {
        self.inner.lock().attributes.id
    }

    /// Copy of the device attributes
    pub fn attributes(&self) -> DeviceAttributes {
        self.inner.lock().attributes.clone()
    }

    /// Replace the device attributes; only allowed while no backend is open
    pub fn set_attributes(&self, attributes: DeviceAttributes) -> Result<()> {
        let mut inner = self.inner.lock();
        if inner.backend.is_some() {
            return Err(HalError::invalid_state(format!(
                "{} is open, attributes are fixed until close",
                inner.attributes.id
            )));
        }
        inner.attributes = attributes;
        Ok(())
    }

    pub fn state(&self) -> LifecycleState {
        let inner = self.inner.lock();
        match (inner.backend.is_some(), inner.ref_count) {
            (false, _) => LifecycleState::Closed,
            (true, 0) => LifecycleState::Opened,
            (true, n) => LifecycleState::Started(n),
        }
    }

    pub fn reference_count(&self) -> u32 {
        self.inner.lock().ref_count
    }

    pub fn is_initialized(&self) -> bool {
        self.inner.lock().backend.is_some()
    }

    /// Allocate and open the backend; no-op if already open
    ///
    /// # Errors
    /// Returns the factory or backend error; the device stays closed.
    pub fn open(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let id = inner.attributes.id;
        if inner.backend.is_some() {
            debug!("{}: already open", id);
            return Ok(());
        }

        let kind = self.backend_kind;
        let mut backend = self.factory.create(kind).map_err(|e| {
            error!("{}: failed to create {} backend: {}", id, kind.name(), e);
            e
        })?;
        if backend.kind() != kind {
            error!("{}: factory built {} backend, wanted {}", id, backend.kind().name(), kind.name());
            return Err(HalError::AllocationFailure(format!(
                "no {} backend for {id}",
                kind.name()
            )));
        }
        if let Err(e) = backend.open(&inner.attributes, &self.resources) {
            error!("{}: {} backend open failed: {}", id, kind.name(), e);
            return Err(e);
        }
        inner.backend = Some(backend);

        match self.resources.active_streams(id) {
            Ok(streams) => {
                for stream in &streams {
                    debug!("{}: active {}", id, stream);
                }
            }
            Err(e) => warn!("{}: could not list active streams: {}", id, e),
        }

        info!("{}: opened with {} backend", id, kind.name());
        Ok(())
    }

    /// Release the backend once no stream uses the device
    ///
    /// A no-op while streams are running or when the device is not open. If
    /// the backend fails to close it stays owned so the caller can retry.
    pub fn close(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let id = inner.attributes.id;
        if inner.ref_count > 0 {
            debug!("{}: close deferred, {} stream(s) active", id, inner.ref_count);
            return Ok(());
        }
        let Some(backend) = inner.backend.as_mut() else {
            debug!("{}: close on closed device", id);
            return Ok(());
        };

        backend.close().map_err(|e| {
            error!("{}: backend close failed: {}", id, e);
            e
        })?;
        inner.backend = None;
        info!("{}: closed", id);
        Ok(())
    }

    /// Prepare the backend; a no-op while the device is already running
    pub fn prepare(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let id = inner.attributes.id;
        if inner.ref_count > 0 {
            debug!("{}: running, prepare skipped", id);
            return Ok(());
        }
        let backend = inner
            .backend
            .as_mut()
            .ok_or_else(|| HalError::invalid_state(format!("{id} prepared before open")))?;

        backend.prepare().map_err(|e| {
            error!("{}: backend prepare failed: {}", id, e);
            e
        })
    }

    /// Join the device; the first caller activates the hardware
    ///
    /// # Errors
    /// - `InvalidState` if the device is not open
    /// - any routing or backend error from activation; the reference count is
    ///   unchanged and an enabled routing path is disabled again
    pub fn start(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let id = inner.attributes.id;
        if inner.backend.is_none() {
            return Err(HalError::invalid_state(format!("{id} started before open")));
        }

        if inner.ref_count > 0 {
            inner.ref_count = inner
                .ref_count
                .checked_add(1)
                .ok_or_else(|| HalError::invalid_state(format!("{id} reference count overflow")))?;
            debug!("{}: joined, {} stream(s)", id, inner.ref_count);
            return Ok(());
        }

        let route = self.resources.audio_route()?;
        let device_name = self.resources.device_name(id)?;
        route.enable_device(&device_name).map_err(|e| {
            error!("{}: enabling route '{}' failed: {}", id, device_name, e);
            e
        })?;

        let activated = match inner.backend.as_mut() {
            Some(backend) => backend.prepare().and_then(|()| backend.start()),
            None => Err(HalError::invalid_state(format!("{id} lost its backend"))),
        };
        if let Err(e) = activated {
            error!("{}: activation failed: {}", id, e);
            if let Err(rollback) = route.disable_device(&device_name) {
                warn!("{}: disabling route '{}' after failure: {}", id, device_name, rollback);
            }
            return Err(e);
        }

        inner.active_route = Some(ActiveRoute { route, device_name });
        inner.ref_count = 1;
        info!("{}: started", id);
        Ok(())
    }

    /// Leave the device; the last caller deactivates the hardware
    ///
    /// # Errors
    /// - `InvalidState` if no stream is running
    /// - a backend stop error, with the reference count unchanged
    /// - a route disable error, reported after the device has stopped
    pub fn stop(&self) -> Result<()> {
        let mut inner = self.inner.lock();
        let id = inner.attributes.id;

        match inner.ref_count {
            0 => Err(HalError::invalid_state(format!("{id} stopped while not started"))),
            1 => {
                let backend = inner
                    .backend
                    .as_mut()
                    .ok_or_else(|| HalError::invalid_state(format!("{id} lost its backend")))?;
                backend.stop().map_err(|e| {
                    error!("{}: backend stop failed: {}", id, e);
                    e
                })?;
                inner.ref_count = 0;
                info!("{}: stopped", id);

                if let Some(active) = inner.active_route.take() {
                    active
                        .route
                        .disable_device(&active.device_name)
                        .map_err(|e| {
                            warn!("{}: disabling route '{}' failed: {}", id, active.device_name, e);
                            e
                        })?;
                }
                Ok(())
            }
            n => {
                inner.ref_count = n - 1;
                debug!("{}: left, {} stream(s)", id, inner.ref_count);
                Ok(())
            }
        }
    }
}

impl std::fmt::Debug for DeviceLifecycle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("DeviceLifecycle")
            .field("id", &inner.attributes.id)
            .field("ref_count", &inner.ref_count)
            .field("initialized", &inner.backend.is_some())
            .finish_non_exhaustive()
    }
}
