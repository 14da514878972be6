// ahal-device/src/registry.rs
//
// Owner of the shared device instances

use std::collections::HashMap;
use std::sync::Arc;

use ahal_core::{BackendFactory, DeviceAttributes, DeviceId, HalError, ResourceManager, Result};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::lifecycle::DeviceLifecycle;

/// Physical codec path a device id maps to
///
/// All on-board microphones share one capture path, so every mic id resolves
/// to the same instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CodecSlot {
    Playback,
    Capture,
}

impl CodecSlot {
    /// Slot serving `id`
    ///
    /// # Errors
    /// Returns `Unsupported` for ids without a codec path (USB devices)
    pub fn for_device(id: DeviceId) -> Result<Self> {
        match id {
            DeviceId::OutSpeaker => Ok(Self::Playback),
            DeviceId::InSpeakerMic
            | DeviceId::InHandsetMic
            | DeviceId::InTriMic
            | DeviceId::InQuadMic
            | DeviceId::InEightMic => Ok(Self::Capture),
            other => Err(HalError::unsupported(format!("{other} has no codec path"))),
        }
    }
}

/// Creates, hands out and releases device instances
pub struct DeviceRegistry {
    resources: Arc<dyn ResourceManager>,
    factory: Arc<dyn BackendFactory>,
    slots: Mutex<HashMap<CodecSlot, Arc<DeviceLifecycle>>>,
}

impl DeviceRegistry {
    pub fn new(resources: Arc<dyn ResourceManager>, factory: Arc<dyn BackendFactory>) -> Self {
        Self {
            resources,
            factory,
            slots: Mutex::new(HashMap::new()),
        }
    }

    /// Shared instance for the device, created on first use
    ///
    /// An existing instance keeps the attributes it was created with.
    pub fn get_or_create(&self, attributes: &DeviceAttributes) -> Result<Arc<DeviceLifecycle>> {
        let slot = CodecSlot::for_device(attributes.id)?;
        let mut slots = self.slots.lock();

        if let Some(existing) = slots.get(&slot) {
            debug!("{}: reusing {:?} instance", attributes.id, slot);
            return Ok(Arc::clone(existing));
        }

        let device = Arc::new(DeviceLifecycle::new(
            attributes.clone(),
            Arc::clone(&self.resources),
            Arc::clone(&self.factory),
        ));
        slots.insert(slot, Arc::clone(&device));
        info!("{}: created {:?} instance", attributes.id, slot);
        Ok(device)
    }

    /// Instance serving `id`, if one exists
    pub fn get(&self, id: DeviceId) -> Option<Arc<DeviceLifecycle>> {
        let slot = CodecSlot::for_device(id).ok()?;
        self.slots.lock().get(&slot).cloned()
    }

    /// Drop the registry's reference to the instance serving `id`
    ///
    /// The instance is destroyed once the last holder drops it. Returns true
    /// if the registry held one.
    pub fn release(&self, id: DeviceId) -> Result<bool> {
        let slot = CodecSlot::for_device(id)?;
        let released = self.slots.lock().remove(&slot).is_some();
        if released {
            debug!("{}: released {:?} instance", id, slot);
        }
        Ok(released)
    }

    pub fn len(&self) -> usize {
        self.slots.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.lock().is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_codec_slots() {
        assert_eq!(
            CodecSlot::for_device(DeviceId::OutSpeaker).unwrap(),
            CodecSlot::Playback
        );
        for mic in [
            DeviceId::InSpeakerMic,
            DeviceId::InHandsetMic,
            DeviceId::InTriMic,
            DeviceId::InQuadMic,
            DeviceId::InEightMic,
        ] {
            assert_eq!(CodecSlot::for_device(mic).unwrap(), CodecSlot::Capture);
        }
        assert!(matches!(
            CodecSlot::for_device(DeviceId::OutUsbHeadset),
            Err(HalError::Unsupported(_))
        ));
    }
}
