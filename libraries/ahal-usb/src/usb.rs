// ahal-usb/src/usb.rs
//
// USB audio device: connection handling and format selection on top of the
// capability cache

use std::sync::Arc;

use ahal_core::{
    CapabilityReader, ChannelMask, DeviceAddress, DeviceAttributes, DeviceId, Direction,
    HalError, PcmFormat, Result, StreamAttributes,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::cache::CapabilityCache;
use crate::model::{
    DEFAULT_SAMPLE_RATE, MAX_HIFI_CHANNEL_COUNT, MIN_CHANNEL_COUNT, SUPPORTED_SAMPLE_RATES,
};
use crate::store::{CapabilityStore, SupportedConfig};

/// Default format answer for a device capability query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceCapability {
    pub address: DeviceAddress,
    pub direction: Direction,
    pub format: PcmFormat,
    pub sample_rate: u32,
    pub channel_mask: ChannelMask,
    pub supported: SupportedConfig,
}

/// USB audio device layer
///
/// Owns nothing but collaborators: parsed capabilities live in the shared
/// cache, raw descriptors come from the reader.
pub struct UsbDevice {
    cache: Arc<CapabilityCache>,
    reader: Arc<dyn CapabilityReader>,
}

impl UsbDevice {
    pub fn new(cache: Arc<CapabilityCache>, reader: Arc<dyn CapabilityReader>) -> Self {
        Self { cache, reader }
    }

    pub fn cache(&self) -> &Arc<CapabilityCache> {
        &self.cache
    }

    /// Handle a device connection: parse capabilities unless already cached
    ///
    /// A card only needs one direction; a missing section for the other
    /// direction is tolerated.
    ///
    /// # Errors
    /// - `ParseError` if neither a playback nor a capture section exists
    /// - `Unsupported` if a present section is malformed
    pub fn connect(&self, address: &DeviceAddress) -> Result<Arc<CapabilityStore>> {
        if self.cache.is_config_cached(address) {
            if let Some(store) = self.cache.lookup(address) {
                debug!("Capabilities for {} already cached", address);
                return Ok(store);
            }
        }

        let mut store = CapabilityStore::new(address.clone());
        let mut parsed = 0;
        for direction in Direction::ALL {
            match store.get_capability(direction, self.reader.as_ref()) {
                Ok(()) => parsed += 1,
                Err(HalError::ParseError(msg)) => {
                    debug!("{} has no {} profile: {}", address, direction, msg);
                }
                Err(e) => {
                    warn!("Failed to read {} capabilities of {}: {}", direction, address, e);
                    return Err(e);
                }
            }
        }

        if parsed == 0 {
            return Err(HalError::parse(format!(
                "{address} has no playback or capture profile"
            )));
        }

        info!("USB device {} connected", address);
        Ok(self.cache.insert(store))
    }

    /// Handle a device disconnection. Returns true if capabilities were cached.
    pub fn disconnect(&self, address: &DeviceAddress) -> bool {
        info!("USB device {} disconnected", address);
        self.cache.invalidate(address)
    }

    fn store(&self, address: &DeviceAddress) -> Result<Arc<CapabilityStore>> {
        self.cache
            .lookup(address)
            .ok_or_else(|| HalError::not_found("capability store", address.to_string()))
    }

    /// Default format, rate and channel mask of a connected device
    pub fn default_config(
        &self,
        address: &DeviceAddress,
        direction: Direction,
    ) -> Result<DeviceCapability> {
        let store = self.store(address)?;
        Ok(DeviceCapability {
            address: address.clone(),
            direction,
            format: store.default_format(direction)?,
            sample_rate: store.default_sample_rate(direction)?,
            channel_mask: store.default_channel_mask(direction)?,
            supported: store.supported_config(direction)?,
        })
    }

    /// Negotiate a stream request and write the result into the device's media config
    ///
    /// `device` is only modified when negotiation succeeds.
    pub fn select_best_config(
        &self,
        device: &mut DeviceAttributes,
        stream: &StreamAttributes,
        direction: Direction,
    ) -> Result<()> {
        let address = device
            .address
            .as_ref()
            .ok_or_else(|| HalError::invalid_state(format!("{} has no USB address", device.id)))?;
        let store = self.store(address)?;
        store.read_best_config(&mut device.config, stream, direction)
    }

    pub fn is_sample_rate_supported(sample_rate: u32) -> bool {
        SUPPORTED_SAMPLE_RATES.contains(&sample_rate)
    }

    pub fn is_channel_supported(channels: u32) -> bool {
        (MIN_CHANNEL_COUNT..=MAX_HIFI_CHANNEL_COUNT).contains(&channels)
    }

    pub fn is_bit_width_supported(bit_width: u32) -> bool {
        matches!(bit_width, 16 | 24 | 32)
    }

    /// Replace an unsupported bit width with 16. Returns true if it changed.
    pub fn check_and_update_bit_width(bit_width: &mut u32) -> bool {
        if Self::is_bit_width_supported(*bit_width) {
            return false;
        }
        debug!("Bit width {} not supported, using 16", bit_width);
        *bit_width = 16;
        true
    }

    /// Replace an unsupported sample rate with 48 kHz. Returns true if it changed.
    pub fn check_and_update_sample_rate(sample_rate: &mut u32) -> bool {
        if Self::is_sample_rate_supported(*sample_rate) {
            return false;
        }
        debug!("Sample rate {} not supported, using {}", sample_rate, DEFAULT_SAMPLE_RATE);
        *sample_rate = DEFAULT_SAMPLE_RATE;
        true
    }

    pub fn is_usb_out_device(id: DeviceId) -> bool {
        matches!(id, DeviceId::OutUsbDevice | DeviceId::OutUsbHeadset)
    }
}
