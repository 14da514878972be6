//! USB audio capability layer
//!
//! Decides which format a USB audio endpoint runs for a stream request.
//!
//! # Features
//!
//! - Capability models parsed from USB audio stream descriptors
//! - Per-card capability stores, cached by hardware address
//! - Best-config negotiation (rate, bit width, channel mask)
//! - Connect / disconnect handling with cache invalidation
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use ahal_core::{DeviceAddress, Direction, StreamAttributes};
//! use ahal_usb::{CapabilityCache, StaticReader, UsbDevice};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let address = DeviceAddress::new(1, 0);
//! let reader = StaticReader::new();
//! reader.insert(
//!     address.clone(),
//!     "Playback:\n  Format: S16_LE\n  Channels: 2\n  Rates: 44100, 48000, 96000\n",
//! );
//!
//! let usb = UsbDevice::new(Arc::new(CapabilityCache::new()), Arc::new(reader));
//! let store = usb.connect(&address)?;
//!
//! let request = StreamAttributes::new(Direction::Playback, 50_000, 16, 2);
//! let config = store.best_config(&request, Direction::Playback)?;
//! assert_eq!(config.sample_rate, 96_000);
//! # Ok(())
//! # }
//! ```

#![forbid(unsafe_code)]

pub mod cache;
pub mod model;
pub mod parser;
pub mod reader;
pub mod store;
pub mod usb;

pub use cache::CapabilityCache;
pub use model::{canonical_channel_mask, CapabilityModel, SUPPORTED_SAMPLE_RATES};
pub use parser::{parse_descriptor, ParsedSection};
pub use reader::{ProcfsReader, StaticReader};
pub use store::{CapabilityStore, SupportedConfig};
pub use usb::{DeviceCapability, UsbDevice};
