/// Device identity and attribute types
use serde::{Deserialize, Serialize};

use super::audio::{ChannelInfo, Direction, MediaConfig};

/// Logical device identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceId {
    OutSpeaker,
    OutUsbDevice,
    OutUsbHeadset,
    InSpeakerMic,
    InHandsetMic,
    InTriMic,
    InQuadMic,
    InEightMic,
    InUsbDevice,
    InUsbHeadset,
}

impl DeviceId {
    /// Direction audio flows through this device
    pub fn direction(self) -> Direction {
        match self {
            Self::OutSpeaker | Self::OutUsbDevice | Self::OutUsbHeadset => Direction::Playback,
            _ => Direction::Capture,
        }
    }

    pub fn is_usb(self) -> bool {
        matches!(
            self,
            Self::OutUsbDevice | Self::OutUsbHeadset | Self::InUsbDevice | Self::InUsbHeadset
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::OutSpeaker => "out_speaker",
            Self::OutUsbDevice => "out_usb_device",
            Self::OutUsbHeadset => "out_usb_headset",
            Self::InSpeakerMic => "in_speaker_mic",
            Self::InHandsetMic => "in_handset_mic",
            Self::InTriMic => "in_tri_mic",
            Self::InQuadMic => "in_quad_mic",
            Self::InEightMic => "in_eight_mic",
            Self::InUsbDevice => "in_usb_device",
            Self::InUsbHeadset => "in_usb_headset",
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "out_speaker" => Some(Self::OutSpeaker),
            "out_usb_device" => Some(Self::OutUsbDevice),
            "out_usb_headset" => Some(Self::OutUsbHeadset),
            "in_speaker_mic" => Some(Self::InSpeakerMic),
            "in_handset_mic" => Some(Self::InHandsetMic),
            "in_tri_mic" => Some(Self::InTriMic),
            "in_quad_mic" => Some(Self::InQuadMic),
            "in_eight_mic" => Some(Self::InEightMic),
            "in_usb_device" => Some(Self::InUsbDevice),
            "in_usb_headset" => Some(Self::InUsbHeadset),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeviceId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Hardware address of a physical card
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DeviceAddress {
    /// Bus number
    pub bus: u32,

    /// Sound card index
    pub card: u32,

    /// PCM device index on the card
    pub device: u32,

    /// Unique identifier (e.g. USB vendor:product string)
    pub id: String,
}

impl DeviceAddress {
    pub fn new(card: u32, device: u32) -> Self {
        Self {
            bus: 0,
            card,
            device,
            id: String::new(),
        }
    }

    #[must_use]
    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = id.into();
        self
    }
}

impl std::fmt::Display for DeviceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "bus{}/card{}/device{}", self.bus, self.card, self.device)?;
        if !self.id.is_empty() {
            write!(f, " ({})", self.id)?;
        }
        Ok(())
    }
}

/// Attributes of a device instance, copied by value from the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceAttributes {
    pub id: DeviceId,

    /// Media configuration the device runs with
    pub config: MediaConfig,

    /// Hardware address for hot-pluggable devices
    pub address: Option<DeviceAddress>,
}

impl DeviceAttributes {
    pub fn new(id: DeviceId) -> Self {
        Self {
            id,
            config: MediaConfig::default(),
            address: None,
        }
    }

    #[must_use]
    pub fn with_address(mut self, address: DeviceAddress) -> Self {
        self.address = Some(address);
        self
    }

    pub fn direction(&self) -> Direction {
        self.id.direction()
    }
}

/// Format a stream asks for
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamAttributes {
    pub direction: Direction,

    /// Requested sample rate in Hz
    pub sample_rate: u32,

    /// Requested bits per sample
    pub bit_width: u32,

    /// Requested channel layout
    pub ch_info: ChannelInfo,
}

impl StreamAttributes {
    pub fn new(direction: Direction, sample_rate: u32, bit_width: u32, channels: u16) -> Self {
        Self {
            direction,
            sample_rate,
            bit_width,
            ch_info: ChannelInfo::with_count(channels),
        }
    }
}

/// Opaque handle of an active stream, as reported by the resource manager
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StreamHandle(pub u64);

impl std::fmt::Display for StreamHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "stream#{}", self.0)
    }
}

/// Backend strategy used to program the hardware
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackendKind {
    /// Direct PCM / mixer-control programming
    #[default]
    Alsa,

    /// DSP graph programming
    Graph,
}

impl BackendKind {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Alsa => "ALSA",
            Self::Graph => "Graph",
        }
    }
}
