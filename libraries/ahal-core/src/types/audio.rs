/// Audio format and channel layout types
use serde::{Deserialize, Serialize};

/// Stream / sub-device direction
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Capture,
    Playback,
}

impl Direction {
    /// Both directions, capture first
    pub const ALL: [Self; 2] = [Self::Capture, Self::Playback];

    /// Index into per-direction tables (capture = 0, playback = 1)
    pub fn index(self) -> usize {
        match self {
            Self::Capture => 0,
            Self::Playback => 1,
        }
    }

    pub fn is_playback(self) -> bool {
        self == Self::Playback
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Capture => "capture",
            Self::Playback => "playback",
        }
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Platform PCM format enumerator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PcmFormat {
    /// Signed 16-bit little endian
    Pcm16,
    /// Signed 24-bit, packed into 3 bytes
    Pcm24Packed,
    /// Signed 32-bit little endian
    Pcm32,
}

impl PcmFormat {
    pub fn bit_width(self) -> u32 {
        match self {
            Self::Pcm16 => 16,
            Self::Pcm24Packed => 24,
            Self::Pcm32 => 32,
        }
    }

    /// Map a bit width to a format. Unknown widths fall back to 16-bit PCM;
    /// negotiation clamps widths before they get here, so the loss is bounded.
    pub fn from_bit_width(bits: u32) -> Self {
        match bits {
            24 => Self::Pcm24Packed,
            32 => Self::Pcm32,
            _ => Self::Pcm16,
        }
    }
}

/// Speaker position of a single channel in a channel map
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ChannelPosition {
    Mono = 0,
    FrontLeft = 1,
    FrontRight = 2,
    FrontCenter = 3,
    LowFrequency = 4,
    RearLeft = 5,
    RearRight = 6,
    RearCenter = 7,
    SideLeft = 8,
    SideRight = 9,
}

/// Bitmask of active channel positions or indices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "bits", rename_all = "lowercase")]
pub enum ChannelMask {
    /// Speaker-position mask (e.g. stereo = FL | FR)
    Positional(u32),
    /// Plain channel-index mask, one bit per channel
    Index(u32),
}

impl ChannelMask {
    /// Marker bit distinguishing index masks in the packed representation
    pub const INDEX_MARKER: u32 = 0x8000_0000;

    pub const OUT_MONO: Self = Self::Positional(0x1);
    pub const OUT_STEREO: Self = Self::Positional(0x3);
    pub const OUT_2POINT1: Self = Self::Positional(0xB);
    pub const OUT_QUAD: Self = Self::Positional(0x33);
    pub const OUT_PENTA: Self = Self::Positional(0x37);
    pub const OUT_5POINT1: Self = Self::Positional(0x3F);
    pub const OUT_6POINT1: Self = Self::Positional(0x13F);
    pub const OUT_7POINT1: Self = Self::Positional(0x63F);
    pub const IN_MONO: Self = Self::Positional(0x10);
    pub const IN_STEREO: Self = Self::Positional(0xC);

    /// Index mask covering the first `count` channels
    pub fn index(count: u32) -> Self {
        let bits = if count >= 31 {
            0x7FFF_FFFF
        } else {
            (1u32 << count) - 1
        };
        Self::Index(bits)
    }

    /// Number of channels the mask enables
    pub fn channel_count(&self) -> u32 {
        match self {
            Self::Positional(bits) | Self::Index(bits) => bits.count_ones(),
        }
    }

    pub fn is_positional(&self) -> bool {
        matches!(self, Self::Positional(_))
    }

    /// Packed 32-bit representation (index masks carry `INDEX_MARKER`)
    pub fn bits(&self) -> u32 {
        match self {
            Self::Positional(bits) => *bits,
            Self::Index(bits) => Self::INDEX_MARKER | bits,
        }
    }
}

/// Channel count plus the position of each channel
///
/// Owned by value, so copying a stream's or device's attributes never aliases
/// the caller's map.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChannelInfo {
    /// Number of channels
    pub channels: u16,

    /// Position of each channel, `channels` entries long
    pub ch_map: Vec<ChannelPosition>,
}

impl ChannelInfo {
    /// Canonical layout for a channel count
    pub fn with_count(count: u16) -> Self {
        use ChannelPosition::*;

        let full = [
            FrontLeft,
            FrontRight,
            FrontCenter,
            LowFrequency,
            RearLeft,
            RearRight,
            SideLeft,
            SideRight,
        ];
        let ch_map = match count {
            0 => Vec::new(),
            1 => vec![Mono],
            2 => vec![FrontLeft, FrontRight],
            3 => vec![FrontLeft, FrontRight, LowFrequency],
            4 => vec![FrontLeft, FrontRight, RearLeft, RearRight],
            5 => vec![FrontLeft, FrontRight, FrontCenter, RearLeft, RearRight],
            6 => full[..6].to_vec(),
            7 => {
                let mut map = full[..6].to_vec();
                map.push(RearCenter);
                map
            }
            n => {
                // Beyond 7.1 the extra channels carry no position.
                let mut map = full.to_vec();
                map.resize(usize::from(n), Mono);
                map
            }
        };

        Self {
            channels: count,
            ch_map,
        }
    }

    pub fn mono() -> Self {
        Self::with_count(1)
    }

    pub fn stereo() -> Self {
        Self::with_count(2)
    }
}

impl Default for ChannelInfo {
    fn default() -> Self {
        Self::stereo()
    }
}

/// Fully resolved media configuration of a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaConfig {
    /// Sample rate in Hz
    pub sample_rate: u32,

    /// Bits per sample
    pub bit_width: u32,

    /// PCM format matching `bit_width`
    pub format: PcmFormat,

    /// Channel layout
    pub ch_info: ChannelInfo,

    /// Mask advertised for `ch_info`
    pub channel_mask: ChannelMask,

    /// Service interval in microseconds, 0 for device default
    pub service_interval_us: u64,
}

impl MediaConfig {
    pub const DEFAULT_SAMPLE_RATE: u32 = 48_000;
    pub const DEFAULT_BIT_WIDTH: u32 = 16;
}

impl Default for MediaConfig {
    fn default() -> Self {
        Self {
            sample_rate: Self::DEFAULT_SAMPLE_RATE,
            bit_width: Self::DEFAULT_BIT_WIDTH,
            format: PcmFormat::Pcm16,
            ch_info: ChannelInfo::stereo(),
            channel_mask: ChannelMask::OUT_STEREO,
            service_interval_us: 0,
        }
    }
}
