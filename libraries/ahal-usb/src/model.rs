// ahal-usb/src/model.rs
//
// Capability model of one USB audio sub-device (one altset profile)

use std::collections::BTreeSet;
use std::fmt::Write as _;

use ahal_core::{ChannelInfo, ChannelMask, Direction, HalError, Result};
use serde::{Deserialize, Serialize};

/// Rates the platform can run, in the order used for the rate bitmask
pub const SUPPORTED_SAMPLE_RATES: [u32; MAX_SAMPLE_RATE_SIZE] = [
    384000, 352800, 192000, 176400, 96000, 88200, 64000, 48000, 44100, 32000, 22050, 16000, 11025,
    8000,
];

/// Upper bound on the number of rates one model can advertise
pub const MAX_SAMPLE_RATE_SIZE: usize = 14;

/// Highest channel count with a canonical mask
pub const MAX_HIFI_CHANNEL_COUNT: u32 = 8;

/// Lowest channel count any device can run
pub const MIN_CHANNEL_COUNT: u32 = 1;

/// Rate reported when a model advertises none
pub const DEFAULT_SAMPLE_RATE: u32 = 48000;

/// Service interval meaning "use the device default"
pub const DEFAULT_SERVICE_INTERVAL_US: u64 = 0;

/// Descriptor key preceding the service interval
pub const DATA_PACKET_INTERVAL_KEY: &str = "Data packet interval:";

const OUT_CHANNEL_MASKS: [ChannelMask; MAX_HIFI_CHANNEL_COUNT as usize] = [
    ChannelMask::OUT_MONO,
    ChannelMask::OUT_STEREO,
    ChannelMask::OUT_2POINT1,
    ChannelMask::OUT_QUAD,
    ChannelMask::OUT_PENTA,
    ChannelMask::OUT_5POINT1,
    ChannelMask::OUT_6POINT1,
    ChannelMask::OUT_7POINT1,
];

const IN_POSITIONAL_MASKS: [ChannelMask; 2] = [ChannelMask::IN_MONO, ChannelMask::IN_STEREO];

/// Canonical mask for a channel count in a direction
///
/// Positional masks win when one exists for the count; every other count
/// gets an index mask.
pub fn canonical_channel_mask(direction: Direction, count: u32) -> Option<ChannelMask> {
    if count == 0 {
        return None;
    }
    let positional = match direction {
        Direction::Playback => OUT_CHANNEL_MASKS.get(count as usize - 1),
        Direction::Capture => IN_POSITIONAL_MASKS.get(count as usize - 1),
    };
    Some(positional.copied().unwrap_or_else(|| ChannelMask::index(count)))
}

/// Position of `rate` in `SUPPORTED_SAMPLE_RATES`
fn rate_bit(rate: u32) -> Option<usize> {
    SUPPORTED_SAMPLE_RATES.iter().position(|&r| r == rate)
}

/// Discrete formats one physical sub-device advertises
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityModel {
    bit_width: u32,
    channels: u32,
    channel_counts: BTreeSet<u32>,
    rates: Vec<u32>,
    service_interval_us: u64,
    direction: Direction,
    supported_sample_rates_mask: [u32; 2],
}

impl CapabilityModel {
    /// Empty model for a direction
    pub fn new(direction: Direction) -> Self {
        Self {
            bit_width: 16,
            channels: 0,
            channel_counts: BTreeSet::new(),
            rates: Vec::new(),
            service_interval_us: DEFAULT_SERVICE_INTERVAL_US,
            direction,
            supported_sample_rates_mask: [0; 2],
        }
    }

    pub fn bit_width(&self) -> u32 {
        self.bit_width
    }

    pub fn set_bit_width(&mut self, bit_width: u32) {
        self.bit_width = bit_width;
    }

    /// Highest channel count the model advertises
    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// Replace the advertised channel counts with a single count
    pub fn set_channels(&mut self, channels: u32) {
        self.channel_counts.clear();
        self.channels = 0;
        self.add_channels(channels);
    }

    /// Advertise one more channel count (clamped to the canonical range)
    pub fn add_channels(&mut self, channels: u32) {
        if channels == 0 {
            return;
        }
        let channels = channels.min(MAX_HIFI_CHANNEL_COUNT);
        self.channel_counts.insert(channels);
        self.channels = self.channels.max(channels);
    }

    /// All advertised channel counts, ascending
    pub fn channel_counts(&self) -> impl Iterator<Item = u32> + '_ {
        self.channel_counts.iter().copied()
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn set_direction(&mut self, direction: Direction) {
        if direction != self.direction {
            self.supported_sample_rates_mask.swap(0, 1);
        }
        self.direction = direction;
    }

    /// Service interval in microseconds
    pub fn interval(&self) -> u64 {
        self.service_interval_us
    }

    pub fn set_interval(&mut self, interval_us: u64) {
        self.service_interval_us = interval_us;
    }

    /// Advertised rates, ascending
    pub fn rates(&self) -> &[u32] {
        &self.rates
    }

    /// Add a rate; rates outside the platform set are ignored.
    /// Returns true when the rate is now advertised.
    pub fn add_rate(&mut self, rate: u32) -> bool {
        let Some(bit) = rate_bit(rate) else {
            return false;
        };
        if let Err(pos) = self.rates.binary_search(&rate) {
            self.rates.insert(pos, rate);
            self.supported_sample_rates_mask[self.direction.index()] |= 1 << bit;
        }
        true
    }

    /// Two-word rate bitmask, one word per direction
    pub fn supported_sample_rates_mask(&self) -> [u32; 2] {
        self.supported_sample_rates_mask
    }

    /// Highest advertised rate, or 48 kHz when none are advertised
    pub fn default_rate(&self) -> u32 {
        self.rates.last().copied().unwrap_or(DEFAULT_SAMPLE_RATE)
    }

    /// Append the rates enabled for `direction` to `out` as a comma-separated list.
    /// Returns the number of rates written.
    pub fn write_sample_rates(&self, direction: Direction, out: &mut String) -> usize {
        let mask = self.supported_sample_rates_mask[direction.index()];
        let mut written = 0;
        for (bit, rate) in SUPPORTED_SAMPLE_RATES.iter().enumerate().rev() {
            if mask & (1 << bit) == 0 {
                continue;
            }
            if written > 0 {
                out.push(',');
            }
            let _ = write!(out, "{rate}");
            written += 1;
        }
        written
    }

    /// Closest advertised rate to `requested`
    ///
    /// Exact match first, then the smallest rate above the request, then the
    /// highest rate the model has. Never resolves below a request the model can
    /// meet or exceed.
    pub fn best_rate(&self, requested: u32) -> Result<u32> {
        let highest = *self
            .rates
            .last()
            .ok_or_else(|| HalError::not_found("sample rate", requested.to_string()))?;

        let best = match self.rates.binary_search(&requested) {
            Ok(_) => requested,
            Err(pos) => self.rates.get(pos).copied().unwrap_or(highest),
        };
        Ok(best)
    }

    /// Resolve a requested channel layout against the advertised counts
    ///
    /// Exact count first, then the highest count below the request, then the
    /// smallest count the model has.
    pub fn best_channel_info(&self, requested: &ChannelInfo) -> Result<(ChannelInfo, ChannelMask)> {
        let lowest = self.channel_counts.first().copied().ok_or_else(|| {
            HalError::unsupported(format!("{} device advertises no channels", self.direction))
        })?;

        let wanted = u32::from(requested.channels);
        let count = self
            .channel_counts
            .range(..=wanted)
            .next_back()
            .copied()
            .unwrap_or(lowest);

        let mask = canonical_channel_mask(self.direction, count)
            .ok_or_else(|| HalError::unsupported(format!("no mask for {count} channels")))?;

        Ok((ChannelInfo::with_count(count as u16), mask))
    }

    /// Service interval encoded in a capability blob, in microseconds
    ///
    /// Looks for `Data packet interval: <n> us` (or `ms`); returns the default
    /// (0) when the key is absent or unreadable.
    pub fn parse_service_interval(text: &str) -> u64 {
        let Some(start) = text.find(DATA_PACKET_INTERVAL_KEY) else {
            return DEFAULT_SERVICE_INTERVAL_US;
        };
        let rest = text[start + DATA_PACKET_INTERVAL_KEY.len()..].trim_start();
        let digits: String = rest.chars().take_while(char::is_ascii_digit).collect();
        let Ok(value) = digits.parse::<u64>() else {
            return DEFAULT_SERVICE_INTERVAL_US;
        };

        if rest[digits.len()..].trim_start().starts_with("ms") {
            value * 1000
        } else {
            value
        }
    }
}
