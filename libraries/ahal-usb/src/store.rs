// ahal-usb/src/store.rs
//
// Per-card capability store and best-config negotiation

use ahal_core::{
    CapabilityReader, ChannelMask, DeviceAddress, Direction, HalError, MediaConfig, PcmFormat,
    Result, StreamAttributes,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::model::{canonical_channel_mask, CapabilityModel};
use crate::parser::parse_descriptor;

/// Full discrete capability set of one direction, for upper-layer enumeration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SupportedConfig {
    /// Every advertised rate, ascending
    pub sample_rates: Vec<u32>,

    /// Every advertised PCM format, in descriptor order
    pub formats: Vec<PcmFormat>,

    /// Canonical masks for every advertised channel count
    pub channel_masks: Vec<ChannelMask>,

    /// Highest channel count
    pub max_channels: u32,

    /// Highest bit width
    pub max_bit_width: u32,
}

/// Capability models of one physical card
///
/// A card can expose independent playback and capture sub-devices, and a
/// direction can have several models (one per bit width).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CapabilityStore {
    address: DeviceAddress,
    big_endian: bool,
    models: Vec<CapabilityModel>,
}

impl CapabilityStore {
    pub fn new(address: DeviceAddress) -> Self {
        Self {
            address,
            big_endian: false,
            models: Vec::new(),
        }
    }

    pub fn address(&self) -> &DeviceAddress {
        &self.address
    }

    /// True when this store already holds parsed capabilities for `address`
    pub fn is_config_cached(&self, address: &DeviceAddress) -> bool {
        self.address == *address && !self.models.is_empty()
    }

    pub fn set_endian(&mut self, big_endian: bool) {
        self.big_endian = big_endian;
    }

    pub fn is_big_endian(&self) -> bool {
        self.big_endian
    }

    /// All models, in construction order
    pub fn models(&self) -> &[CapabilityModel] {
        &self.models
    }

    /// Add a model built elsewhere
    pub fn push_model(&mut self, model: CapabilityModel) {
        self.models.push(model);
    }

    fn models_for(&self, direction: Direction) -> impl Iterator<Item = &CapabilityModel> {
        self.models.iter().filter(move |m| m.direction() == direction)
    }

    /// First model for `direction`, in construction order
    fn model_for(&self, direction: Direction) -> Result<&CapabilityModel> {
        self.models_for(direction)
            .next()
            .ok_or(HalError::NoDevice(direction))
    }

    /// Read this card's descriptor and add the models of `direction`
    ///
    /// # Errors
    /// - `ParseError` if the descriptor has no section for `direction`
    /// - `Unsupported` if the section is malformed
    /// - whatever the reader reports if the descriptor cannot be read
    pub fn get_capability(
        &mut self,
        direction: Direction,
        reader: &dyn CapabilityReader,
    ) -> Result<()> {
        let text = reader.read_descriptor(&self.address)?;
        self.load_capability(direction, &text)
    }

    /// Parse `text` and add the models of `direction`
    pub fn load_capability(&mut self, direction: Direction, text: &str) -> Result<()> {
        let parsed = parse_descriptor(text, direction)?;
        if parsed.big_endian {
            self.set_endian(true);
        }
        info!(
            "Loaded {} {} capability model(s) for {}",
            parsed.models.len(),
            direction,
            self.address
        );
        self.models.extend(parsed.models);
        Ok(())
    }

    /// Highest bit width for `direction`, 0 if the direction has no model
    pub fn max_bit_width(&self, direction: Direction) -> u32 {
        self.models_for(direction)
            .fold(0, |acc, m| Self::get_max(acc, m.bit_width()))
    }

    /// Highest channel count for `direction`, 0 if the direction has no model
    pub fn max_channels(&self, direction: Direction) -> u32 {
        self.models_for(direction)
            .fold(0, |acc, m| Self::get_max(acc, m.channels()))
    }

    /// Platform format for a bit width; unknown widths map to 16-bit PCM
    pub fn format_by_bit_width(bits: u32) -> PcmFormat {
        PcmFormat::from_bit_width(bits)
    }

    pub fn default_format(&self, direction: Direction) -> Result<PcmFormat> {
        let model = self.model_for(direction)?;
        Ok(Self::format_by_bit_width(model.bit_width()))
    }

    pub fn default_sample_rate(&self, direction: Direction) -> Result<u32> {
        Ok(self.model_for(direction)?.default_rate())
    }

    pub fn default_channel_mask(&self, direction: Direction) -> Result<ChannelMask> {
        let model = self.model_for(direction)?;
        canonical_channel_mask(direction, model.channels())
            .ok_or_else(|| HalError::unsupported(format!("{direction} model has no channels")))
    }

    /// Discrete capability set of `direction`
    pub fn supported_config(&self, direction: Direction) -> Result<SupportedConfig> {
        self.model_for(direction)?;

        let mut sample_rates: Vec<u32> = self
            .models_for(direction)
            .flat_map(|m| m.rates().iter().copied())
            .collect();
        sample_rates.sort_unstable();
        sample_rates.dedup();

        let mut formats = Vec::new();
        let mut counts = Vec::new();
        for model in self.models_for(direction) {
            let format = Self::format_by_bit_width(model.bit_width());
            if !formats.contains(&format) {
                formats.push(format);
            }
            counts.extend(model.channel_counts());
        }
        counts.sort_unstable();
        counts.dedup();

        Ok(SupportedConfig {
            sample_rates,
            formats,
            channel_masks: counts
                .into_iter()
                .filter_map(|count| canonical_channel_mask(direction, count))
                .collect(),
            max_channels: self.max_channels(direction),
            max_bit_width: self.max_bit_width(direction),
        })
    }

    /// Negotiate the closest supported config to a stream request
    ///
    /// Bit width resolves first (requested if any model has it, else the
    /// direction's maximum); rate and channels then resolve independently
    /// against the model with that width.
    pub fn best_config(
        &self,
        stream: &StreamAttributes,
        direction: Direction,
    ) -> Result<MediaConfig> {
        self.model_for(direction)?;

        let bit_width = if self
            .models_for(direction)
            .any(|m| m.bit_width() == stream.bit_width)
        {
            stream.bit_width
        } else {
            self.max_bit_width(direction)
        };
        let model = self
            .models_for(direction)
            .find(|m| m.bit_width() == bit_width)
            .ok_or(HalError::NoDevice(direction))?;

        let sample_rate = model.best_rate(stream.sample_rate)?;
        let (ch_info, channel_mask) = model.best_channel_info(&stream.ch_info)?;

        debug!(
            "Best {} config for {}Hz/{}bit/{}ch: {}Hz/{}bit/{}ch",
            direction,
            stream.sample_rate,
            stream.bit_width,
            stream.ch_info.channels,
            sample_rate,
            bit_width,
            ch_info.channels
        );

        Ok(MediaConfig {
            sample_rate,
            bit_width,
            format: Self::format_by_bit_width(bit_width),
            ch_info,
            channel_mask,
            service_interval_us: model.interval(),
        })
    }

    /// Negotiate into `out`; `out` is untouched unless every resolution succeeds
    pub fn read_best_config(
        &self,
        out: &mut MediaConfig,
        stream: &StreamAttributes,
        direction: Direction,
    ) -> Result<()> {
        *out = self.best_config(stream, direction)?;
        Ok(())
    }

    pub fn get_max(a: u32, b: u32) -> u32 {
        a.max(b)
    }

    pub fn get_min(a: u32, b: u32) -> u32 {
        a.min(b)
    }
}
