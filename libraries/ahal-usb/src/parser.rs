// ahal-usb/src/parser.rs
//
// Parsing of USB audio stream descriptors (procfs `stream<N>` text)

use ahal_core::{Direction, HalError, Result};
use tracing::debug;

use crate::model::{CapabilityModel, SUPPORTED_SAMPLE_RATES};

pub const PLAYBACK_PROFILE_STR: &str = "Playback:";
pub const CAPTURE_PROFILE_STR: &str = "Capture:";
pub const CHANNEL_NUMBER_STR: &str = "Channels: ";
pub const FORMAT_STR: &str = "Format:";
pub const RATES_STR: &str = "Rates:";
pub const ALTSET_STR: &str = "Altset";

/// Models parsed from one direction's section of a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedSection {
    /// One model per distinct bit width, in descriptor order
    pub models: Vec<CapabilityModel>,

    /// True when any altset reported a big-endian format
    pub big_endian: bool,
}

fn section_marker(direction: Direction) -> &'static str {
    match direction {
        Direction::Playback => PLAYBACK_PROFILE_STR,
        Direction::Capture => CAPTURE_PROFILE_STR,
    }
}

/// Lines belonging to the section of `direction`, without the marker line
fn section_lines(text: &str, direction: Direction) -> Option<Vec<&str>> {
    let marker = section_marker(direction);
    let mut lines = text.lines();
    lines.find(|line| line.trim_start().starts_with(marker))?;

    let body = lines
        .take_while(|line| {
            let line = line.trim_start();
            !line.starts_with(PLAYBACK_PROFILE_STR) && !line.starts_with(CAPTURE_PROFILE_STR)
        })
        .collect();
    Some(body)
}

/// Split a section into altset blocks. A section without altset markers is one block.
fn altset_blocks<'a>(lines: &[&'a str]) -> Vec<Vec<&'a str>> {
    let mut blocks: Vec<Vec<&str>> = Vec::new();
    let mut current: Vec<&str> = Vec::new();

    for line in lines {
        if line.trim_start().starts_with(ALTSET_STR) && !current.is_empty() {
            blocks.push(std::mem::take(&mut current));
        }
        current.push(line);
    }
    if !current.is_empty() {
        blocks.push(current);
    }

    // Lines before the first altset (status, interface headers) carry no format.
    if blocks.len() > 1 && !blocks[0].iter().any(|l| l.contains(FORMAT_STR)) {
        blocks.remove(0);
    }
    blocks
}

fn value_after<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let line = line.trim_start();
    line.strip_prefix(key.trim_end()).map(str::trim)
}

/// Bit width and endianness of an ALSA format name, `None` if unsupported
fn bit_width_of(format: &str) -> Option<(u32, bool)> {
    let big_endian = format.ends_with("BE");
    let base = format
        .strip_suffix("LE")
        .or_else(|| format.strip_suffix("BE"))
        .unwrap_or(format)
        .trim_end_matches('_');
    let bits = match base {
        "S16" => 16,
        "S24_3" | "S24" => 24,
        "S32" => 32,
        _ => return None,
    };
    Some((bits, big_endian))
}

fn parse_rates(value: &str) -> Result<Vec<u32>> {
    if value.contains("continuous") {
        let range = value.split('(').next().unwrap_or_default();
        let mut bounds = range.split('-').map(|v| v.trim().parse::<u32>());
        let (Some(Ok(min)), Some(Ok(max))) = (bounds.next(), bounds.next()) else {
            return Err(HalError::unsupported(format!("bad rate range '{value}'")));
        };
        return Ok(SUPPORTED_SAMPLE_RATES
            .iter()
            .copied()
            .filter(|rate| (min..=max).contains(rate))
            .collect());
    }

    value
        .split(',')
        .map(|rate| {
            rate.trim()
                .parse::<u32>()
                .map_err(|_| HalError::unsupported(format!("bad rate '{}'", rate.trim())))
        })
        .collect()
}

struct Altset {
    bit_width: u32,
    big_endian: bool,
    channels: u32,
    rates: Vec<u32>,
    interval_us: u64,
}

fn parse_altset(block: &[&str]) -> Result<Option<Altset>> {
    let mut format = None;
    let mut channels = None;
    let mut rates = None;

    for line in block {
        if let Some(value) = value_after(line, FORMAT_STR) {
            format = Some(value);
        } else if let Some(value) = value_after(line, CHANNEL_NUMBER_STR) {
            let count = value
                .parse::<u32>()
                .map_err(|_| HalError::unsupported(format!("bad channel count '{value}'")))?;
            channels = Some(count);
        } else if let Some(value) = value_after(line, RATES_STR) {
            rates = Some(parse_rates(value)?);
        }
    }

    let format = format.ok_or_else(|| HalError::unsupported("altset without Format"))?;
    let channels = match channels {
        Some(0) | None => return Err(HalError::unsupported("altset without channels")),
        Some(n) => n,
    };
    let rates = rates.ok_or_else(|| HalError::unsupported("altset without Rates"))?;

    let Some((bit_width, big_endian)) = bit_width_of(format) else {
        debug!("Skipping altset with unsupported format {}", format);
        return Ok(None);
    };

    Ok(Some(Altset {
        bit_width,
        big_endian,
        channels,
        rates,
        interval_us: CapabilityModel::parse_service_interval(&block.join("\n")),
    }))
}

/// Parse the section of `direction` out of a descriptor
///
/// Altsets sharing a bit width fold into one model: their rates and channel
/// counts are unioned and the shortest non-zero service interval wins.
///
/// # Errors
/// - `ParseError` if the descriptor has no section for `direction`
/// - `Unsupported` if the section is malformed or has no usable altset
pub fn parse_descriptor(text: &str, direction: Direction) -> Result<ParsedSection> {
    let lines = section_lines(text, direction).ok_or_else(|| {
        HalError::parse(format!("no '{}' section", section_marker(direction)))
    })?;

    let mut models: Vec<CapabilityModel> = Vec::new();
    let mut big_endian = false;

    for block in altset_blocks(&lines) {
        let Some(altset) = parse_altset(&block)? else {
            continue;
        };
        big_endian |= altset.big_endian;

        let index = match models.iter().position(|m| m.bit_width() == altset.bit_width) {
            Some(index) => index,
            None => {
                let mut model = CapabilityModel::new(direction);
                model.set_bit_width(altset.bit_width);
                models.push(model);
                models.len() - 1
            }
        };
        let model = &mut models[index];

        model.add_channels(altset.channels);
        for rate in altset.rates {
            model.add_rate(rate);
        }
        if altset.interval_us > 0 && (model.interval() == 0 || altset.interval_us < model.interval())
        {
            model.set_interval(altset.interval_us);
        }
    }

    models.retain(|m| !m.rates().is_empty());
    if models.is_empty() {
        return Err(HalError::unsupported(format!(
            "{direction} section has no supported altset"
        )));
    }

    debug!(
        "Parsed {} {} model(s), widths {:?}",
        models.len(),
        direction,
        models.iter().map(CapabilityModel::bit_width).collect::<Vec<_>>()
    );

    Ok(ParsedSection { models, big_endian })
}
