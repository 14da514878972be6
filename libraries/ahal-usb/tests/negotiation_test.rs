//! Negotiation tests for USB capability models and stores
//!
//! Property tests cover the rate and channel resolution policies over random
//! capability sets; the scenario tests pin down concrete requests against a
//! known device.
//!
//! Run with: `cargo test -p ahal-usb --test negotiation_test`

use ahal_core::{
    ChannelInfo, ChannelMask, DeviceAddress, Direction, HalError, MediaConfig, PcmFormat,
    StreamAttributes,
};
use ahal_usb::{CapabilityModel, CapabilityStore, SUPPORTED_SAMPLE_RATES};
use proptest::prelude::*;

// ===== Helpers =====

fn model_with(direction: Direction, rates: &[u32], counts: &[u32]) -> CapabilityModel {
    let mut model = CapabilityModel::new(direction);
    model.set_bit_width(16);
    for &rate in rates {
        model.add_rate(rate);
    }
    for &count in counts {
        model.add_channels(count);
    }
    model
}

fn arbitrary_rates() -> impl Strategy<Value = Vec<u32>> {
    prop::sample::subsequence(SUPPORTED_SAMPLE_RATES.to_vec(), 1..=SUPPORTED_SAMPLE_RATES.len())
}

fn arbitrary_counts() -> impl Strategy<Value = Vec<u32>> {
    prop::collection::btree_set(1u32..=8, 1..=8).prop_map(|set| set.into_iter().collect())
}

const USB_DAC: &str = "\
Playback:
    Altset 1
    Format: S16_LE
    Channels: 2
    Rates: 44100, 48000, 96000
    Data packet interval: 1 ms
    Altset 2
    Format: S24_3LE
    Channels: 2
    Rates: 44100, 48000, 96000
    Data packet interval: 1 ms
";

// ===== Property Tests =====

proptest! {
    /// Property: the best rate is always one the model advertises
    #[test]
    fn best_rate_is_always_advertised(rates in arbitrary_rates(), requested in 1u32..500_000) {
        let model = model_with(Direction::Playback, &rates, &[2]);
        let best = model.best_rate(requested).unwrap();
        prop_assert!(rates.contains(&best));
    }

    /// Property: an advertised rate resolves to itself
    #[test]
    fn advertised_rate_resolves_exactly(rates in arbitrary_rates(), pick in any::<prop::sample::Index>()) {
        let model = model_with(Direction::Playback, &rates, &[2]);
        let requested = rates[pick.index(rates.len())];
        prop_assert_eq!(model.best_rate(requested).unwrap(), requested);
    }

    /// Property: a request above every advertised rate resolves to the highest rate
    #[test]
    fn rate_above_all_resolves_to_highest(rates in arbitrary_rates(), excess in 1u32..100_000) {
        let model = model_with(Direction::Playback, &rates, &[2]);
        let highest = *rates.iter().max().unwrap();
        prop_assert_eq!(model.best_rate(highest + excess).unwrap(), highest);
    }

    /// Property: a request the model can meet never resolves below itself
    #[test]
    fn rate_never_resolves_below_reachable_request(rates in arbitrary_rates(), requested in 1u32..500_000) {
        let model = model_with(Direction::Playback, &rates, &[2]);
        let highest = *rates.iter().max().unwrap();
        let best = model.best_rate(requested).unwrap();
        if requested <= highest {
            prop_assert!(best >= requested);
        }
    }

    /// Property: resolved channel count never exceeds the device maximum
    #[test]
    fn channels_never_exceed_device_max(counts in arbitrary_counts(), requested in 1u16..=16) {
        let model = model_with(Direction::Playback, &[48000], &counts);
        let (info, mask) = model.best_channel_info(&ChannelInfo::with_count(requested)).unwrap();

        prop_assert!(u32::from(info.channels) <= model.channels());
        prop_assert!(counts.contains(&u32::from(info.channels)));
        prop_assert_eq!(mask.channel_count(), u32::from(info.channels));
        prop_assert_eq!(info.ch_map.len(), usize::from(info.channels));
    }

    /// Property: a supported count resolves to exactly that count
    #[test]
    fn supported_channel_count_resolves_exactly(counts in arbitrary_counts(), pick in any::<prop::sample::Index>()) {
        let model = model_with(Direction::Playback, &[48000], &counts);
        let requested = counts[pick.index(counts.len())] as u16;
        let (info, _) = model.best_channel_info(&ChannelInfo::with_count(requested)).unwrap();
        prop_assert_eq!(info.channels, requested);
    }

    /// Property: failed negotiation leaves the output config untouched
    #[test]
    fn failed_negotiation_never_writes(rate in 1u32..400_000, bits in prop::sample::select(vec![8u32, 16, 20, 24, 32])) {
        let mut store = CapabilityStore::new(DeviceAddress::new(1, 0));
        store.load_capability(Direction::Playback, USB_DAC).unwrap();

        let mut out = MediaConfig::default();
        let before = out.clone();
        let stream = StreamAttributes::new(Direction::Capture, rate, bits, 2);

        let result = store.read_best_config(&mut out, &stream, Direction::Capture);
        prop_assert!(matches!(result, Err(HalError::NoDevice(Direction::Capture))));
        prop_assert_eq!(out, before);
    }
}

// ===== Scenarios =====

#[test]
fn test_rate_scenarios() {
    let model = model_with(Direction::Playback, &[44100, 48000, 96000], &[2]);

    assert_eq!(model.best_rate(50000).unwrap(), 96000);
    assert_eq!(model.best_rate(48000).unwrap(), 48000);
    assert_eq!(model.best_rate(192000).unwrap(), 96000);
}

#[test]
fn test_channel_scenarios() {
    let model = model_with(Direction::Playback, &[48000], &[1, 2, 6]);

    let (info, mask) = model.best_channel_info(&ChannelInfo::with_count(4)).unwrap();
    assert_eq!(info.channels, 2);
    assert_eq!(mask, ChannelMask::OUT_STEREO);

    let (info, mask) = model.best_channel_info(&ChannelInfo::with_count(8)).unwrap();
    assert_eq!(info.channels, 6);
    assert_eq!(mask, ChannelMask::OUT_5POINT1);
}

#[test]
fn test_empty_model_fails() {
    let model = CapabilityModel::new(Direction::Capture);
    assert!(matches!(
        model.best_rate(48000),
        Err(HalError::NotFound { .. })
    ));
    assert!(matches!(
        model.best_channel_info(&ChannelInfo::stereo()),
        Err(HalError::Unsupported(_))
    ));
}

#[test]
fn test_missing_capture_model_is_no_device() {
    let mut store = CapabilityStore::new(DeviceAddress::new(1, 0));
    store.load_capability(Direction::Playback, USB_DAC).unwrap();

    let mut out = MediaConfig::default();
    let before = out.clone();
    let stream = StreamAttributes::new(Direction::Capture, 48000, 16, 1);

    let err = store
        .read_best_config(&mut out, &stream, Direction::Capture)
        .unwrap_err();
    assert!(matches!(err, HalError::NoDevice(Direction::Capture)));
    assert_eq!(err.errno(), -19);
    assert_eq!(out, before);
}

#[test]
fn test_bit_width_prefers_exact_then_max() {
    let mut store = CapabilityStore::new(DeviceAddress::new(1, 0));
    store.load_capability(Direction::Playback, USB_DAC).unwrap();

    let exact = store
        .best_config(
            &StreamAttributes::new(Direction::Playback, 48000, 16, 2),
            Direction::Playback,
        )
        .unwrap();
    assert_eq!(exact.bit_width, 16);
    assert_eq!(exact.format, PcmFormat::Pcm16);

    let upgraded = store
        .best_config(
            &StreamAttributes::new(Direction::Playback, 48000, 20, 2),
            Direction::Playback,
        )
        .unwrap();
    assert_eq!(upgraded.bit_width, 24);
    assert_eq!(upgraded.format, PcmFormat::Pcm24Packed);
}

#[test]
fn test_best_config_carries_service_interval() {
    let mut store = CapabilityStore::new(DeviceAddress::new(1, 0));
    store.load_capability(Direction::Playback, USB_DAC).unwrap();

    let mut out = MediaConfig::default();
    store
        .read_best_config(
            &mut out,
            &StreamAttributes::new(Direction::Playback, 50000, 24, 6),
            Direction::Playback,
        )
        .unwrap();

    assert_eq!(out.sample_rate, 96000);
    assert_eq!(out.bit_width, 24);
    assert_eq!(out.ch_info.channels, 2);
    assert_eq!(out.channel_mask, ChannelMask::OUT_STEREO);
    assert_eq!(out.service_interval_us, 1000);
}

#[test]
fn test_store_maxima_and_sentinels() {
    let mut store = CapabilityStore::new(DeviceAddress::new(1, 0));
    store.load_capability(Direction::Playback, USB_DAC).unwrap();

    assert_eq!(store.max_bit_width(Direction::Playback), 24);
    assert_eq!(store.max_channels(Direction::Playback), 2);
    assert_eq!(store.max_bit_width(Direction::Capture), 0);
    assert_eq!(store.max_channels(Direction::Capture), 0);
}
