//! Type system enforcement tests for the channel request newtypes.
//! Out-of-range rates, group sizes and channel numbers are unrepresentable.

// ── SamplingRateHz ───────────────────────────────────────────────────────────

#[test]
fn sampling_rate_zero_is_unrepresentable() {
    use adc_engine::SamplingRateHz;
    let err = SamplingRateHz::new(0).unwrap_err();
    assert_eq!((err.value, err.min, err.max), (0, 1, 5_000_000));
}

#[test]
fn sampling_rate_above_converter_limit_is_rejected() {
    use adc_engine::SamplingRateHz;
    assert!(SamplingRateHz::new(5_000_001).is_err());
    assert!(SamplingRateHz::new(u32::MAX).is_err());
}

#[test]
fn sampling_rate_ordering_follows_hz() {
    use adc_engine::SamplingRateHz;
    let slow = SamplingRateHz::new(9_000).unwrap();
    let fast = SamplingRateHz::new(32_000).unwrap();
    assert!(fast > slow);
}

// ── SampleCount ──────────────────────────────────────────────────────────────

#[test]
fn sample_count_fits_group_counter() {
    use adc_engine::SampleCount;
    assert!(SampleCount::new(0).is_err());
    assert!(SampleCount::new(1024).is_err(), "10-bit group counter");
    assert_eq!(SampleCount::new(1023).unwrap().get(), 1023);
}

// ── ChannelId ────────────────────────────────────────────────────────────────

#[test]
fn channel_id_covers_sixteen_channels() {
    use adc_engine::{ChannelId, MAX_CHANNELS};
    for n in 0..16u8 {
        let id = ChannelId::new(n).unwrap();
        assert_eq!(id.index(), usize::from(n));
        assert_eq!(id.mask().count_ones(), 1);
    }
    assert!(ChannelId::new(16).is_err());
    assert_eq!(MAX_CHANNELS, 16);
}

// ── OpampGain ────────────────────────────────────────────────────────────────

#[test]
fn opamp_gain_in_tenths() {
    use adc_engine::OpampGain;
    assert_eq!(OpampGain::UNITY.tenths(), 10);
    assert!(OpampGain::from_tenths(0).is_err());
    assert!(OpampGain::from_tenths(640).is_ok());
}

#[test]
fn higher_gain_never_settles_faster() {
    use adc_engine::clock::min_sample_hold_ns;
    use adc_engine::{FrontEnd, OpampGain};
    let hold = |tenths| {
        min_sample_hold_ns(&FrontEnd {
            opamp_gain: Some(OpampGain::from_tenths(tenths).unwrap()),
            dac_present: false,
        })
    };
    assert!(hold(20) <= hold(40));
    assert!(hold(40) <= hold(160));
}
