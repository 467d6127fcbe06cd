//! Raw-count calibration and unit conversion.
//!
//! Everything here is pure integer arithmetic with no driver state, so it
//! can be used with or without an active session. Divisions truncate toward
//! zero and results saturate at the width of the output type.

use core::num::NonZeroU32;

use crate::error::{AdcError, AdcResult};

/// Widest converter the microvolt conversion accepts.
pub const MAX_RESOLUTION_BITS: u32 = 32;

/// Rational gain applied to raw counts.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Gain {
    numerator: i32,
    denominator: NonZeroU32,
}

impl Gain {
    /// Gain of exactly one.
    pub const UNITY: Gain = Gain {
        numerator: 1,
        denominator: NonZeroU32::MIN,
    };

    /// Build `numerator / denominator`; `None` if the denominator is zero.
    pub const fn new(numerator: i32, denominator: u32) -> Option<Self> {
        match NonZeroU32::new(denominator) {
            Some(denominator) => Some(Self {
                numerator,
                denominator,
            }),
            None => None,
        }
    }

    pub const fn numerator(self) -> i32 {
        self.numerator
    }

    pub const fn denominator(self) -> u32 {
        self.denominator.get()
    }
}

impl Default for Gain {
    fn default() -> Self {
        Self::UNITY
    }
}

/// Apply `raw * gain + offset`, saturating to the `u16` sample range.
pub fn adjust(raw: u16, gain: Gain, offset: i32) -> u16 {
    let scaled = i64::from(raw) * i64::from(gain.numerator) / i64::from(gain.denominator.get());
    (scaled + i64::from(offset)).clamp(0, i64::from(u16::MAX)) as u16
}

/// Convert an adjusted count to microvolts:
/// `adjusted * reference_uv / (2^resolution_bits - 1)`.
pub fn to_microvolts(adjusted: u16, reference_uv: u32, resolution_bits: u32) -> AdcResult<u32> {
    let full_scale = full_scale(resolution_bits)?;
    let uv = u64::from(adjusted) * u64::from(reference_uv) / full_scale;
    Ok(u32::try_from(uv).unwrap_or(u32::MAX))
}

/// [`adjust`] over a slice; returns the number of samples written.
pub fn adjust_slice(src: &[u16], dst: &mut [u16], gain: Gain, offset: i32) -> usize {
    let count = src.len().min(dst.len());
    for (out, &raw) in dst.iter_mut().zip(src).take(count) {
        *out = adjust(raw, gain, offset);
    }
    count
}

/// [`to_microvolts`] over a slice; returns the number of samples written.
pub fn to_microvolts_slice(
    src: &[u16],
    dst: &mut [u32],
    reference_uv: u32,
    resolution_bits: u32,
) -> AdcResult<usize> {
    let full_scale = full_scale(resolution_bits)?;
    let count = src.len().min(dst.len());
    for (out, &sample) in dst.iter_mut().zip(src).take(count) {
        let uv = u64::from(sample) * u64::from(reference_uv) / full_scale;
        *out = u32::try_from(uv).unwrap_or(u32::MAX);
    }
    Ok(count)
}

fn full_scale(resolution_bits: u32) -> AdcResult<u64> {
    if resolution_bits == 0 || resolution_bits > MAX_RESOLUTION_BITS {
        return Err(AdcError::InvalidResolution(resolution_bits));
    }
    Ok((1u64 << resolution_bits) - 1)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unity_gain_is_identity() {
        for raw in [0u16, 1, 8_191, 16_383, u16::MAX] {
            assert_eq!(adjust(raw, Gain::UNITY, 0), raw);
        }
    }

    #[test]
    fn adjust_applies_gain_then_offset() {
        let gain = Gain::new(3, 2).unwrap();
        assert_eq!(adjust(100, gain, 5), 155);
        // 7 * 3 / 2 = 10.5 truncates to 10
        assert_eq!(adjust(7, gain, 0), 10);
    }

    #[test]
    fn adjust_saturates_both_ends() {
        assert_eq!(adjust(10, Gain::UNITY, -100), 0);
        assert_eq!(adjust(60_000, Gain::new(2, 1).unwrap(), 0), u16::MAX);
        assert_eq!(adjust(500, Gain::new(-1, 1).unwrap(), 0), 0);
    }

    #[test]
    fn zero_denominator_is_rejected() {
        assert!(Gain::new(1, 0).is_none());
    }

    #[test]
    fn microvolts_full_scale_and_zero() {
        assert_eq!(to_microvolts(16_383, 2_500_000, 14), Ok(2_500_000));
        assert_eq!(to_microvolts(0, 2_500_000, 14), Ok(0));
        assert_eq!(to_microvolts(4_095, 3_300_000, 12), Ok(3_300_000));
    }

    #[test]
    fn microvolts_truncates_toward_zero() {
        // 1 * 2_500_000 / 16_383 = 152.6...
        assert_eq!(to_microvolts(1, 2_500_000, 14), Ok(152));
    }

    #[test]
    fn microvolts_rejects_bad_resolution() {
        assert_eq!(to_microvolts(1, 1, 0), Err(AdcError::InvalidResolution(0)));
        assert_eq!(to_microvolts(1, 1, 33), Err(AdcError::InvalidResolution(33)));
    }

    #[test]
    fn midpoint_round_trip_within_one_lsb() {
        let reference = 2_500_000u32;
        for bits in [8u32, 10, 12, 14, 16] {
            let mid = (1u32 << (bits - 1)) as u16;
            let uv = to_microvolts(adjust(mid, Gain::UNITY, 0), reference, bits).unwrap();
            let lsb = reference / ((1u32 << bits) - 1);
            let half = reference / 2;
            assert!(
                uv.abs_diff(half) <= lsb,
                "{bits} bits: {uv} uV is more than one LSB ({lsb}) from {half}"
            );
        }
    }

    #[test]
    fn slice_helpers_stop_at_shorter_side() {
        let src = [10u16, 20, 30];
        let mut adjusted = [0u16; 2];
        assert_eq!(adjust_slice(&src, &mut adjusted, Gain::UNITY, 1), 2);
        assert_eq!(adjusted, [11, 21]);

        let mut uv = [0u32; 4];
        assert_eq!(to_microvolts_slice(&src, &mut uv, 4_095, 12), Ok(3));
        assert_eq!(uv, [10, 20, 30, 0]);
    }
}
