//! Synthetic analog inputs for the simulated backend

use std::f32::consts::TAU;

/// Signal fed into a simulated channel, expressed in raw counts
#[derive(Debug, Clone, PartialEq)]
pub enum Waveform {
    /// Fixed level
    Constant(u16),
    /// Sawtooth from 0 to `max` in increments of `step`
    Ramp { step: u16, max: u16 },
    /// Sine centred at `max / 2` with the given period in samples
    Sine { max: u16, period: u32 },
}

impl Waveform {
    /// Fill `out` with consecutive samples starting at sample index `start`.
    ///
    /// Returns the index following the last sample written.
    pub fn fill(&self, start: u64, out: &mut [u16]) -> u64 {
        for (offset, slot) in out.iter_mut().enumerate() {
            *slot = self.sample_at(start + offset as u64);
        }
        start + out.len() as u64
    }

    /// Value of sample number `n`
    pub fn sample_at(&self, n: u64) -> u16 {
        match *self {
            Self::Constant(level) => level,
            Self::Ramp { step, max } => {
                let span = u64::from(max) + 1;
                ((n * u64::from(step)) % span) as u16
            }
            Self::Sine { max, period } => {
                let period = u64::from(period.max(1));
                let phase = (n % period) as f32 / period as f32;
                let half = f32::from(max) / 2.0;
                (half + half * (phase * TAU).sin()).round().clamp(0.0, f32::from(max)) as u16
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_wraps_at_max() {
        let ramp = Waveform::Ramp { step: 4, max: 15 };
        let mut out = [0u16; 6];
        let next = ramp.fill(0, &mut out);
        assert_eq!(out, [0, 4, 8, 12, 0, 4]);
        assert_eq!(next, 6);
    }

    #[test]
    fn sine_stays_in_range() {
        let sine = Waveform::Sine {
            max: 16_383,
            period: 50,
        };
        let mut out = [0u16; 100];
        sine.fill(7, &mut out);
        assert!(out.iter().all(|&s| s <= 16_383));
        assert_eq!(sine.sample_at(0), 8_192);
    }
}
