//! Command line value types

use std::str::FromStr;

use clap::ValueEnum;
use hal::AdcChannelId;
use hal_sim::Waveform;
use thiserror::Error;

/// Highest analog input number on the supported parts (A0..A23)
const MAX_INPUT: AdcChannelId = 23;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ChannelArgError {
    #[error("expected <input>:<count>, got `{0}`")]
    Format(String),
    #[error("invalid analog input `{0}` (A0..A23)")]
    Input(String),
    #[error("invalid sample count `{0}`")]
    Count(String),
}

/// One `--channel <input>:<count>` argument
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelArg {
    pub input: AdcChannelId,
    pub count: u32,
}

impl FromStr for ChannelArg {
    type Err = ChannelArgError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (input, count) = s
            .split_once(':')
            .ok_or_else(|| ChannelArgError::Format(s.to_string()))?;
        let input_digits = input.trim().trim_start_matches(['A', 'a']);
        let input = input_digits
            .parse::<AdcChannelId>()
            .ok()
            .filter(|&n| n <= MAX_INPUT)
            .ok_or_else(|| ChannelArgError::Input(input.to_string()))?;
        let count = count
            .trim()
            .parse::<u32>()
            .ok()
            .filter(|&n| n > 0)
            .ok_or_else(|| ChannelArgError::Count(count.to_string()))?;
        Ok(Self { input, count })
    }
}

/// Synthetic signal fed into every simulated input
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WaveKind {
    Sine,
    Ramp,
    Constant,
}

impl WaveKind {
    /// Waveform for the channel at `position`, scaled to `max` counts.
    ///
    /// Channels get different periods and levels so their traces can be told
    /// apart.
    pub fn waveform(self, position: usize, max: u16) -> Waveform {
        let position = position as u32 + 1;
        match self {
            Self::Sine => Waveform::Sine {
                max,
                period: 16 * position,
            },
            Self::Ramp => Waveform::Ramp {
                step: (u32::from(max) / (16 * position)).max(1) as u16,
                max,
            },
            Self::Constant => {
                Waveform::Constant((u32::from(max) * position / (position + 1)) as u16)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_prefixed_inputs() {
        assert_eq!(
            "3:64".parse::<ChannelArg>(),
            Ok(ChannelArg { input: 3, count: 64 })
        );
        assert_eq!(
            "A12:10".parse::<ChannelArg>(),
            Ok(ChannelArg {
                input: 12,
                count: 10
            })
        );
    }

    #[test]
    fn rejects_malformed_arguments() {
        assert!(matches!(
            "3".parse::<ChannelArg>(),
            Err(ChannelArgError::Format(_))
        ));
        assert!(matches!(
            "A24:8".parse::<ChannelArg>(),
            Err(ChannelArgError::Input(_))
        ));
        assert!(matches!(
            "1:0".parse::<ChannelArg>(),
            Err(ChannelArgError::Count(_))
        ));
    }

    #[test]
    fn waveforms_differ_per_position() {
        assert_ne!(
            WaveKind::Sine.waveform(0, 16_383),
            WaveKind::Sine.waveform(1, 16_383)
        );
        assert_eq!(WaveKind::Constant.waveform(0, 1_000), Waveform::Constant(500));
    }
}
