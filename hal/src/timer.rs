//! Sampling trigger timer abstraction

use crate::error::{HalError, HalResult};

/// Timer capture/compare output used to trigger conversions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimerTrigger {
    TimerA0CaptureCompare1,
    TimerA0CaptureCompare2,
    TimerA1CaptureCompare1,
    TimerA1CaptureCompare2,
    TimerA2CaptureCompare1,
    TimerA2CaptureCompare2,
    TimerA3CaptureCompare1,
}

impl TimerTrigger {
    /// Trigger source selector as written to the ADC control register
    pub const fn index(self) -> u8 {
        match self {
            Self::TimerA0CaptureCompare1 => 0,
            Self::TimerA0CaptureCompare2 => 1,
            Self::TimerA1CaptureCompare1 => 2,
            Self::TimerA1CaptureCompare2 => 3,
            Self::TimerA2CaptureCompare1 => 4,
            Self::TimerA2CaptureCompare2 => 5,
            Self::TimerA3CaptureCompare1 => 6,
        }
    }

    /// Timer instance (A0..A3) driving this trigger
    pub const fn timer(self) -> u8 {
        self.index() / 2
    }
}

impl Default for TimerTrigger {
    fn default() -> Self {
        Self::TimerA0CaptureCompare1
    }
}

/// Compare value that makes a timer clocked at `clock_hz` fire at
/// `frequency_hz`.
///
/// The result is truncated, so the achieved frequency is never below the
/// requested one by more than one timer tick.
pub fn timer_period_ticks(clock_hz: u32, frequency_hz: u32) -> HalResult<u32> {
    if frequency_hz == 0 || frequency_hz > clock_hz {
        return Err(HalError::InvalidParameter);
    }
    Ok(clock_hz / frequency_hz)
}
