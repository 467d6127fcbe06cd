//! ADC (Analog-to-Digital Converter) abstraction

use core::fmt;

use crate::error::HalResult;
use crate::timer::TimerTrigger;

/// Hardware channel number as understood by the ADC core (A0..A23 on most parts)
pub type AdcChannelId = u8;

/// ADC reference voltage source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ReferenceSource {
    /// VR+ = AVCC, VR- = AVSS
    AvccVss,
    /// VR+ = buffered internal reference, VR- = AVSS
    InternalBufferedVss,
    /// VR+ = external VeREF+, VR- = external VeREF-
    ExternalPosNeg,
    /// VR+ = buffered external VeREF+, VR- = external VeREF-
    ExternalBufferedPosNeg,
}

impl Default for ReferenceSource {
    fn default() -> Self {
        Self::AvccVss
    }
}

/// Sample-and-hold duration, in ADC clock pulses
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum SamplingDuration {
    PulseWidth4,
    PulseWidth8,
    PulseWidth16,
    PulseWidth32,
    PulseWidth64,
    PulseWidth96,
    PulseWidth128,
    PulseWidth192,
}

impl SamplingDuration {
    /// Number of ADC clock cycles the input is sampled for
    pub const fn clocks(self) -> u32 {
        match self {
            Self::PulseWidth4 => 4,
            Self::PulseWidth8 => 8,
            Self::PulseWidth16 => 16,
            Self::PulseWidth32 => 32,
            Self::PulseWidth64 => 64,
            Self::PulseWidth96 => 96,
            Self::PulseWidth128 => 128,
            Self::PulseWidth192 => 192,
        }
    }
}

impl Default for SamplingDuration {
    fn default() -> Self {
        Self::PulseWidth4
    }
}

/// Packed pin routing word for an analog input.
///
/// Layout (16 bits):
///
/// ```text
///   15 - 10    9 - 8     7 - 4   3 - 0
/// | CHANNEL | FUNCTION |  PORT  |  PIN |
/// ```
///
/// Analog inputs always use the tertiary module function, so bits 8 and 9
/// are set by [`PinConfig::new`].
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct PinConfig(pub u16);

impl PinConfig {
    const TERTIARY_FUNCTION: u16 = 0x3;

    /// Build a routing word for `channel` on `port`.`pin`
    pub const fn new(channel: AdcChannelId, port: u8, pin: u8) -> Self {
        Self(
            ((channel as u16) << 10)
                | (Self::TERTIARY_FUNCTION << 8)
                | (((port as u16) & 0xF) << 4)
                | ((pin as u16) & 0xF),
        )
    }

    /// Wrap a raw routing word
    pub const fn from_raw(raw: u16) -> Self {
        Self(raw)
    }

    /// Get the raw routing word
    pub const fn raw(self) -> u16 {
        self.0
    }

    /// ADC input channel
    pub const fn channel(self) -> AdcChannelId {
        (self.0 >> 10) as AdcChannelId
    }

    /// GPIO port number
    pub const fn port(self) -> u8 {
        ((self.0 >> 4) & 0xF) as u8
    }

    /// GPIO pin number within the port
    pub const fn pin(self) -> u8 {
        (self.0 & 0xF) as u8
    }

    /// GPIO pin bit mask within the port
    pub const fn pin_mask(self) -> u16 {
        1 << self.pin()
    }

    /// Peripheral module function selector
    pub const fn module_function(self) -> u8 {
        ((self.0 >> 8) & 0x3) as u8
    }
}

impl fmt::Debug for PinConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PinConfig")
            .field("channel", &self.channel())
            .field("port", &self.port())
            .field("pin", &self.pin())
            .finish()
    }
}

/// Sampling backend trait
///
/// The backend owns the ADC core and its trigger timer. It is configured for
/// one channel at a time, armed with a trigger source and frequency, and
/// reports finished conversions by calling back into the driver core from its
/// interrupt handler. None of these methods may block.
pub trait SamplingBackend: Send {
    /// Route `channel` to the converter with the given reference and
    /// sample-and-hold duration
    fn configure(
        &mut self,
        channel: AdcChannelId,
        reference: ReferenceSource,
        duration: SamplingDuration,
    ) -> HalResult<()>;

    /// Start the trigger timer at `frequency_hz`
    fn arm(&mut self, trigger: TimerTrigger, frequency_hz: u32) -> HalResult<()>;

    /// Stop the trigger timer; no completion may be raised afterwards
    fn disarm(&mut self) -> HalResult<()>;
}
