//! Driver and session configuration.

use std::time::{Duration, Instant};

use hal::{PinConfig, PowerConstraint, ReferenceSource, SamplingDuration, TimerTrigger};

use crate::adjust::Gain;
use crate::error::{AdcError, AdcResult};

/// Whether a session stops once every request has its samples.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum RecurrenceMode {
    #[default]
    OneShot,
    Continuous,
}

/// How completed buffers reach the caller.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ReturnMode {
    /// `start` waits for the session to finish.
    #[default]
    Blocking,
    /// `start` returns at once; the registered callback sees every bank.
    Callback,
}

/// Where the callback runs.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DispatchMode {
    /// Inside the completion handler.
    #[default]
    Immediate,
    /// Queued, and run by [`AdcBuf::dispatch_pending`](crate::AdcBuf::dispatch_pending).
    ///
    /// The callback still runs with the driver locked, so a completion that
    /// arrives meanwhile waits until the callback returns. Deferral moves the
    /// callback off the interrupt path; it does not bound how long the
    /// interrupt path can be held up by a slow callback.
    Deferred,
}

/// Calibration and routing of one entry in the channel table.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ChannelSetting {
    pub pin: PinConfig,
    pub reference: ReferenceSource,
    /// Reference voltage in microvolts.
    pub reference_uv: u32,
    pub gain: Gain,
    pub offset: i32,
}

impl ChannelSetting {
    /// Uncalibrated channel.
    pub const fn new(pin: PinConfig, reference: ReferenceSource, reference_uv: u32) -> Self {
        Self {
            pin,
            reference,
            reference_uv,
            gain: Gain::UNITY,
            offset: 0,
        }
    }

    pub const fn with_calibration(mut self, gain: Gain, offset: i32) -> Self {
        self.gain = gain;
        self.offset = offset;
        self
    }
}

/// Static description of one driver instance.
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub name: &'static str,
    pub channels: Vec<ChannelSetting>,
    pub trigger: TimerTrigger,
    pub interrupt_priority: u8,
    pub sampling_duration: SamplingDuration,
    pub resolution_bits: u32,
    /// Length of one timeout tick.
    pub tick_period: Duration,
    pub max_sampling_frequency_hz: u32,
    pub power_constraint: PowerConstraint,
    pub dispatch: DispatchMode,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            name: "ADCBuf",
            channels: Vec::new(),
            trigger: TimerTrigger::default(),
            interrupt_priority: 0xE0,
            sampling_duration: SamplingDuration::default(),
            resolution_bits: 14,
            tick_period: Duration::from_millis(1),
            max_sampling_frequency_hz: 1_000_000,
            power_constraint: PowerConstraint::DisallowDeepSleep,
            dispatch: DispatchMode::Immediate,
        }
    }
}

impl DriverConfig {
    pub fn builder() -> DriverConfigBuilder {
        DriverConfigBuilder::default()
    }

    pub fn channel(&self, index: usize) -> AdcResult<&ChannelSetting> {
        self.channels
            .get(index)
            .ok_or(AdcError::InvalidRequest("channel index out of range"))
    }
}

/// Builder for [`DriverConfig`].
#[derive(Debug, Clone, Default)]
pub struct DriverConfigBuilder {
    config: DriverConfig,
}

impl DriverConfigBuilder {
    /// Sets the name used in log messages.
    pub fn name(mut self, name: &'static str) -> Self {
        self.config.name = name;
        self
    }

    /// Appends a channel to the table; its index is the position.
    pub fn channel(mut self, setting: ChannelSetting) -> Self {
        self.config.channels.push(setting);
        self
    }

    pub fn trigger(mut self, trigger: TimerTrigger) -> Self {
        self.config.trigger = trigger;
        self
    }

    pub fn interrupt_priority(mut self, priority: u8) -> Self {
        self.config.interrupt_priority = priority;
        self
    }

    pub fn sampling_duration(mut self, duration: SamplingDuration) -> Self {
        self.config.sampling_duration = duration;
        self
    }

    pub fn resolution_bits(mut self, bits: u32) -> Self {
        self.config.resolution_bits = bits;
        self
    }

    pub fn tick_period(mut self, period: Duration) -> Self {
        self.config.tick_period = period;
        self
    }

    pub fn max_sampling_frequency_hz(mut self, hz: u32) -> Self {
        self.config.max_sampling_frequency_hz = hz;
        self
    }

    pub fn power_constraint(mut self, constraint: PowerConstraint) -> Self {
        self.config.power_constraint = constraint;
        self
    }

    pub fn dispatch(mut self, mode: DispatchMode) -> Self {
        self.config.dispatch = mode;
        self
    }

    pub fn build(self) -> DriverConfig {
        self.config
    }
}

/// Per-session setup passed to [`AdcBuf::start`](crate::AdcBuf::start).
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionParams {
    pub recurrence: RecurrenceMode,
    pub return_mode: ReturnMode,
    pub sampling_frequency_hz: u32,
    /// Blocking timeout in driver ticks; [`SessionParams::WAIT_FOREVER`]
    /// disables it.
    pub timeout_ticks: u32,
}

impl SessionParams {
    pub const WAIT_FOREVER: u32 = u32::MAX;

    pub const fn one_shot_blocking(sampling_frequency_hz: u32, timeout_ticks: u32) -> Self {
        Self {
            recurrence: RecurrenceMode::OneShot,
            return_mode: ReturnMode::Blocking,
            sampling_frequency_hz,
            timeout_ticks,
        }
    }

    pub const fn one_shot_callback(sampling_frequency_hz: u32) -> Self {
        Self {
            recurrence: RecurrenceMode::OneShot,
            return_mode: ReturnMode::Callback,
            sampling_frequency_hz,
            timeout_ticks: Self::WAIT_FOREVER,
        }
    }

    pub const fn continuous(sampling_frequency_hz: u32) -> Self {
        Self {
            recurrence: RecurrenceMode::Continuous,
            return_mode: ReturnMode::Callback,
            sampling_frequency_hz,
            timeout_ticks: Self::WAIT_FOREVER,
        }
    }

    /// Check the setup against the driver limits.
    pub fn validate(&self, config: &DriverConfig) -> AdcResult<()> {
        if self.sampling_frequency_hz == 0 {
            return Err(AdcError::InvalidRequest("sampling frequency is zero"));
        }
        if self.sampling_frequency_hz > config.max_sampling_frequency_hz {
            return Err(AdcError::InvalidRequest(
                "sampling frequency above the converter limit",
            ));
        }
        if self.return_mode == ReturnMode::Blocking {
            if self.recurrence == RecurrenceMode::Continuous {
                return Err(AdcError::InvalidRequest(
                    "continuous sessions need callback return",
                ));
            }
            if self.timeout_ticks == 0 {
                return Err(AdcError::InvalidRequest("blocking timeout is zero"));
            }
        }
        Ok(())
    }

    /// Instant a blocking wait gives up, or `None` to wait forever.
    pub fn deadline(&self, tick_period: Duration) -> Option<Instant> {
        if self.timeout_ticks == Self::WAIT_FOREVER {
            return None;
        }
        tick_period
            .checked_mul(self.timeout_ticks)
            .and_then(|timeout| Instant::now().checked_add(timeout))
    }
}
