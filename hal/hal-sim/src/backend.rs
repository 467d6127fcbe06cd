//! Simulated sampling backend

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use hal::adc::{AdcChannelId, ReferenceSource, SamplingBackend, SamplingDuration};
use hal::error::{HalError, HalResult};
use hal::timer::{timer_period_ticks, TimerTrigger};
use parking_lot::Mutex;

/// Clock feeding the simulated trigger timer (SMCLK at 3 MHz)
pub const SIM_TIMER_CLOCK_HZ: u32 = 3_000_000;

/// One recorded call into the backend
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendCall {
    Configure {
        channel: AdcChannelId,
        reference: ReferenceSource,
        duration: SamplingDuration,
    },
    Arm {
        trigger: TimerTrigger,
        frequency_hz: u32,
        period_ticks: u32,
    },
    Disarm,
}

#[derive(Default)]
struct SimState {
    armed: bool,
    channel: Option<AdcChannelId>,
    calls: Vec<BackendCall>,
    fail_configure: Option<HalError>,
    fail_arm: Option<HalError>,
}

/// Backend that records calls instead of touching registers
pub struct SimulatedBackend {
    state: Arc<Mutex<SimState>>,
}

/// Observer half of a [`SimulatedBackend`], kept by the test harness
#[derive(Clone)]
pub struct SimProbe {
    state: Arc<Mutex<SimState>>,
}

impl SimulatedBackend {
    /// Create a backend together with its probe
    pub fn new() -> (Self, SimProbe) {
        let state = Arc::new(Mutex::new(SimState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            SimProbe { state },
        )
    }
}

impl SamplingBackend for SimulatedBackend {
    fn configure(
        &mut self,
        channel: AdcChannelId,
        reference: ReferenceSource,
        duration: SamplingDuration,
    ) -> HalResult<()> {
        let mut state = self.state.lock();
        if let Some(err) = state.fail_configure.take() {
            return Err(err);
        }
        state.channel = Some(channel);
        state.calls.push(BackendCall::Configure {
            channel,
            reference,
            duration,
        });
        Ok(())
    }

    fn arm(&mut self, trigger: TimerTrigger, frequency_hz: u32) -> HalResult<()> {
        let mut state = self.state.lock();
        if let Some(err) = state.fail_arm.take() {
            return Err(err);
        }
        if state.armed {
            return Err(HalError::Busy);
        }
        let period_ticks = timer_period_ticks(SIM_TIMER_CLOCK_HZ, frequency_hz)?;
        state.armed = true;
        state.calls.push(BackendCall::Arm {
            trigger,
            frequency_hz,
            period_ticks,
        });
        Ok(())
    }

    fn disarm(&mut self) -> HalResult<()> {
        let mut state = self.state.lock();
        state.armed = false;
        state.calls.push(BackendCall::Disarm);
        Ok(())
    }
}

impl SimProbe {
    /// Whether the trigger timer is currently running
    pub fn is_armed(&self) -> bool {
        self.state.lock().armed
    }

    /// Channel the converter is currently routed to
    pub fn current_channel(&self) -> Option<AdcChannelId> {
        self.state.lock().channel
    }

    /// Every call issued so far, in order
    pub fn calls(&self) -> Vec<BackendCall> {
        self.state.lock().calls.clone()
    }

    /// Channels passed to `configure`, in order
    pub fn configured_channels(&self) -> Vec<AdcChannelId> {
        self.state
            .lock()
            .calls
            .iter()
            .filter_map(|call| match call {
                BackendCall::Configure { channel, .. } => Some(*channel),
                _ => None,
            })
            .collect()
    }

    /// Number of `arm` calls that succeeded
    pub fn arm_count(&self) -> usize {
        self.count(|call| matches!(call, BackendCall::Arm { .. }))
    }

    /// Number of `disarm` calls
    pub fn disarm_count(&self) -> usize {
        self.count(|call| matches!(call, BackendCall::Disarm))
    }

    /// Make the next `configure` call fail with `err`
    pub fn fail_next_configure(&self, err: HalError) {
        self.state.lock().fail_configure = Some(err);
    }

    /// Make the next `arm` call fail with `err`
    pub fn fail_next_arm(&self, err: HalError) {
        self.state.lock().fail_arm = Some(err);
    }

    /// Poll until the backend is armed or `timeout` elapses
    pub fn wait_until_armed(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        while Instant::now() < deadline {
            if self.is_armed() {
                return true;
            }
            thread::sleep(Duration::from_micros(200));
        }
        self.is_armed()
    }

    fn count(&self, pred: impl Fn(&BackendCall) -> bool) -> usize {
        self.state.lock().calls.iter().filter(|call| pred(call)).count()
    }
}
