//! Conversion controller: session lifecycle, arming and cancellation.

use core::fmt;
use core::ops::ControlFlow;

use hal::{HalError, PowerManager, SamplingBackend};
use log::{debug, trace, warn};
use parking_lot::Mutex;

use crate::adjust::{self, MAX_RESOLUTION_BITS};
use crate::config::{DispatchMode, DriverConfig, RecurrenceMode, ReturnMode, SessionParams};
use crate::dispatch::{Dispatcher, Pending, ReadyBuffer};
use crate::error::{AdcError, AdcResult};
use crate::pingpong::PingPong;
use crate::request::ConversionRequest;
use crate::sync::{Completion, SessionLock, Wake};

/// Identifies one session of a driver instance.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionHandle(pub(crate) u32);

impl SessionHandle {
    pub const fn id(self) -> u32 {
        self.0
    }
}

impl fmt::Display for SessionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session#{}", self.0)
    }
}

#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    #[default]
    Idle,
    /// Timer running, no samples yet.
    Armed,
    /// At least one completion handled.
    Delivering,
    /// Torn down by `cancel` or a fault; becomes `Idle` before the lock is
    /// released.
    Cancelled,
}

/// Snapshot of the running session.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStatus {
    pub handle: SessionHandle,
    pub state: SessionState,
    pub recurrence: RecurrenceMode,
    pub return_mode: ReturnMode,
    pub active_request: usize,
    /// Samples delivered in the current cycle, per request.
    pub delivered: Vec<u32>,
    /// Completed bank fills, per request.
    pub fills: Vec<u32>,
    pub toggles: u32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Terminal {
    Completed,
    Cancelled,
    /// Callback asked to stop.
    Stopped,
    Fault(HalError),
}

struct Session<'a> {
    handle: SessionHandle,
    state: SessionState,
    params: SessionParams,
    buffers: PingPong<'a>,
}

struct Inner<'a, B, P> {
    backend: B,
    power: P,
    session: Option<Session<'a>>,
    retired: Option<(SessionHandle, Vec<ConversionRequest<'a>>)>,
    dispatcher: Dispatcher<'a>,
    next_handle: u32,
}

/// Buffered ADC driver instance.
///
/// Task context calls [`start`](AdcBuf::start), [`cancel`](AdcBuf::cancel)
/// and the accessors; the backend's interrupt path calls
/// [`on_hardware_complete`](AdcBuf::on_hardware_complete) and
/// [`on_hardware_fault`](AdcBuf::on_hardware_fault). All of them take
/// `&self`, so one instance can be shared between both sides.
///
/// At most one session runs at a time. The session lock is held exactly
/// while the session is armed or delivering, and the configured power
/// constraint is held for the same span.
pub struct AdcBuf<'a, B, P> {
    config: DriverConfig,
    lock: SessionLock,
    completion: Completion,
    inner: Mutex<Inner<'a, B, P>>,
}

impl<'a, B, P> AdcBuf<'a, B, P>
where
    B: SamplingBackend,
    P: PowerManager,
{
    /// Create a driver over `backend` and `power`.
    pub fn open(config: DriverConfig, backend: B, power: P) -> AdcResult<Self> {
        if config.resolution_bits == 0 || config.resolution_bits > MAX_RESOLUTION_BITS {
            return Err(AdcError::InvalidResolution(config.resolution_bits));
        }
        if config.channels.is_empty() {
            return Err(AdcError::InvalidRequest("channel table is empty"));
        }
        debug!(
            "{}: open, {} channels, trigger {:?}, irq priority {:#04x}, {}-bit",
            config.name,
            config.channels.len(),
            config.trigger,
            config.interrupt_priority,
            config.resolution_bits
        );

        let dispatcher = Dispatcher::new(config.dispatch);
        Ok(Self {
            config,
            lock: SessionLock::new(),
            completion: Completion::new(),
            inner: Mutex::new(Inner {
                backend,
                power,
                session: None,
                retired: None,
                dispatcher,
                next_handle: 1,
            }),
        })
    }

    /// Cancel any running session and hand back the backend and power
    /// manager.
    pub fn close(self) -> (B, P) {
        {
            let mut inner = self.inner.lock();
            self.finish(&mut inner, Terminal::Cancelled);
        }
        debug!("{}: closed", self.config.name);
        let inner = self.inner.into_inner();
        (inner.backend, inner.power)
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    /// Register the callback used by [`ReturnMode::Callback`] sessions.
    ///
    /// See [`Callback`](crate::Callback) for the calling contract.
    pub fn set_callback<F>(&self, callback: F) -> AdcResult<()>
    where
        F: for<'s> FnMut(SessionHandle, Result<ReadyBuffer<'s>, AdcError>) -> ControlFlow<()>
            + Send
            + 'a,
    {
        let mut inner = self.inner.lock();
        if inner.session.is_some() {
            return Err(AdcError::AlreadyInProgress);
        }
        inner.dispatcher.set_callback(Box::new(callback));
        Ok(())
    }

    pub fn clear_callback(&self) -> AdcResult<()> {
        let mut inner = self.inner.lock();
        if inner.session.is_some() {
            return Err(AdcError::AlreadyInProgress);
        }
        inner.dispatcher.clear_callback();
        Ok(())
    }

    /// Start a session over `requests`.
    ///
    /// Validation failures return at once and leave the driver idle. In
    /// [`DispatchMode::Deferred`] a new session is refused with
    /// `AlreadyInProgress` until the banks of the previous one have been
    /// dispatched. With
    /// [`ReturnMode::Callback`] this returns as soon as the timer is armed.
    /// With [`ReturnMode::Blocking`] it waits for the session to finish:
    /// `Timeout` leaves the session running with partial data and the caller
    /// must [`cancel`](AdcBuf::cancel) before the next `start`.
    pub fn start(
        &self,
        requests: Vec<ConversionRequest<'a>>,
        params: &SessionParams,
    ) -> AdcResult<SessionHandle> {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        if self.lock.is_held() {
            return Err(AdcError::AlreadyInProgress);
        }
        if let Some((retired, _)) = inner.retired.as_ref() {
            if inner.dispatcher.holds_ready(*retired) {
                debug!("{}: {} still has banks queued", self.config.name, retired);
                return Err(AdcError::AlreadyInProgress);
            }
        }
        self.validate(inner, &requests, params)?;
        // Only taken and released under `inner`.
        if !self.lock.try_acquire() {
            return Err(AdcError::AlreadyInProgress);
        }
        self.completion.reset();

        let handle = SessionHandle(inner.next_handle);
        inner.next_handle = inner.next_handle.wrapping_add(1).max(1);
        inner.retired = None;

        inner.power.acquire_constraint(self.config.power_constraint);
        let armed = self.configure_channel(&mut inner.backend, requests[0].channel).and_then(|()| {
            inner
                .backend
                .arm(self.config.trigger, params.sampling_frequency_hz)
        });
        if let Err(err) = armed {
            warn!("{}: {} failed to arm: {}", self.config.name, handle, err);
            if let Err(err) = inner.backend.disarm() {
                warn!("{}: disarm after failed arm: {}", self.config.name, err);
            }
            inner.power.release_constraint(self.config.power_constraint);
            inner.retired = Some((handle, requests));
            self.lock.release();
            return Err(AdcError::HardwareFault(err));
        }

        debug!(
            "{}: {} armed, {} requests, {:?}/{:?} at {} Hz",
            self.config.name,
            handle,
            requests.len(),
            params.recurrence,
            params.return_mode,
            params.sampling_frequency_hz
        );
        inner.session = Some(Session {
            handle,
            state: SessionState::Armed,
            params: *params,
            buffers: PingPong::new(requests, params.recurrence),
        });

        if params.return_mode == ReturnMode::Callback {
            return Ok(handle);
        }

        let deadline = params.deadline(self.config.tick_period);
        drop(guard);
        match self.completion.wait(deadline) {
            Some(Wake::Completed) => Ok(handle),
            Some(Wake::Cancelled) => Err(AdcError::Cancelled),
            Some(Wake::Fault(err)) => Err(AdcError::HardwareFault(err)),
            None => {
                debug!("{}: {} timed out", self.config.name, handle);
                Err(AdcError::Timeout)
            }
        }
    }

    /// Stop the running session.
    ///
    /// A blocked `start` returns `Cancelled`; a callback session gets a
    /// final `Err(Cancelled)`. Must not be called from inside the callback.
    pub fn cancel(&self) -> AdcResult<()> {
        let mut inner = self.inner.lock();
        if inner.session.is_none() {
            return Err(AdcError::NotInProgress);
        }
        self.finish(&mut inner, Terminal::Cancelled);
        Ok(())
    }

    /// Completion handler: `samples` were converted on the active channel.
    ///
    /// Ignored when no session is running, which covers a completion racing
    /// `cancel`.
    pub fn on_hardware_complete(&self, samples: &[u16]) {
        let mut guard = self.inner.lock();
        let inner = &mut *guard;
        let Some(session) = inner.session.as_mut() else {
            trace!("{}: completion with no session", self.config.name);
            return;
        };

        session.state = SessionState::Delivering;
        let handle = session.handle;
        let return_mode = session.params.return_mode;
        let step = session.buffers.on_sample_complete(samples);
        if step.dropped > 0 {
            trace!(
                "{}: {} dropped {} samples past the bank quota",
                self.config.name,
                handle,
                step.dropped
            );
        }

        let mut flow = ControlFlow::Continue(());
        if let (Some(event), ReturnMode::Callback) = (step.event, return_mode) {
            match inner.dispatcher.mode() {
                DispatchMode::Immediate => {
                    let request = &session.buffers.requests()[event.request];
                    let buffer = ReadyBuffer::new(&event, request.bank(event.bank));
                    flow = inner.dispatcher.deliver(handle, buffer);
                }
                DispatchMode::Deferred => inner.dispatcher.enqueue(Pending::Ready(handle, event)),
            }
        }
        let complete = session.buffers.is_complete();
        let next_channel = step
            .next
            .map(|index| session.buffers.requests()[index].channel);

        if complete {
            self.finish(inner, Terminal::Completed);
        } else if flow.is_break() {
            self.finish(inner, Terminal::Stopped);
        } else if let Some(channel) = next_channel {
            if let Err(err) = self.configure_channel(&mut inner.backend, channel) {
                warn!("{}: {} channel switch failed: {}", self.config.name, handle, err);
                self.finish(inner, Terminal::Fault(err));
            }
        }
    }

    /// Backend-reported unrecoverable condition; tears the session down like
    /// `cancel` and reports `HardwareFault`.
    pub fn on_hardware_fault(&self, err: HalError) {
        let mut inner = self.inner.lock();
        if inner.session.is_none() {
            trace!("{}: fault {} with no session", self.config.name, err);
            return;
        }
        warn!("{}: hardware fault: {}", self.config.name, err);
        self.finish(&mut inner, Terminal::Fault(err));
    }

    /// Run callbacks queued by [`DispatchMode::Deferred`], oldest first.
    ///
    /// A queued bank that the driver has started refilling is dropped and
    /// counted in [`overruns`](AdcBuf::overruns). Returns the number of
    /// notifications delivered.
    ///
    /// Each callback runs with the driver locked; a concurrent
    /// [`on_hardware_complete`](AdcBuf::on_hardware_complete) blocks until it
    /// returns.
    pub fn dispatch_pending(&self) -> usize {
        let mut delivered = 0;
        loop {
            let mut guard = self.inner.lock();
            let inner = &mut *guard;
            let Some(pending) = inner.dispatcher.pop() else {
                break;
            };

            let (handle, event) = match pending {
                Pending::Failed(handle, err) => {
                    inner.dispatcher.fail(handle, err);
                    delivered += 1;
                    continue;
                }
                Pending::Ready(handle, event) => (handle, event),
            };

            let request = requests_of(&inner.session, &inner.retired, handle)
                .and_then(|requests| requests.get(event.request));
            let Some(request) = request.filter(|r| !r.bank_overwritten(event.sequence)) else {
                inner.dispatcher.record_overrun();
                warn!(
                    "{}: {} bank {:?} of request {} overrun before dispatch",
                    self.config.name, handle, event.bank, event.request
                );
                continue;
            };

            let buffer = ReadyBuffer::new(&event, request.bank(event.bank));
            let flow = inner.dispatcher.deliver(handle, buffer);
            delivered += 1;

            let live = inner.session.as_ref().is_some_and(|s| s.handle == handle);
            if flow.is_break() && live {
                self.finish(inner, Terminal::Stopped);
            }
        }
        delivered
    }

    /// Take back the requests of the last finished session.
    ///
    /// Returns `None` while a session is running, while banks of the last
    /// session still wait for [`dispatch_pending`](AdcBuf::dispatch_pending),
    /// or if they were already reclaimed.
    pub fn reclaim(&self) -> Option<Vec<ConversionRequest<'a>>> {
        let mut inner = self.inner.lock();
        let handle = inner.retired.as_ref()?.0;
        if inner.dispatcher.holds_ready(handle) {
            return None;
        }
        inner.retired.take().map(|(_, requests)| requests)
    }

    pub fn state(&self) -> SessionState {
        self.inner
            .lock()
            .session
            .as_ref()
            .map_or(SessionState::Idle, |s| s.state)
    }

    /// Whether the session lock is held.
    pub fn is_busy(&self) -> bool {
        self.lock.is_held()
    }

    pub fn status(&self) -> Option<SessionStatus> {
        let inner = self.inner.lock();
        let session = inner.session.as_ref()?;
        let requests = session.buffers.requests();
        Some(SessionStatus {
            handle: session.handle,
            state: session.state,
            recurrence: session.params.recurrence,
            return_mode: session.params.return_mode,
            active_request: session.buffers.active(),
            delivered: requests.iter().map(ConversionRequest::delivered).collect(),
            fills: requests.iter().map(ConversionRequest::fills).collect(),
            toggles: session.buffers.toggles(),
        })
    }

    /// Deferred notifications lost to a full queue or a refilled bank.
    pub fn overruns(&self) -> u32 {
        self.inner.lock().dispatcher.overruns()
    }

    /// Notifications waiting for [`dispatch_pending`](AdcBuf::dispatch_pending).
    pub fn pending_events(&self) -> usize {
        self.inner.lock().dispatcher.queued()
    }

    pub fn resolution_bits(&self) -> u32 {
        self.config.resolution_bits
    }

    /// Apply the gain and offset of `channel` to `src`.
    pub fn adjust_raw_values(&self, channel: usize, src: &[u16], dst: &mut [u16]) -> AdcResult<usize> {
        let setting = self.config.channel(channel)?;
        Ok(adjust::adjust_slice(src, dst, setting.gain, setting.offset))
    }

    /// Convert adjusted counts of `channel` to microvolts.
    pub fn adjusted_to_microvolts(
        &self,
        channel: usize,
        src: &[u16],
        dst: &mut [u32],
    ) -> AdcResult<usize> {
        let setting = self.config.channel(channel)?;
        adjust::to_microvolts_slice(src, dst, setting.reference_uv, self.config.resolution_bits)
    }

    fn validate(
        &self,
        inner: &Inner<'a, B, P>,
        requests: &[ConversionRequest<'a>],
        params: &SessionParams,
    ) -> AdcResult<()> {
        params.validate(&self.config)?;
        if requests.is_empty() {
            return Err(AdcError::InvalidRequest("no conversion requests"));
        }
        if params.return_mode == ReturnMode::Callback && !inner.dispatcher.has_callback() {
            return Err(AdcError::InvalidRequest("callback return without a callback"));
        }
        for request in requests {
            self.config.channel(request.channel)?;
            if request.requested == 0 {
                return Err(AdcError::InvalidRequest("requested sample count is zero"));
            }
            if request.bank_len() == 0 {
                return Err(AdcError::InvalidRequest("sample bank is empty"));
            }
            if request.banks[0].len() != request.banks[1].len() {
                return Err(AdcError::InvalidRequest("sample banks differ in length"));
            }
            if params.return_mode == ReturnMode::Blocking
                && request.requested as usize > request.bank_len()
            {
                return Err(AdcError::InvalidRequest(
                    "blocking request does not fit one bank",
                ));
            }
        }
        Ok(())
    }

    fn configure_channel(&self, backend: &mut B, channel: usize) -> hal::HalResult<()> {
        let setting = self
            .config
            .channels
            .get(channel)
            .ok_or(HalError::InvalidParameter)?;
        backend.configure(
            setting.pin.channel(),
            setting.reference,
            self.config.sampling_duration,
        )
    }

    /// Tear the live session down. Runs with the driver locked, so a racing
    /// completion either ran before it or finds no session.
    fn finish(&self, inner: &mut Inner<'a, B, P>, terminal: Terminal) {
        let Some(mut session) = inner.session.take() else {
            return;
        };
        if matches!(terminal, Terminal::Cancelled | Terminal::Fault(_)) {
            session.state = SessionState::Cancelled;
        }

        if let Err(err) = inner.backend.disarm() {
            warn!("{}: {} disarm failed: {}", self.config.name, session.handle, err);
        }
        inner.power.release_constraint(self.config.power_constraint);

        let handle = session.handle;
        debug!(
            "{}: {} finished {:?} from {:?} after {} bank toggles",
            self.config.name,
            handle,
            terminal,
            session.state,
            session.buffers.toggles()
        );
        inner.retired = Some((handle, session.buffers.into_requests()));
        self.lock.release();

        match session.params.return_mode {
            ReturnMode::Blocking => {
                let wake = match terminal {
                    Terminal::Completed | Terminal::Stopped => Wake::Completed,
                    Terminal::Cancelled => Wake::Cancelled,
                    Terminal::Fault(err) => Wake::Fault(err),
                };
                self.completion.signal(wake);
            }
            ReturnMode::Callback => {
                let err = match terminal {
                    Terminal::Completed | Terminal::Stopped => return,
                    Terminal::Cancelled => AdcError::Cancelled,
                    Terminal::Fault(err) => AdcError::HardwareFault(err),
                };
                match inner.dispatcher.mode() {
                    DispatchMode::Immediate => inner.dispatcher.fail(handle, err),
                    DispatchMode::Deferred => inner.dispatcher.enqueue(Pending::Failed(handle, err)),
                }
            }
        }
    }
}

fn requests_of<'r, 'a>(
    session: &'r Option<Session<'a>>,
    retired: &'r Option<(SessionHandle, Vec<ConversionRequest<'a>>)>,
    handle: SessionHandle,
) -> Option<&'r [ConversionRequest<'a>]> {
    if let Some(session) = session.as_ref().filter(|s| s.handle == handle) {
        return Some(session.buffers.requests());
    }
    retired
        .as_ref()
        .filter(|(retired, _)| *retired == handle)
        .map(|(_, requests)| requests.as_slice())
}
