//! Hand-off of completed banks to the registered callback.

use core::ops::ControlFlow;

use heapless::Deque;
use log::warn;

use crate::config::DispatchMode;
use crate::controller::SessionHandle;
use crate::error::AdcError;
use crate::pingpong::BufferEvent;
use crate::request::Bank;

/// Depth of the deferred event FIFO.
pub const EVENT_QUEUE_DEPTH: usize = 8;

/// A filled bank as seen by the callback.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyBuffer<'s> {
    pub request: usize,
    pub channel: usize,
    pub bank: Bank,
    pub samples: &'s [u16],
    pub sequence: u32,
    pub is_final: bool,
}

impl<'s> ReadyBuffer<'s> {
    pub(crate) fn new(event: &BufferEvent, bank: &'s [u16]) -> Self {
        Self {
            request: event.request,
            channel: event.channel,
            bank: event.bank,
            samples: &bank[..event.len],
            sequence: event.sequence,
            is_final: event.is_final,
        }
    }
}

/// Conversion callback.
///
/// Gets every filled bank in arrival order, then `Err` if the session ends
/// with [`AdcError::Cancelled`] or [`AdcError::HardwareFault`]. Returning
/// [`ControlFlow::Break`] stops the session without a further notification.
///
/// In [`DispatchMode::Immediate`] the callback runs inside the completion
/// handler with the driver locked: keep it short, and do not call back into
/// the driver from it. In [`DispatchMode::Deferred`] it runs from
/// `dispatch_pending`, still with the driver locked: completions arriving
/// meanwhile wait for it to return.
pub type Callback<'a> = Box<
    dyn for<'s> FnMut(SessionHandle, Result<ReadyBuffer<'s>, AdcError>) -> ControlFlow<()>
        + Send
        + 'a,
>;

/// Notification waiting in the deferred FIFO.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Pending {
    Ready(SessionHandle, BufferEvent),
    Failed(SessionHandle, AdcError),
}

pub(crate) struct Dispatcher<'a> {
    callback: Option<Callback<'a>>,
    mode: DispatchMode,
    queue: Deque<Pending, EVENT_QUEUE_DEPTH>,
    overruns: u32,
}

impl<'a> Dispatcher<'a> {
    pub(crate) fn new(mode: DispatchMode) -> Self {
        Self {
            callback: None,
            mode,
            queue: Deque::new(),
            overruns: 0,
        }
    }

    pub(crate) fn set_callback(&mut self, callback: Callback<'a>) {
        self.callback = Some(callback);
    }

    pub(crate) fn clear_callback(&mut self) {
        self.callback = None;
    }

    pub(crate) fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    pub(crate) fn mode(&self) -> DispatchMode {
        self.mode
    }

    pub(crate) fn overruns(&self) -> u32 {
        self.overruns
    }

    pub(crate) fn record_overrun(&mut self) {
        self.overruns = self.overruns.saturating_add(1);
    }

    /// Queue `pending`; a full FIFO drops it and counts an overrun.
    pub(crate) fn enqueue(&mut self, pending: Pending) {
        if self.queue.push_back(pending).is_err() {
            self.record_overrun();
            warn!("deferred event dropped, queue full ({EVENT_QUEUE_DEPTH})");
        }
    }

    pub(crate) fn pop(&mut self) -> Option<Pending> {
        self.queue.pop_front()
    }

    pub(crate) fn queued(&self) -> usize {
        self.queue.len()
    }

    /// Whether a bank of `handle` is still waiting for dispatch.
    pub(crate) fn holds_ready(&self, handle: SessionHandle) -> bool {
        self.queue
            .iter()
            .any(|pending| matches!(pending, Pending::Ready(queued, _) if *queued == handle))
    }

    /// Run the callback on a filled bank.
    pub(crate) fn deliver(
        &mut self,
        handle: SessionHandle,
        buffer: ReadyBuffer<'_>,
    ) -> ControlFlow<()> {
        match self.callback.as_mut() {
            Some(callback) => callback(handle, Ok(buffer)),
            None => ControlFlow::Continue(()),
        }
    }

    /// Tell the callback the session ended with `err`.
    pub(crate) fn fail(&mut self, handle: SessionHandle, err: AdcError) {
        if let Some(callback) = self.callback.as_mut() {
            // The session is already over; Break has nothing left to stop.
            let _ = callback(handle, Err(err));
        }
    }
}
