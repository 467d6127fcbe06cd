//! Ping-pong bank bookkeeping for a running session.
//!
//! Runs inside the completion handler: no allocation, no blocking, and the
//! work per call is bounded by one bank copy plus one scan of the request
//! list.

use crate::config::RecurrenceMode;
use crate::request::{Bank, ConversionRequest};

/// A bank that has just been filled and may be handed to the consumer.
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BufferEvent {
    /// Position of the request in the session.
    pub request: usize,
    /// Channel table index of the request.
    pub channel: usize,
    /// Bank holding the samples.
    pub bank: Bank,
    /// Number of valid samples at the start of the bank.
    pub len: usize,
    /// Fill number of this bank for its request, starting at 1.
    pub sequence: u32,
    /// Last bank of a one-shot request.
    pub is_final: bool,
}

/// Outcome of feeding one hardware completion into [`PingPong`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct SampleStep {
    pub event: Option<BufferEvent>,
    /// New active request when round-robin moved to another one.
    pub next: Option<usize>,
    /// Samples that did not fit the active bank's quota.
    pub dropped: usize,
}

/// Progress tracking and bank selection for the requests of one session.
#[derive(Debug)]
pub struct PingPong<'a> {
    requests: Vec<ConversionRequest<'a>>,
    active: usize,
    recurrence: RecurrenceMode,
    toggles: u32,
}

impl<'a> PingPong<'a> {
    /// Take over `requests`, resetting their progress.
    pub fn new(mut requests: Vec<ConversionRequest<'a>>, recurrence: RecurrenceMode) -> Self {
        for request in &mut requests {
            request.reset();
        }
        Self {
            requests,
            active: 0,
            recurrence,
            toggles: 0,
        }
    }

    /// Index of the request currently being sampled.
    pub fn active(&self) -> usize {
        self.active
    }

    pub fn requests(&self) -> &[ConversionRequest<'a>] {
        &self.requests
    }

    /// Bank toggles across all requests since the session started.
    pub fn toggles(&self) -> u32 {
        self.toggles
    }

    /// Every request of a one-shot session has its samples.
    pub fn is_complete(&self) -> bool {
        self.recurrence == RecurrenceMode::OneShot
            && self.requests.iter().all(ConversionRequest::is_satisfied)
    }

    pub fn into_requests(self) -> Vec<ConversionRequest<'a>> {
        self.requests
    }

    /// Record `samples` from the active channel.
    ///
    /// Samples go into the active bank of the active request up to the
    /// current fill quota, which is one bank or whatever is left of the
    /// request, whichever is smaller. Reaching the quota toggles that
    /// request's bank, yields a [`BufferEvent`] and moves round-robin to the
    /// next request that still needs samples.
    pub fn on_sample_complete(&mut self, samples: &[u16]) -> SampleStep {
        let recurrence = self.recurrence;
        let index = self.active;
        let Some(request) = self.requests.get_mut(index) else {
            return SampleStep {
                dropped: samples.len(),
                ..SampleStep::default()
            };
        };

        let quota = fill_quota(request);
        let take = quota.saturating_sub(request.fill).min(samples.len());
        let dropped = samples.len() - take;
        if take > 0 {
            let start = request.fill;
            request.banks[request.active_bank.index()][start..start + take]
                .copy_from_slice(&samples[..take]);
            request.fill += take;
            request.delivered += take as u32;
        }

        if quota == 0 || request.fill < quota {
            return SampleStep {
                event: None,
                next: None,
                dropped,
            };
        }

        let ready = request.active_bank;
        request.active_bank = ready.other();
        request.fill = 0;
        request.fills += 1;
        self.toggles += 1;

        let satisfied = request.is_satisfied();
        let event = BufferEvent {
            request: index,
            channel: request.channel,
            bank: ready,
            len: quota,
            sequence: request.fills,
            is_final: recurrence == RecurrenceMode::OneShot && satisfied,
        };
        if recurrence == RecurrenceMode::Continuous && satisfied {
            request.delivered = 0;
        }

        SampleStep {
            event: Some(event),
            next: self.advance(),
            dropped,
        }
    }

    /// Move to the next request in start order that still wants samples.
    fn advance(&mut self) -> Option<usize> {
        let count = self.requests.len();
        let next = (1..=count)
            .map(|step| (self.active + step) % count)
            .find(|&idx| !self.requests[idx].is_satisfied())?;
        if next == self.active {
            return None;
        }
        self.active = next;
        Some(next)
    }
}

fn fill_quota(request: &ConversionRequest<'_>) -> usize {
    let bank_start = request.delivered as usize - request.fill;
    (request.requested as usize)
        .saturating_sub(bank_start)
        .min(request.bank_len())
}
