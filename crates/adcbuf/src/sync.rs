//! Synchronization primitives shared by task and interrupt context.
//!
//! [`SessionLock`] is the binary "conversion in progress" lock and
//! [`Completion`] is the single-producer/single-consumer handoff a blocking
//! `start` waits on. Both are built on `parking_lot` so they never poison.

use core::sync::atomic::{AtomicBool, Ordering};
use std::time::Instant;

use hal::HalError;
use parking_lot::{Condvar, Mutex};

/// Non-recursive binary lock held for the lifetime of one session.
#[derive(Debug, Default)]
pub struct SessionLock {
    held: AtomicBool,
}

impl SessionLock {
    pub const fn new() -> Self {
        Self {
            held: AtomicBool::new(false),
        }
    }

    /// Take the lock if it is free.
    pub fn try_acquire(&self) -> bool {
        self.held
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Free the lock. Returns `false` if it was not held.
    pub fn release(&self) -> bool {
        self.held.swap(false, Ordering::AcqRel)
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }
}

/// Why a blocked `start` was woken.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Wake {
    Completed,
    Cancelled,
    Fault(HalError),
}

/// One-shot wake-up slot.
///
/// The first [`signal`](Completion::signal) after a [`reset`](Completion::reset)
/// is kept; later ones are ignored until the waiter consumes it, so a waiter
/// is woken at most once per session.
#[derive(Debug, Default)]
pub struct Completion {
    slot: Mutex<Option<Wake>>,
    ready: Condvar,
}

impl Completion {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget any wake-up left over from an earlier session.
    pub fn reset(&self) {
        self.slot.lock().take();
    }

    /// Post `wake`. Returns `false` if a wake-up is already pending.
    pub fn signal(&self, wake: Wake) -> bool {
        let mut slot = self.slot.lock();
        if slot.is_some() {
            return false;
        }
        *slot = Some(wake);
        self.ready.notify_one();
        true
    }

    /// Wait for a wake-up until `deadline`, or forever when `None`.
    ///
    /// Returns `None` if the deadline passed with nothing posted.
    pub fn wait(&self, deadline: Option<Instant>) -> Option<Wake> {
        let mut slot = self.slot.lock();
        loop {
            if let Some(wake) = slot.take() {
                return Some(wake);
            }
            match deadline {
                None => self.ready.wait(&mut slot),
                Some(deadline) => {
                    if self.ready.wait_until(&mut slot, deadline).timed_out() {
                        return slot.take();
                    }
                }
            }
        }
    }
}
