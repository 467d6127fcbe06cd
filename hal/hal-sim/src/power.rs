//! Simulated power manager

use std::collections::HashMap;
use std::sync::Arc;

use hal::power::{PowerConstraint, PowerManager};
use parking_lot::Mutex;

#[derive(Default)]
struct PowerState {
    outstanding: HashMap<PowerConstraint, i32>,
    acquired: usize,
    released: usize,
}

/// Power manager that only counts constraints
pub struct SimulatedPower {
    state: Arc<Mutex<PowerState>>,
}

/// Observer half of a [`SimulatedPower`]
#[derive(Clone)]
pub struct PowerProbe {
    state: Arc<Mutex<PowerState>>,
}

impl SimulatedPower {
    pub fn new() -> (Self, PowerProbe) {
        let state = Arc::new(Mutex::new(PowerState::default()));
        (
            Self {
                state: Arc::clone(&state),
            },
            PowerProbe { state },
        )
    }
}

impl PowerManager for SimulatedPower {
    fn acquire_constraint(&mut self, constraint: PowerConstraint) {
        let mut state = self.state.lock();
        *state.outstanding.entry(constraint).or_insert(0) += 1;
        state.acquired += 1;
    }

    fn release_constraint(&mut self, constraint: PowerConstraint) {
        let mut state = self.state.lock();
        // Allowed to go negative so an unpaired release shows up in tests.
        *state.outstanding.entry(constraint).or_insert(0) -= 1;
        state.released += 1;
    }
}

impl PowerProbe {
    /// Acquisitions minus releases for `constraint`
    pub fn outstanding(&self, constraint: PowerConstraint) -> i32 {
        self.state
            .lock()
            .outstanding
            .get(&constraint)
            .copied()
            .unwrap_or(0)
    }

    /// Total acquire calls across all constraints
    pub fn acquired(&self) -> usize {
        self.state.lock().acquired
    }

    /// Total release calls across all constraints
    pub fn released(&self) -> usize {
        self.state.lock().released
    }
}
