//! Host simulation HAL implementation
//!
//! Stand-ins for the ADC sampling backend and the power manager that run on
//! a development host. Every call is recorded so tests can assert on the
//! exact sequence the driver core issued, and failures can be injected to
//! exercise fault paths.
//!
//! The simulated backend does not raise completions by itself: the test (or
//! the `adcscope` tool) plays the interrupt by calling the driver's
//! completion entry point, typically from a second thread once
//! [`SimProbe::wait_until_armed`] returns.
//!
//! ## Example
//! ```
//! use hal::{PowerConstraint, PowerManager};
//! use hal_sim::SimulatedPower;
//!
//! let (mut power, probe) = SimulatedPower::new();
//! power.acquire_constraint(PowerConstraint::DisallowStandby);
//! assert_eq!(probe.outstanding(PowerConstraint::DisallowStandby), 1);
//! ```

pub mod backend;
pub mod power;
pub mod waveform;

// Re-export commonly used types
pub use backend::{BackendCall, SimProbe, SimulatedBackend, SIM_TIMER_CLOCK_HZ};
pub use power::{PowerProbe, SimulatedPower};
pub use waveform::Waveform;
