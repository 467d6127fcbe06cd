//! Hardware Abstraction Layer (HAL) for buffered ADC sampling
//!
//! This crate provides the vendor-agnostic seams the `adcbuf` driver core
//! talks to: a sampling backend that owns the ADC core and its trigger timer,
//! and a power manager that keeps the device out of low-power states while a
//! session runs. Concrete implementations live in sibling crates
//! (`hal-sim` for host simulation).

#![cfg_attr(not(feature = "std"), no_std)]

pub mod error;
pub mod adc;
pub mod timer;
pub mod power;

// Re-export commonly used types
pub use error::{HalError, HalResult};
pub use adc::{AdcChannelId, PinConfig, ReferenceSource, SamplingBackend, SamplingDuration};
pub use power::{PowerConstraint, PowerManager};
pub use timer::{timer_period_ticks, TimerTrigger};
