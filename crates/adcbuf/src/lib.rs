//! # adcbuf
//!
//! Buffered ADC conversion driver core. A session samples one or more
//! channels from a hardware trigger timer, writes the results into
//! caller-owned ping-pong banks and hands every filled bank to the caller,
//! either by waking a blocked [`AdcBuf::start`] or through a registered
//! callback.
//!
//! ## Module Overview
//! - [`controller`] – session lifecycle, arming and cancellation.
//! - [`pingpong`]   – per-request progress and bank toggling.
//! - [`dispatch`]   – callback delivery, immediate or deferred.
//! - [`adjust`]     – gain/offset calibration and microvolt conversion.
//! - [`config`]     – driver and session configuration.
//! - [`sync`]       – session lock and completion signal.
//!
//! Hardware is reached only through the [`hal::SamplingBackend`] and
//! [`hal::PowerManager`] traits.

pub mod adjust;
pub mod config;
pub mod controller;
pub mod dispatch;
pub mod error;
pub mod pingpong;
pub mod request;
pub mod sync;

pub use adjust::{adjust, to_microvolts, Gain};
pub use config::{
    ChannelSetting, DispatchMode, DriverConfig, DriverConfigBuilder, RecurrenceMode, ReturnMode,
    SessionParams,
};
pub use controller::{AdcBuf, SessionHandle, SessionState, SessionStatus};
pub use dispatch::{Callback, ReadyBuffer, EVENT_QUEUE_DEPTH};
pub use error::{AdcError, AdcResult};
pub use pingpong::{BufferEvent, PingPong, SampleStep};
pub use request::{Bank, ConversionRequest};

#[cfg(test)]
mod tests;
