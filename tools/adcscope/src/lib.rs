//! Host-side front end for the buffered ADC driver.
//!
//! Runs a session against the simulated backend, playing the conversion
//! interrupt from a second thread, and turns every delivered bank into a
//! [`BufferRecord`] that the [`BufferFormatter`] prints as text or JSON.

mod args;
mod formatter;
mod scope;

pub use args::{ChannelArg, ChannelArgError, WaveKind};
pub use formatter::BufferFormatter;
pub use scope::{run, BufferRecord, ScopeOptions};
