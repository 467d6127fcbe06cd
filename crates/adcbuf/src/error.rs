//! Driver error taxonomy.

use hal::HalError;
use thiserror::Error;

/// Errors reported by the conversion driver.
///
/// Validation failures (`AlreadyInProgress`, `InvalidRequest`,
/// `NotInProgress`, `InvalidResolution`) are returned synchronously.
/// Runtime outcomes (`Timeout`, `Cancelled`, `HardwareFault`) reach the
/// caller through the same path as success: the return value of a blocking
/// `start`, or the `Err` arm handed to the registered callback.
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdcError {
    #[error("a conversion session is already in progress")]
    AlreadyInProgress,
    #[error("invalid conversion request: {0}")]
    InvalidRequest(&'static str),
    #[error("no conversion session in progress")]
    NotInProgress,
    #[error("conversion timed out")]
    Timeout,
    #[error("conversion cancelled")]
    Cancelled,
    #[error("invalid resolution: {0} bits")]
    InvalidResolution(u32),
    #[error("hardware fault: {0}")]
    HardwareFault(HalError),
}

/// Result type used throughout the driver.
pub type AdcResult<T> = Result<T, AdcError>;
