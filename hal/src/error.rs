//! Common error types for HAL operations

use core::fmt;

/// HAL operation errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum HalError {
    /// Invalid parameter provided
    InvalidParameter,
    /// Operation not supported by this implementation
    NotSupported,
    /// Peripheral is busy
    Busy,
    /// Conversion result overwritten before it was read
    Overflow,
    /// Conversion clock or trigger timer failed to start
    TimingError,
    /// Hardware error occurred
    HardwareError,
    /// Vendor-specific error code
    VendorError(i32),
}

impl fmt::Display for HalError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InvalidParameter => write!(f, "invalid parameter"),
            Self::NotSupported => write!(f, "operation not supported"),
            Self::Busy => write!(f, "peripheral busy"),
            Self::Overflow => write!(f, "conversion result overflow"),
            Self::TimingError => write!(f, "trigger timing error"),
            Self::HardwareError => write!(f, "hardware error"),
            Self::VendorError(code) => write!(f, "vendor error code: {}", code),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for HalError {}

#[cfg(feature = "defmt")]
impl defmt::Format for HalError {
    fn format(&self, fmt: defmt::Formatter) {
        match self {
            Self::InvalidParameter => defmt::write!(fmt, "InvalidParameter"),
            Self::NotSupported => defmt::write!(fmt, "NotSupported"),
            Self::Busy => defmt::write!(fmt, "Busy"),
            Self::Overflow => defmt::write!(fmt, "Overflow"),
            Self::TimingError => defmt::write!(fmt, "TimingError"),
            Self::HardwareError => defmt::write!(fmt, "HardwareError"),
            Self::VendorError(code) => defmt::write!(fmt, "VendorError({})", code),
        }
    }
}

/// Result type for HAL operations
pub type HalResult<T> = Result<T, HalError>;
