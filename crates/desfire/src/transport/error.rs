//! Error types reported by tag transports and readers

use std::fmt;

use thiserror::Error;

/// Transport error type
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    /// Raw I/O failure; the cause has to be resolved from the diagnostic registers
    #[error("Input/output error")]
    Io,

    /// Connection error
    #[error("Failed to connect to tag")]
    Connection,

    /// Tag is no longer in the field
    #[error("Tag removed from the field")]
    TagRemoved,

    /// Driver error (with code)
    #[error("Driver error code: {0}")]
    Driver(i32),

    /// Timeout error
    #[error("Operation timed out")]
    Timeout,

    /// Other error with message
    #[error("{0}")]
    Other(String),
}

impl TransportError {
    /// Create a new driver error
    pub const fn driver(code: i32) -> Self {
        Self::Driver(code)
    }

    /// Create a general other error
    pub fn other<S: Into<String>>(message: S) -> Self {
        Self::Other(message.into())
    }

    /// Check if this error is a raw I/O failure that does not name its cause
    pub const fn is_ambiguous(&self) -> bool {
        matches!(self, Self::Io)
    }
}

/// Error reported by the reader chip (PCD)
///
/// Codes follow the libnfc numbering so that reader drivers can hand them
/// through unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PcdError {
    /// Input / output error, device may not be usable anymore
    Io,
    /// Invalid argument(s)
    InvalidArgument,
    /// Operation not supported by device
    DeviceNotSupported,
    /// No such device
    NoSuchDevice,
    /// Buffer overflow
    BufferOverflow,
    /// Operation timed out
    Timeout,
    /// Operation aborted (by user)
    OperationAborted,
    /// Not (yet) implemented
    NotImplemented,
    /// Target released
    TargetReleased,
    /// Error during RF transmission
    RfTransmission,
    /// MIFARE Classic authentication failed
    MifareAuthFailed,
    /// Software error (allocation, file/pipe creation, etc.)
    Soft,
    /// Device's internal chip error
    Chip,
    /// Code not known to this crate
    Other(i32),
}

impl PcdError {
    /// Get the error from its libnfc code
    pub const fn from_code(code: i32) -> Self {
        match code {
            -1 => Self::Io,
            -2 => Self::InvalidArgument,
            -3 => Self::DeviceNotSupported,
            -4 => Self::NoSuchDevice,
            -5 => Self::BufferOverflow,
            -6 => Self::Timeout,
            -7 => Self::OperationAborted,
            -8 => Self::NotImplemented,
            -10 => Self::TargetReleased,
            -20 => Self::RfTransmission,
            -30 => Self::MifareAuthFailed,
            -80 => Self::Soft,
            -90 => Self::Chip,
            other => Self::Other(other),
        }
    }

    /// Get the libnfc code of this error
    pub const fn code(&self) -> i32 {
        match self {
            Self::Io => -1,
            Self::InvalidArgument => -2,
            Self::DeviceNotSupported => -3,
            Self::NoSuchDevice => -4,
            Self::BufferOverflow => -5,
            Self::Timeout => -6,
            Self::OperationAborted => -7,
            Self::NotImplemented => -8,
            Self::TargetReleased => -10,
            Self::RfTransmission => -20,
            Self::MifareAuthFailed => -30,
            Self::Soft => -80,
            Self::Chip => -90,
            Self::Other(code) => *code,
        }
    }

    /// Get a description of this error
    pub const fn description(&self) -> &'static str {
        match self {
            Self::Io => "Input / output error",
            Self::InvalidArgument => "Invalid argument(s)",
            Self::DeviceNotSupported => "Not supported by device",
            Self::NoSuchDevice => "No such device",
            Self::BufferOverflow => "Buffer overflow",
            Self::Timeout => "Timeout",
            Self::OperationAborted => "Operation aborted",
            Self::NotImplemented => "Not (yet) implemented",
            Self::TargetReleased => "Target released",
            Self::RfTransmission => "RF transmission error",
            Self::MifareAuthFailed => "MIFARE authentication failed",
            Self::Soft => "Software error",
            Self::Chip => "Device's internal chip error",
            Self::Other(_) => "Unknown PCD error",
        }
    }
}

impl fmt::Display for PcdError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.description(), self.code())
    }
}
