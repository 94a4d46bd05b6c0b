//! PICC status codes reported by DESFire cards

use std::fmt;

/// Status code returned by the card (PICC) in SW2 of a wrapped native response
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PiccStatus {
    /// Successful operation
    OperationOk,
    /// No changes done to backup files
    NoChanges,
    /// Insufficient NV-memory to complete command
    OutOfEeprom,
    /// Command code not supported
    IllegalCommand,
    /// CRC or MAC does not match data
    IntegrityError,
    /// Invalid key number specified
    NoSuchKey,
    /// Length of command string invalid
    LengthError,
    /// Current configuration or status does not allow the command
    PermissionDenied,
    /// Value of the parameter(s) invalid
    ParameterError,
    /// Requested application not present
    ApplicationNotFound,
    /// Unrecoverable error within application
    ApplicationIntegrityError,
    /// Current authentication status does not allow the command
    AuthenticationError,
    /// Additional data frame is expected
    AdditionalFrame,
    /// Attempt to read or write beyond the file limits
    BoundaryError,
    /// Unrecoverable error within PICC
    PiccIntegrityError,
    /// Previous command was not fully completed
    CommandAborted,
    /// PICC was disabled by an unrecoverable error
    PiccDisabled,
    /// Number of applications limited to 28
    CountError,
    /// Creation of a file or application failed because it already exists
    DuplicateError,
    /// Could not complete NV-write operation
    EepromError,
    /// Specified file number does not exist
    FileNotFound,
    /// Unrecoverable error within file
    FileIntegrityError,
    /// Status code not known to this crate
    Other(u8),
}

impl PiccStatus {
    /// Get the status from its wire code
    pub const fn from_u8(code: u8) -> Self {
        match code {
            0x00 => Self::OperationOk,
            0x0C => Self::NoChanges,
            0x0E => Self::OutOfEeprom,
            0x1C => Self::IllegalCommand,
            0x1E => Self::IntegrityError,
            0x40 => Self::NoSuchKey,
            0x7E => Self::LengthError,
            0x9D => Self::PermissionDenied,
            0x9E => Self::ParameterError,
            0xA0 => Self::ApplicationNotFound,
            0xA1 => Self::ApplicationIntegrityError,
            0xAE => Self::AuthenticationError,
            0xAF => Self::AdditionalFrame,
            0xBE => Self::BoundaryError,
            0xC1 => Self::PiccIntegrityError,
            0xCA => Self::CommandAborted,
            0xCD => Self::PiccDisabled,
            0xCE => Self::CountError,
            0xDE => Self::DuplicateError,
            0xEE => Self::EepromError,
            0xF0 => Self::FileNotFound,
            0xF1 => Self::FileIntegrityError,
            other => Self::Other(other),
        }
    }

    /// Get the wire code of this status
    pub const fn code(&self) -> u8 {
        match self {
            Self::OperationOk => 0x00,
            Self::NoChanges => 0x0C,
            Self::OutOfEeprom => 0x0E,
            Self::IllegalCommand => 0x1C,
            Self::IntegrityError => 0x1E,
            Self::NoSuchKey => 0x40,
            Self::LengthError => 0x7E,
            Self::PermissionDenied => 0x9D,
            Self::ParameterError => 0x9E,
            Self::ApplicationNotFound => 0xA0,
            Self::ApplicationIntegrityError => 0xA1,
            Self::AuthenticationError => 0xAE,
            Self::AdditionalFrame => 0xAF,
            Self::BoundaryError => 0xBE,
            Self::PiccIntegrityError => 0xC1,
            Self::CommandAborted => 0xCA,
            Self::PiccDisabled => 0xCD,
            Self::CountError => 0xCE,
            Self::DuplicateError => 0xDE,
            Self::EepromError => 0xEE,
            Self::FileNotFound => 0xF0,
            Self::FileIntegrityError => 0xF1,
            Self::Other(code) => *code,
        }
    }

    /// Check if this status ends a command successfully
    pub const fn is_success(&self) -> bool {
        matches!(self, Self::OperationOk)
    }

    /// Check if the card expects or offers another frame
    pub const fn is_additional_frame(&self) -> bool {
        matches!(self, Self::AdditionalFrame)
    }

    /// Check if this status reports an error
    pub const fn is_error(&self) -> bool {
        !self.is_success() && !self.is_additional_frame()
    }

    /// Get a description of this status
    pub const fn description(&self) -> &'static str {
        match self {
            Self::OperationOk => "Successful operation",
            Self::NoChanges => "No changes done to backup files",
            Self::OutOfEeprom => "Insufficient NV-memory to complete command",
            Self::IllegalCommand => "Command code not supported",
            Self::IntegrityError => "CRC or MAC does not match data",
            Self::NoSuchKey => "Invalid key number specified",
            Self::LengthError => "Length of command string invalid",
            Self::PermissionDenied => "Current configuration or status does not allow the command",
            Self::ParameterError => "Value of the parameter(s) invalid",
            Self::ApplicationNotFound => "Requested application not present",
            Self::ApplicationIntegrityError => "Unrecoverable error within application",
            Self::AuthenticationError => {
                "Current authentication status does not allow the command"
            }
            Self::AdditionalFrame => "Additional data frame is expected",
            Self::BoundaryError => "Attempt to read or write beyond the file limits",
            Self::PiccIntegrityError => "Unrecoverable error within PICC",
            Self::CommandAborted => "Previous command was not fully completed",
            Self::PiccDisabled => "PICC was disabled by an unrecoverable error",
            Self::CountError => "Number of applications limited to 28",
            Self::DuplicateError => "File or application already exists",
            Self::EepromError => "Could not complete NV-write operation",
            Self::FileNotFound => "Specified file number does not exist",
            Self::FileIntegrityError => "Unrecoverable error within file",
            Self::Other(_) => "Unknown PICC status",
        }
    }
}

impl From<u8> for PiccStatus {
    fn from(code: u8) -> Self {
        Self::from_u8(code)
    }
}

impl From<PiccStatus> for u8 {
    fn from(status: PiccStatus) -> Self {
        status.code()
    }
}

impl fmt::Display for PiccStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({:#04X})", self.description(), self.code())
    }
}
