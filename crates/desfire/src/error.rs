use thiserror::Error;

use crate::{
    key::KeyAlgorithm,
    status::PiccStatus,
    transport::{PcdError, TransportError},
};

/// Result type for DESFire operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for DESFire operations
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// Key material does not match the length its algorithm requires
    #[error("Invalid {algorithm} key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Algorithm of the rejected key
        algorithm: KeyAlgorithm,
        /// Required length
        expected: usize,
        /// Supplied length
        actual: usize,
    },

    /// Operation requires a connected session
    #[error("Session is not connected")]
    NotConnected,

    /// Operation requires an authenticated session
    #[error("Session is not authenticated")]
    NotAuthenticated,

    /// Error reported by the transport layer
    #[error(transparent)]
    Transport(TransportError),

    /// Error reported by the reader chip
    #[error("Reader error: {0}")]
    Pcd(PcdError),

    /// Error status reported by the card
    #[error("Card error: {0}")]
    Picc(PiccStatus),

    /// Raw I/O failure that has not been attributed yet
    #[error("Ambiguous input/output error")]
    AmbiguousIo,

    /// I/O failure that none of the diagnostic registers could explain
    #[error("Unknown error")]
    Unknown,

    /// Cryptographic check failed
    #[error("Cryptographic error: {0}")]
    Crypto(&'static str),

    /// Response could not be parsed
    #[error("Invalid response: {0}")]
    InvalidResponse(&'static str),

    /// Response did not carry a native DESFire status word
    #[error("Unexpected status word: {sw1:02X}{sw2:02X}")]
    UnexpectedStatus {
        /// First status byte
        sw1: u8,
        /// Second status byte
        sw2: u8,
    },
}

impl Error {
    /// Check if this error still has to be resolved through the diagnostic registers
    pub const fn is_ambiguous(&self) -> bool {
        matches!(self, Self::AmbiguousIo)
    }

    /// Check if this error was raised before anything reached the tag
    pub const fn is_local(&self) -> bool {
        matches!(
            self,
            Self::InvalidKeyLength { .. } | Self::NotConnected | Self::NotAuthenticated
        )
    }

    /// Get the card status carried by this error, if any
    pub const fn picc_status(&self) -> Option<PiccStatus> {
        match self {
            Self::Picc(status) => Some(*status),
            _ => None,
        }
    }
}

impl From<TransportError> for Error {
    fn from(error: TransportError) -> Self {
        if error.is_ambiguous() {
            Self::AmbiguousIo
        } else {
            Self::Transport(error)
        }
    }
}

impl From<PcdError> for Error {
    fn from(error: PcdError) -> Self {
        Self::Pcd(error)
    }
}

impl From<PiccStatus> for Error {
    fn from(status: PiccStatus) -> Self {
        Self::Picc(status)
    }
}
