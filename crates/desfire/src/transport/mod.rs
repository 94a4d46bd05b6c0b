//! Transport traits for communication with DESFire tags
//!
//! A transport owns the link to exactly one physical tag. It moves raw
//! command and response bytes and exposes the diagnostic registers of the
//! link, the reader (PCD) and the card (PICC). It has no knowledge of
//! authentication state or secure messaging.

pub mod error;

#[cfg(test)]
pub(crate) mod mock;
#[cfg(test)]
pub(crate) mod simulated;

use std::fmt;

use bytes::Bytes;
use tracing::{debug, trace};

pub use error::{PcdError, TransportError};

use crate::status::PiccStatus;

/// Trait for tag transports
///
/// Implementations report failures they cannot attribute as
/// [`TransportError::Io`] and keep the diagnostic registers of the last
/// command so that the session can work out what went wrong.
pub trait TagTransport: Send + fmt::Debug {
    /// Establish the link to the tag
    fn connect(&mut self) -> Result<(), TransportError>;

    /// Tear down the link to the tag
    fn disconnect(&mut self) -> Result<(), TransportError>;

    /// Send raw command bytes to the tag and return the response bytes
    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        trace!(command = %hex::encode(command), "Transmitting raw command");
        let result = self.do_transmit_raw(command);
        match &result {
            Ok(response) => {
                trace!(response = %hex::encode(response), "Received raw response");
            }
            Err(e) => {
                debug!(error = ?e, "Transport error during transmission");
            }
        }
        result
    }

    /// Internal implementation of transmit_raw
    ///
    /// This is the method that concrete implementations should override.
    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError>;

    /// Last error of the physical link, if any
    fn last_error(&self) -> Option<TransportError>;

    /// Last error reported by the reader chip, if any
    fn last_pcd_error(&self) -> Option<PcdError>;

    /// Last error status reported by the card, if any
    fn last_picc_error(&self) -> Option<PiccStatus>;
}

impl<T: TagTransport + ?Sized> TagTransport for Box<T> {
    fn connect(&mut self) -> Result<(), TransportError> {
        (**self).connect()
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        (**self).disconnect()
    }

    fn transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).transmit_raw(command)
    }

    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        (**self).do_transmit_raw(command)
    }

    fn last_error(&self) -> Option<TransportError> {
        (**self).last_error()
    }

    fn last_pcd_error(&self) -> Option<PcdError> {
        (**self).last_pcd_error()
    }

    fn last_picc_error(&self) -> Option<PiccStatus> {
        (**self).last_picc_error()
    }
}
