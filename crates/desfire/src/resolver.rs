//! Resolution of ambiguous I/O failures
//!
//! A transport that cannot attribute a failure reports a raw I/O error. The
//! cause is then read from the diagnostic registers in a fixed order: the
//! link itself, the reader chip (PCD), and finally the card (PICC). The
//! first register that holds something wins and later ones are not read.

use tracing::debug;

use crate::{Error, transport::TagTransport};

/// Work out the most specific error behind an ambiguous I/O failure
///
/// A link register holding another raw I/O failure, or a card register
/// holding a non-error status, counts as empty. If every register is empty
/// the failure is reported as [`Error::Unknown`].
pub fn resolve<T: TagTransport + ?Sized>(transport: &T) -> Error {
    if let Some(error) = transport.last_error().filter(|e| !e.is_ambiguous()) {
        debug!(%error, "Resolved I/O failure from the link register");
        return Error::Transport(error);
    }

    if let Some(error) = transport.last_pcd_error() {
        debug!(%error, "Resolved I/O failure from the reader register");
        return Error::Pcd(error);
    }

    if let Some(status) = transport.last_picc_error().filter(|s| s.is_error()) {
        debug!(%status, "Resolved I/O failure from the card register");
        return Error::Picc(status);
    }

    debug!("No diagnostic register explains the I/O failure");
    Error::Unknown
}

/// Pass definite errors through and resolve ambiguous ones
pub fn refine<T: TagTransport + ?Sized>(transport: &T, error: Error) -> Error {
    if error.is_ambiguous() {
        resolve(transport)
    } else {
        error
    }
}
