//! Session and authentication layer for Mifare DESFire cards
//!
//! This crate manages authenticated sessions with DESFire-class smartcards
//! over a caller-supplied tag transport. It covers the connection lifecycle,
//! mutual authentication with DES, 3K3DES and AES keys, key and key-settings
//! management, and a resolver that turns ambiguous I/O failures into the
//! most specific error the link, the reader or the card can report.
//!
//! The main entry point is the [`Session`] struct. Keys are built with
//! [`Key`], which tags its material with a [`KeyAlgorithm`] so that the
//! session can choose the matching authentication command on its own.
//!
//! ```no_run
//! use nexum_desfire::{Key, KeyAlgorithm, Session, TagTransport};
//!
//! fn provision<T: TagTransport>(transport: T) -> nexum_desfire::Result<()> {
//!     let mut session = Session::new(transport);
//!     session.connect()?;
//!
//!     let factory = Key::factory_default(KeyAlgorithm::Des);
//!     session.authenticate(0, &factory)?;
//!     session.change_key(0, &Key::aes([0x42; 16], 1), &factory)?;
//!
//!     session.disconnect()
//! }
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

mod command;
pub mod config;
pub mod constants;
mod crypto;
mod error;
pub mod key;
pub mod resolver;
mod secure_channel;
pub mod session;
pub mod status;
pub mod transport;

// Re-exports
pub use config::SessionConfig;
pub use constants::{FileType, PICC_AID};
pub use error::{Error, Result};
pub use key::{Key, KeyAlgorithm};
pub use session::Session;
pub use status::PiccStatus;
pub use transport::{PcdError, TagTransport, TransportError};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::{
        Error, Key, KeyAlgorithm, PcdError, PiccStatus, Result, Session, SessionConfig,
        TagTransport, TransportError,
    };
}

/// Convenience functions for common operations
pub mod operations {
    use crate::{Key, Result, Session, TagTransport};

    /// Connect to a tag, select an application and authenticate
    pub fn connect_and_authenticate<T: TagTransport>(
        transport: T,
        aid: [u8; 3],
        key_no: u8,
        key: &Key,
    ) -> Result<Session<T>> {
        let mut session = Session::new(transport);
        session.connect()?;
        session.select_application(aid)?;
        session.authenticate(key_no, key)?;
        Ok(session)
    }

    /// Read the versions of the first `count` keys of the selected application
    pub fn key_versions<T: TagTransport>(session: &mut Session<T>, count: u8) -> Result<Vec<u8>> {
        (0..count).map(|key_no| session.key_version(key_no)).collect()
    }
}
