//! DESFire session
//!
//! A [`Session`] owns the transport to one tag and tracks what the card
//! knows about us: whether the link is up, which application is selected
//! and which key, if any, the session is authenticated with.

use bytes::Bytes;
use tracing::{debug, warn};

use crate::{
    Error, Result,
    command::{NativeCommand, transceive},
    config::SessionConfig,
    constants::{KEY_NO_MASK, PICC_AID, ins},
    key::{Key, KeyAlgorithm},
    resolver,
    secure_channel::SecureChannel,
    status::PiccStatus,
    transport::{PcdError, TagTransport},
};

/// Session with a single DESFire tag
///
/// Every operation except [`connect`](Self::connect) and
/// [`disconnect`](Self::disconnect) fails with [`Error::NotConnected`] until
/// the session is connected. Changing keys or key settings ends the
/// authenticated state, so callers re-authenticate afterwards.
#[derive(Debug)]
pub struct Session<T: TagTransport> {
    /// Transport to the tag
    transport: T,
    /// Session configuration
    config: SessionConfig,
    /// Whether the link is established
    connected: bool,
    /// Currently selected application
    selected_aid: [u8; 3],
    /// Secure channel of the current authentication
    channel: Option<SecureChannel>,
}

impl<T: TagTransport> Session<T> {
    /// Create a new, disconnected session over the given transport
    pub const fn new(transport: T) -> Self {
        Self::with_config(transport, SessionConfig::new())
    }

    /// Create a new, disconnected session with a custom configuration
    pub const fn with_config(transport: T, config: SessionConfig) -> Self {
        Self {
            transport,
            config,
            connected: false,
            selected_aid: PICC_AID,
            channel: None,
        }
    }

    /// Get the session configuration
    pub const fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Get a reference to the transport
    pub const fn transport(&self) -> &T {
        &self.transport
    }

    /// Get a mutable reference to the transport
    pub const fn transport_mut(&mut self) -> &mut T {
        &mut self.transport
    }

    /// Consume the session and return the transport
    pub fn into_transport(self) -> T {
        self.transport
    }

    /// Check if the link to the tag is established
    pub const fn is_connected(&self) -> bool {
        self.connected
    }

    /// Key number the session is authenticated with, if any
    pub fn authenticated_key_no(&self) -> Option<u8> {
        self.channel.as_ref().map(SecureChannel::key_no)
    }

    /// Currently selected application
    pub const fn selected_application(&self) -> [u8; 3] {
        self.selected_aid
    }

    /// Establish the link to the tag
    ///
    /// The transport is always asked to connect, even if the session already
    /// is. On failure, including a failed select of the PICC level when
    /// [`SessionConfig::select_picc_on_connect`] is set, the session is left
    /// disconnected.
    pub fn connect(&mut self) -> Result<()> {
        debug!(reconnect = self.connected, "Connecting to tag");
        self.reset();

        if let Err(e) = self.transport.connect() {
            let error = self.refine(e.into());
            warn!(%error, "Failed to connect to tag");
            return Err(error);
        }
        self.connected = true;

        if self.config.select_picc_on_connect {
            if let Err(error) = self.select_application(PICC_AID) {
                warn!(%error, "Failed to select the PICC level after connecting");
                self.reset();
                return Err(error);
            }
        }

        Ok(())
    }

    /// Tear down the link to the tag
    ///
    /// Session state is reset whether or not the transport reports an error,
    /// and the transport is asked to disconnect even if the session is not
    /// connected.
    pub fn disconnect(&mut self) -> Result<()> {
        debug!("Disconnecting from tag");
        let result = self.transport.disconnect();
        self.reset();
        result.map_err(|e| self.refine(e.into()))
    }

    /// Select an application, or the PICC level with [`PICC_AID`]
    ///
    /// Selecting ends any authentication.
    pub fn select_application(&mut self, aid: [u8; 3]) -> Result<()> {
        self.ensure_connected()?;
        debug!(aid = %hex::encode(aid), "Selecting application");
        self.channel = None;

        let command = NativeCommand::with_data(ins::SELECT_APPLICATION, aid.to_vec());
        match transceive(&mut self.transport, &command) {
            Ok(_) => {
                self.selected_aid = aid;
                Ok(())
            }
            Err(e) => Err(self.refine(e)),
        }
    }

    /// Authenticate with `key` in slot `key_no` of the selected application
    ///
    /// The authentication command is picked from the key's algorithm. Any
    /// previous authentication ends before the exchange starts, so a failed
    /// attempt leaves the session unauthenticated.
    pub fn authenticate(&mut self, key_no: u8, key: &Key) -> Result<()> {
        self.ensure_connected()?;
        self.channel = None;

        match SecureChannel::establish(&mut self.transport, key_no, key) {
            Ok(channel) => {
                debug!(key_no, algorithm = %key.algorithm(), "Session authenticated");
                self.channel = Some(channel);
                Ok(())
            }
            Err(e) => Err(self.refine(e)),
        }
    }

    /// Replace the key settings of the selected application
    pub fn change_key_settings(&mut self, settings: u8) -> Result<()> {
        self.ensure_connected()?;
        let mut channel = self.channel.take().ok_or(Error::NotAuthenticated)?;
        debug!(settings = format_args!("{settings:#04X}"), "Changing key settings");

        // The settings byte travels enciphered together with its checksum
        let mut plaintext = vec![settings];
        plaintext.extend(channel.checksum(&[ins::CHANGE_KEY_SETTINGS], &[settings]));
        let command =
            NativeCommand::with_data(ins::CHANGE_KEY_SETTINGS, channel.seal(&plaintext));

        let result = transceive(&mut self.transport, &command)
            .and_then(|response| channel.verify_response(response, self.config.verify_response_mac));
        match result {
            Ok(_) => {
                self.end_card_authentication();
                Ok(())
            }
            Err(e) => Err(self.refine(e)),
        }
    }

    /// Read the key settings and maximum key count of the selected application
    pub fn key_settings(&mut self) -> Result<(u8, u8)> {
        self.ensure_connected()?;
        let data = self.exchange_plain(&NativeCommand::new(ins::GET_KEY_SETTINGS))?;

        match data[..] {
            [settings, max_keys] => Ok((settings, max_keys)),
            _ => Err(Error::InvalidResponse("Unexpected key settings length")),
        }
    }

    /// Replace the key in slot `key_no` of the selected application
    ///
    /// `old_key` is only used when `key_no` is not the key the session is
    /// authenticated with. At the PICC level the algorithm of `new_key` is
    /// encoded into the key number.
    pub fn change_key(&mut self, key_no: u8, new_key: &Key, old_key: &Key) -> Result<()> {
        self.ensure_connected()?;
        let mut channel = self.channel.take().ok_or(Error::NotAuthenticated)?;

        let key_no = if self.selected_aid == PICC_AID {
            (key_no & KEY_NO_MASK) | new_key.algorithm().crypto_mode()
        } else {
            key_no
        };
        let same_key = (key_no & KEY_NO_MASK) == (channel.key_no() & KEY_NO_MASK);
        debug!(
            key_no,
            algorithm = %new_key.algorithm(),
            version = new_key.version(),
            same_key,
            "Changing key"
        );

        let new_material = new_key.wire_material();
        let mut plaintext = new_material.clone();
        if !same_key {
            for (byte, old) in plaintext.iter_mut().zip(old_key.wire_material().iter()) {
                *byte ^= old;
            }
        }
        if new_key.algorithm() == KeyAlgorithm::Aes {
            plaintext.push(new_key.version());
        }

        let checksum = channel.checksum(&[ins::CHANGE_KEY, key_no], &plaintext);
        plaintext.extend_from_slice(&checksum);
        if !same_key {
            plaintext.extend(channel.checksum(&[], &new_material));
        }

        let mut data = vec![key_no];
        data.extend(channel.seal(&plaintext));
        let command = NativeCommand::with_data(ins::CHANGE_KEY, data);

        // Changing the authenticated key ends the card's session, so no MAC follows
        let result = transceive(&mut self.transport, &command).and_then(|response| {
            if same_key {
                Ok(response.into_data())
            } else {
                channel.verify_response(response, self.config.verify_response_mac)
            }
        });
        match result {
            Ok(_) => {
                if !same_key {
                    self.end_card_authentication();
                }
                Ok(())
            }
            Err(e) => Err(self.refine(e)),
        }
    }

    /// Read the version of the key in slot `key_no` of the selected application
    pub fn key_version(&mut self, key_no: u8) -> Result<u8> {
        self.ensure_connected()?;
        let command = NativeCommand::with_data(ins::GET_KEY_VERSION, vec![key_no]);
        let data = self.exchange_plain(&command)?;

        match data[..] {
            [version] => Ok(version),
            _ => Err(Error::InvalidResponse("Unexpected key version length")),
        }
    }

    /// Last error reported by the reader chip, if any
    pub fn last_pcd_error(&self) -> Option<PcdError> {
        self.transport.last_pcd_error()
    }

    /// Last error status reported by the card, if any
    pub fn last_picc_error(&self) -> Option<PiccStatus> {
        self.transport.last_picc_error()
    }

    const fn ensure_connected(&self) -> Result<()> {
        if self.connected {
            Ok(())
        } else {
            Err(Error::NotConnected)
        }
    }

    fn reset(&mut self) {
        self.connected = false;
        self.selected_aid = PICC_AID;
        self.channel = None;
    }

    /// End an authentication the card still holds after a key mutation
    ///
    /// Re-selecting the current application drops the card's session, which
    /// keeps it from MACing responses the host no longer expects.
    fn end_card_authentication(&mut self) {
        let command = NativeCommand::with_data(ins::SELECT_APPLICATION, self.selected_aid.to_vec());
        if let Err(e) = transceive(&mut self.transport, &command) {
            let error = self.refine(e);
            warn!(%error, "Failed to end card authentication");
        }
    }

    fn refine(&self, error: Error) -> Error {
        let error = resolver::refine(&self.transport, error);
        debug!(%error, "DESFire operation failed");
        error
    }

    /// Exchange a command sent in plain, with MACs when authenticated
    ///
    /// The card drops its authentication on any error, so the session does
    /// too.
    fn exchange_plain(&mut self, command: &NativeCommand) -> Result<Bytes> {
        if let Some(channel) = self.channel.as_mut() {
            channel.command_sent(command);
        }

        let result = transceive(&mut self.transport, command).and_then(|response| {
            match self.channel.as_mut() {
                Some(channel) => {
                    channel.verify_response(response, self.config.verify_response_mac)
                }
                None => Ok(response.into_data()),
            }
        });

        match result {
            Ok(data) => Ok(data),
            Err(e) => {
                self.channel = None;
                Err(self.refine(e))
            }
        }
    }
}
