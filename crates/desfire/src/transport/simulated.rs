//! Software DESFire card for end-to-end session tests
//!
//! The card side of authentication and secure messaging is written out
//! independently of [`crate::secure_channel`], so a test that passes here
//! shows that both ends agree on the protocol.

use std::collections::HashMap;

use bytes::Bytes;

use super::{PcdError, TagTransport, TransportError};
use crate::{
    constants::{MAC_LENGTH, PICC_AID, ins, iso},
    crypto::{
        BlockCipher, crc16, crc32, derive_session_key, random_challenge, rotate_left,
        xor_in_place,
    },
    key::{Key, KeyAlgorithm, version_from_parity},
    status::PiccStatus,
};

type CardResult<T> = std::result::Result<T, PiccStatus>;

/// Application directory entry
#[derive(Debug, Clone)]
pub(crate) struct SimulatedApplication {
    /// Key slots
    pub(crate) keys: Vec<Key>,
    /// Key settings byte
    pub(crate) key_settings: u8,
}

/// First pass of an authentication awaiting the host token
#[derive(Debug)]
struct PendingAuth {
    key_no: u8,
    algorithm: KeyAlgorithm,
    cipher: BlockCipher,
    rnd_b: Vec<u8>,
    iv: Vec<u8>,
}

/// Card side of an authenticated session
#[derive(Debug)]
struct CardAuth {
    key_no: u8,
    ev1: bool,
    cipher: BlockCipher,
    iv: Vec<u8>,
}

impl CardAuth {
    fn command_mac(&mut self, command: &[u8]) {
        if self.ev1 {
            self.cipher.cmac(&mut self.iv, command);
        }
    }

    fn response_mac(&mut self, payload: &[u8], corrupt: bool) -> Vec<u8> {
        let mut response = payload.to_vec();
        if self.ev1 {
            let mut input = payload.to_vec();
            input.push(PiccStatus::OperationOk.code());
            self.cipher.cmac(&mut self.iv, &input);
            response.extend_from_slice(&self.iv[..MAC_LENGTH]);
            if corrupt {
                if let Some(last) = response.last_mut() {
                    *last ^= 0x01;
                }
            }
        }
        response
    }

    fn open(&mut self, data: &[u8]) -> CardResult<Vec<u8>> {
        let block_size = self.cipher.block_size();
        if data.is_empty() || data.len() % block_size != 0 {
            return Err(PiccStatus::LengthError);
        }

        let mut plain = data.to_vec();
        if self.ev1 {
            self.cipher.cbc_decrypt(&mut self.iv, &mut plain);
        } else {
            legacy_receive(&self.cipher, &mut plain);
        }
        Ok(plain)
    }

    fn checksum(&self, data: &[u8]) -> Vec<u8> {
        if self.ev1 {
            crc32(data).to_vec()
        } else {
            crc16(data).to_vec()
        }
    }
}

/// Undo the host's send-mode chaining: `p_i = E(c_i) ^ c_{i-1}`
fn legacy_receive(cipher: &BlockCipher, data: &mut [u8]) {
    let block_size = cipher.block_size();
    let mut previous = vec![0u8; block_size];
    for block in data.chunks_exact_mut(block_size) {
        let received = block.to_vec();
        cipher.encrypt_block(block);
        xor_in_place(block, &previous);
        previous = received;
    }
}

/// Simulated DESFire card behind a transport
#[derive(Debug)]
pub(crate) struct SimulatedCard {
    /// Applications by AID, including the PICC level
    pub(crate) applications: HashMap<[u8; 3], SimulatedApplication>,
    /// Report card errors as raw I/O failures plus the PICC register
    pub(crate) report_errors_as_io: bool,
    /// Flip a bit in every response MAC
    pub(crate) corrupt_macs: bool,
    /// Link error register
    pub(crate) last_error: Option<TransportError>,
    /// Reader error register
    pub(crate) last_pcd_error: Option<PcdError>,
    /// Card error register
    pub(crate) last_picc_error: Option<PiccStatus>,
    /// Raw commands received
    pub(crate) commands: Vec<Bytes>,
    /// Number of connect calls
    pub(crate) connects: usize,
    connected: bool,
    selected: [u8; 3],
    pending: Option<PendingAuth>,
    auth: Option<CardAuth>,
}

impl SimulatedCard {
    /// Create a card whose PICC master key is `master_key`
    pub(crate) fn new(master_key: Key) -> Self {
        let picc = SimulatedApplication {
            keys: vec![master_key],
            key_settings: 0x0F,
        };

        Self {
            applications: HashMap::from([(PICC_AID, picc)]),
            report_errors_as_io: false,
            corrupt_macs: false,
            last_error: None,
            last_pcd_error: None,
            last_picc_error: None,
            commands: Vec::new(),
            connects: 0,
            connected: false,
            selected: PICC_AID,
            pending: None,
            auth: None,
        }
    }

    /// Add an application
    pub(crate) fn with_application(
        mut self,
        aid: [u8; 3],
        keys: Vec<Key>,
        key_settings: u8,
    ) -> Self {
        self.applications
            .insert(aid, SimulatedApplication { keys, key_settings });
        self
    }

    /// Key stored in a slot
    pub(crate) fn key(&self, aid: [u8; 3], slot: usize) -> Option<&Key> {
        self.applications.get(&aid)?.keys.get(slot)
    }

    /// Key settings of an application
    pub(crate) fn key_settings(&self, aid: [u8; 3]) -> Option<u8> {
        self.applications.get(&aid).map(|app| app.key_settings)
    }

    /// Check if the card holds an authenticated session
    pub(crate) const fn is_authenticated(&self) -> bool {
        self.auth.is_some()
    }

    /// Currently selected application
    pub(crate) const fn selected_application(&self) -> [u8; 3] {
        self.selected
    }

    fn application(&self) -> CardResult<&SimulatedApplication> {
        self.applications
            .get(&self.selected)
            .ok_or(PiccStatus::ApplicationNotFound)
    }

    fn process(&mut self, ins: u8, data: &[u8]) -> CardResult<(PiccStatus, Vec<u8>)> {
        let pending = self.pending.take();
        match ins {
            ins::AUTHENTICATE_LEGACY | ins::AUTHENTICATE_ISO | ins::AUTHENTICATE_AES => {
                self.begin_auth(ins, data)
            }
            ins::ADDITIONAL_FRAME => self.finish_auth(pending, data),
            ins::GET_KEY_SETTINGS | ins::GET_KEY_VERSION => self.plain(ins, data),
            ins::CHANGE_KEY_SETTINGS => self.change_key_settings(data),
            ins::CHANGE_KEY => self.change_key(data),
            ins::SELECT_APPLICATION => self.select_application(data),
            _ => Err(PiccStatus::IllegalCommand),
        }
    }

    fn begin_auth(&mut self, ins: u8, data: &[u8]) -> CardResult<(PiccStatus, Vec<u8>)> {
        self.auth = None;
        let &[key_no] = data else {
            return Err(PiccStatus::LengthError);
        };

        let key = self
            .application()?
            .keys
            .get(usize::from(key_no & 0x0F))
            .ok_or(PiccStatus::NoSuchKey)?;
        let algorithm = key.algorithm();
        if algorithm.auth_instruction() != ins {
            return Err(PiccStatus::AuthenticationError);
        }

        let cipher = key.cipher().map_err(|_| PiccStatus::PiccIntegrityError)?;
        let rnd_b = random_challenge(algorithm.challenge_length()).to_vec();
        let mut iv = vec![0u8; cipher.block_size()];
        let mut challenge = rnd_b.clone();
        if algorithm == KeyAlgorithm::Des {
            cipher.encrypt_block(&mut challenge);
        } else {
            cipher.cbc_encrypt(&mut iv, &mut challenge);
        }

        self.pending = Some(PendingAuth {
            key_no: key_no & 0x0F,
            algorithm,
            cipher,
            rnd_b,
            iv,
        });
        Ok((PiccStatus::AdditionalFrame, challenge))
    }

    fn finish_auth(
        &mut self,
        pending: Option<PendingAuth>,
        data: &[u8],
    ) -> CardResult<(PiccStatus, Vec<u8>)> {
        let mut pending = pending.ok_or(PiccStatus::CommandAborted)?;
        let length = pending.algorithm.challenge_length();
        if data.len() != 2 * length {
            return Err(PiccStatus::LengthError);
        }

        let legacy = pending.algorithm == KeyAlgorithm::Des;
        let mut token = data.to_vec();
        if legacy {
            legacy_receive(&pending.cipher, &mut token);
        } else {
            pending.cipher.cbc_decrypt(&mut pending.iv, &mut token);
        }

        let (rnd_a, rotated_b) = token.split_at(length);
        if rotated_b != rotate_left(&pending.rnd_b).as_slice() {
            return Err(PiccStatus::AuthenticationError);
        }

        let mut proof = rotate_left(rnd_a).to_vec();
        if legacy {
            pending.cipher.encrypt_block(&mut proof);
        } else {
            pending.cipher.cbc_encrypt(&mut pending.iv, &mut proof);
        }

        let session_key = derive_session_key(pending.algorithm, rnd_a, &pending.rnd_b);
        let cipher = BlockCipher::new(pending.algorithm, &session_key)
            .map_err(|_| PiccStatus::PiccIntegrityError)?;
        self.auth = Some(CardAuth {
            key_no: pending.key_no,
            ev1: !legacy,
            iv: vec![0u8; cipher.block_size()],
            cipher,
        });
        Ok((PiccStatus::OperationOk, proof))
    }

    fn plain(&mut self, ins: u8, data: &[u8]) -> CardResult<(PiccStatus, Vec<u8>)> {
        if let Some(auth) = self.auth.as_mut() {
            let mut command = vec![ins];
            command.extend_from_slice(data);
            auth.command_mac(&command);
        }

        let app = self.application()?;
        let payload = match (ins, data) {
            (ins::GET_KEY_SETTINGS, []) => vec![app.key_settings, app.keys.len() as u8],
            (ins::GET_KEY_VERSION, &[key_no]) => {
                let key = app
                    .keys
                    .get(usize::from(key_no & 0x0F))
                    .ok_or(PiccStatus::NoSuchKey)?;
                vec![key.version()]
            }
            _ => return Err(PiccStatus::LengthError),
        };

        let corrupt = self.corrupt_macs;
        let response = match self.auth.as_mut() {
            Some(auth) => auth.response_mac(&payload, corrupt),
            None => payload,
        };
        Ok((PiccStatus::OperationOk, response))
    }

    fn change_key_settings(&mut self, data: &[u8]) -> CardResult<(PiccStatus, Vec<u8>)> {
        let corrupt = self.corrupt_macs;
        let auth = self
            .auth
            .as_mut()
            .filter(|auth| auth.key_no == 0)
            .ok_or(PiccStatus::AuthenticationError)?;

        let plain = auth.open(data)?;
        let settings = plain[0];
        let crc = if auth.ev1 {
            auth.checksum(&[ins::CHANGE_KEY_SETTINGS, settings])
        } else {
            auth.checksum(&[settings])
        };
        if plain.get(1..1 + crc.len()) != Some(crc.as_slice()) {
            return Err(PiccStatus::IntegrityError);
        }
        let response = auth.response_mac(&[], corrupt);

        let selected = self.selected;
        self.applications
            .get_mut(&selected)
            .ok_or(PiccStatus::ApplicationNotFound)?
            .key_settings = settings;
        Ok((PiccStatus::OperationOk, response))
    }

    fn change_key(&mut self, data: &[u8]) -> CardResult<(PiccStatus, Vec<u8>)> {
        let corrupt = self.corrupt_macs;
        let (&key_no, cryptogram) = data.split_first().ok_or(PiccStatus::LengthError)?;
        let slot = usize::from(key_no & 0x0F);
        let selected = self.selected;

        let old_key = self
            .application()?
            .keys
            .get(slot)
            .ok_or(PiccStatus::NoSuchKey)?
            .clone();
        let algorithm = if selected == PICC_AID {
            KeyAlgorithm::from_crypto_mode(key_no).ok_or(PiccStatus::ParameterError)?
        } else {
            old_key.algorithm()
        };

        let auth = self.auth.as_mut().ok_or(PiccStatus::AuthenticationError)?;
        let same_key = usize::from(auth.key_no) == slot;
        if auth.key_no != 0 && !same_key {
            return Err(PiccStatus::AuthenticationError);
        }

        let plain = auth.open(cryptogram)?;
        let wire_length = algorithm.wire_length();
        let key_length = wire_length + usize::from(algorithm == KeyAlgorithm::Aes);
        let crc_length = if auth.ev1 { 4 } else { 2 };
        let needed = key_length + crc_length * if same_key { 1 } else { 2 };
        if plain.len() < needed {
            return Err(PiccStatus::LengthError);
        }

        let crc = if auth.ev1 {
            let mut input = vec![ins::CHANGE_KEY, key_no];
            input.extend_from_slice(&plain[..key_length]);
            auth.checksum(&input)
        } else {
            auth.checksum(&plain[..key_length])
        };
        if plain[key_length..key_length + crc_length] != *crc {
            return Err(PiccStatus::IntegrityError);
        }

        let mut new_wire = plain[..wire_length].to_vec();
        if !same_key {
            xor_in_place(&mut new_wire, &old_key.wire_material());
            let crc = auth.checksum(&new_wire);
            if plain[key_length + crc_length..needed] != *crc {
                return Err(PiccStatus::IntegrityError);
            }
        }

        let version = if algorithm == KeyAlgorithm::Aes {
            plain[wire_length]
        } else {
            version_from_parity(&new_wire)
        };
        let new_key = Key::new(algorithm, &new_wire[..algorithm.key_length()], version)
            .map_err(|_| PiccStatus::ParameterError)?;

        let response = if same_key {
            self.auth = None;
            Vec::new()
        } else {
            auth.response_mac(&[], corrupt)
        };

        self.applications
            .get_mut(&selected)
            .ok_or(PiccStatus::ApplicationNotFound)?
            .keys[slot] = new_key;
        Ok((PiccStatus::OperationOk, response))
    }

    fn select_application(&mut self, data: &[u8]) -> CardResult<(PiccStatus, Vec<u8>)> {
        self.auth = None;
        let aid: [u8; 3] = data.try_into().map_err(|_| PiccStatus::LengthError)?;
        if !self.applications.contains_key(&aid) {
            return Err(PiccStatus::ApplicationNotFound);
        }
        self.selected = aid;
        Ok((PiccStatus::OperationOk, Vec::new()))
    }
}

impl TagTransport for SimulatedCard {
    fn connect(&mut self) -> Result<(), TransportError> {
        self.connects += 1;
        self.connected = true;
        self.selected = PICC_AID;
        self.pending = None;
        self.auth = None;
        Ok(())
    }

    fn disconnect(&mut self) -> Result<(), TransportError> {
        self.connected = false;
        self.pending = None;
        self.auth = None;
        Ok(())
    }

    fn do_transmit_raw(&mut self, command: &[u8]) -> Result<Bytes, TransportError> {
        self.commands.push(Bytes::copy_from_slice(command));
        if !self.connected {
            return Err(TransportError::Connection);
        }

        let (ins, data) = match command {
            [iso::CLA, ins, 0x00, 0x00, 0x00] => (*ins, &[][..]),
            [iso::CLA, ins, 0x00, 0x00, lc, rest @ ..] if rest.len() == usize::from(*lc) + 1 => {
                (*ins, &rest[..usize::from(*lc)])
            }
            _ => return Err(TransportError::other("Malformed wrapped command")),
        };

        self.last_picc_error = None;
        let (status, mut response) = match self.process(ins, data) {
            Ok(result) => result,
            Err(status) => {
                self.pending = None;
                self.auth = None;
                (status, Vec::new())
            }
        };

        if status.is_error() {
            self.last_picc_error = Some(status);
            if self.report_errors_as_io {
                return Err(TransportError::Io);
            }
        }

        response.extend_from_slice(&[iso::SW1_NATIVE, status.code()]);
        Ok(Bytes::from(response))
    }

    fn last_error(&self) -> Option<TransportError> {
        self.last_error.clone()
    }

    fn last_pcd_error(&self) -> Option<PcdError> {
        self.last_pcd_error
    }

    fn last_picc_error(&self) -> Option<PiccStatus> {
        self.last_picc_error
    }
}
