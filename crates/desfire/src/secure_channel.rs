//! Authenticated channel to a DESFire card
//!
//! This module runs the three-pass mutual authentication and keeps the
//! state it produces: the session cipher, the chaining vector and the
//! secure messaging flavour (legacy DES or EV1) used for later commands.

use bytes::Bytes;
use tracing::{debug, trace, warn};
use zeroize::Zeroizing;

use crate::{
    Error, Result,
    command::{NativeCommand, NativeResponse, transceive},
    constants::{MAC_LENGTH, ins},
    crypto::{
        BlockCipher, crc16, crc32, derive_session_key, pad_zeros, random_challenge, rotate_left,
    },
    key::{Key, KeyAlgorithm},
    transport::TagTransport,
};

/// Secure messaging flavour negotiated by the authentication command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Scheme {
    /// Legacy DES: CRC16, send-mode encipherment, no MACs on plain commands
    Legacy,
    /// EV1 (3K3DES and AES): CRC32, CBC encipherment, CMAC on every exchange
    Ev1,
}

impl Scheme {
    const fn for_algorithm(algorithm: KeyAlgorithm) -> Self {
        match algorithm {
            KeyAlgorithm::Des => Self::Legacy,
            KeyAlgorithm::ThreeK3Des | KeyAlgorithm::Aes => Self::Ev1,
        }
    }
}

/// Secure channel established by a successful authentication
#[derive(Debug)]
pub(crate) struct SecureChannel {
    /// Key number the session was authenticated with
    key_no: u8,
    /// Secure messaging flavour
    scheme: Scheme,
    /// Cipher keyed with the session key
    cipher: BlockCipher,
    /// Chaining vector shared with the card
    iv: Vec<u8>,
}

impl SecureChannel {
    /// Authenticate with `key` in slot `key_no` and open a channel
    pub(crate) fn establish(
        transport: &mut dyn TagTransport,
        key_no: u8,
        key: &Key,
    ) -> Result<Self> {
        let algorithm = key.algorithm();
        let scheme = Scheme::for_algorithm(algorithm);
        let cipher = key.cipher()?;
        let challenge_length = algorithm.challenge_length();
        let mut iv = vec![0u8; cipher.block_size()];

        debug!(key_no, %algorithm, "Starting mutual authentication");

        // Card challenge
        let command = NativeCommand::with_data(algorithm.auth_instruction(), vec![key_no]);
        let response = transceive(transport, &command)?;
        if !response.status().is_additional_frame() {
            return Err(Error::InvalidResponse("Card did not send a challenge"));
        }
        if response.data().len() != challenge_length {
            return Err(Error::InvalidResponse("Unexpected challenge length"));
        }

        let mut rnd_b = Zeroizing::new(response.data().to_vec());
        cipher.cbc_decrypt(&mut iv, &mut rnd_b);

        // Host response: RndA || RndB rotated left by one byte
        let rnd_a = random_challenge(challenge_length);
        let mut token = Zeroizing::new(Vec::with_capacity(2 * challenge_length));
        token.extend_from_slice(&rnd_a);
        token.extend_from_slice(&rotate_left(&rnd_b));
        match scheme {
            Scheme::Legacy => cipher.legacy_send(&mut token),
            Scheme::Ev1 => cipher.cbc_encrypt(&mut iv, &mut token),
        }

        let command = NativeCommand::with_data(ins::ADDITIONAL_FRAME, token.to_vec());
        let response = transceive(transport, &command)?;
        if !response.status().is_success() {
            return Err(Error::InvalidResponse("Card expected further frames"));
        }
        if response.data().len() != challenge_length {
            return Err(Error::InvalidResponse("Unexpected cryptogram length"));
        }

        // Card proof: RndA rotated left by one byte
        let mut proof = Zeroizing::new(response.data().to_vec());
        match scheme {
            Scheme::Legacy => cipher.cbc_decrypt(&mut vec![0u8; cipher.block_size()], &mut proof),
            Scheme::Ev1 => cipher.cbc_decrypt(&mut iv, &mut proof),
        }
        if *proof != *rotate_left(&rnd_a) {
            warn!(key_no, "Card cryptogram did not match the host challenge");
            return Err(Error::Crypto("Card cryptogram mismatch"));
        }

        let session_key = derive_session_key(algorithm, &rnd_a, &rnd_b);
        let cipher = BlockCipher::new(algorithm, &session_key)?;
        let iv = vec![0u8; cipher.block_size()];

        debug!(key_no, ?scheme, "Mutual authentication completed");

        Ok(Self {
            key_no,
            scheme,
            cipher,
            iv,
        })
    }

    /// Key number the channel was authenticated with
    pub(crate) const fn key_no(&self) -> u8 {
        self.key_no
    }

    /// Secure messaging flavour of this channel
    #[cfg(test)]
    pub(crate) const fn scheme(&self) -> Scheme {
        self.scheme
    }

    /// Account for a command sent in plain
    ///
    /// EV1 channels chain the CMAC of every plain command into the IV.
    pub(crate) fn command_sent(&mut self, command: &NativeCommand) {
        if self.scheme == Scheme::Ev1 {
            self.cipher.cmac(&mut self.iv, &command.native_bytes());
            trace!(iv = %hex::encode(&self.iv), "Chained command MAC");
        }
    }

    /// Check the response to a command and strip its MAC
    ///
    /// EV1 responses end with the first eight bytes of the CMAC over the
    /// response data and the status byte. The IV always advances, but the
    /// comparison only happens when `verify_mac` is set.
    pub(crate) fn verify_response(
        &mut self,
        response: NativeResponse,
        verify_mac: bool,
    ) -> Result<Bytes> {
        let status = response.status();
        let data = response.into_data();

        if self.scheme == Scheme::Legacy {
            return Ok(data);
        }

        if data.len() < MAC_LENGTH {
            return Err(Error::InvalidResponse("Response MAC missing"));
        }
        let split = data.len() - MAC_LENGTH;

        let mut mac_input = data[..split].to_vec();
        mac_input.push(status.code());
        self.cipher.cmac(&mut self.iv, &mac_input);

        if verify_mac && self.iv[..MAC_LENGTH] != data[split..] {
            warn!(
                expected = %hex::encode(&self.iv[..MAC_LENGTH]),
                received = %hex::encode(&data[split..]),
                "Response MAC mismatch"
            );
            return Err(Error::Crypto("Response MAC mismatch"));
        }

        Ok(data.slice(..split))
    }

    /// Checksum over `data` for an enciphered cryptogram
    ///
    /// Legacy channels use CRC16 over the data alone, EV1 channels use
    /// CRC32 over the command header followed by the data.
    pub(crate) fn checksum(&self, header: &[u8], data: &[u8]) -> Vec<u8> {
        match self.scheme {
            Scheme::Legacy => crc16(data).to_vec(),
            Scheme::Ev1 => {
                let mut input = header.to_vec();
                input.extend_from_slice(data);
                crc32(&input).to_vec()
            }
        }
    }

    /// Pad and encipher a cryptogram
    pub(crate) fn seal(&mut self, plaintext: &[u8]) -> Vec<u8> {
        let mut data = plaintext.to_vec();
        pad_zeros(&mut data, self.cipher.block_size());

        match self.scheme {
            Scheme::Legacy => self.cipher.legacy_send(&mut data),
            Scheme::Ev1 => self.cipher.cbc_encrypt(&mut self.iv, &mut data),
        }
        data
    }
}
