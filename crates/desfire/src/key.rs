//! DESFire keys
//!
//! A [`Key`] couples raw key material with the cipher family it belongs to
//! and the key version stored alongside it on the card. The session picks
//! the authentication mechanism from the algorithm tag, so callers never
//! choose between the DES, ISO and AES wire commands themselves.

use std::fmt;

use derive_more::Display;
use zeroize::Zeroizing;

use crate::{
    Error, Result,
    constants::{CRYPTO_3K3DES, CRYPTO_AES, CRYPTO_DES, ins},
    crypto::BlockCipher,
};

/// Cipher family of a DESFire key
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum KeyAlgorithm {
    /// Single DES, authenticated with the legacy command
    #[display("DES")]
    Des,
    /// Three-key triple DES, authenticated with the ISO command
    #[display("3K3DES")]
    ThreeK3Des,
    /// AES-128
    #[display("AES")]
    Aes,
}

impl KeyAlgorithm {
    /// Length of the raw key material in bytes
    pub const fn key_length(self) -> usize {
        match self {
            Self::Des => 8,
            Self::ThreeK3Des => 24,
            Self::Aes => 16,
        }
    }

    /// Block size of the cipher in bytes
    pub const fn block_size(self) -> usize {
        match self {
            Self::Des | Self::ThreeK3Des => 8,
            Self::Aes => 16,
        }
    }

    /// Crypto-mode flag ORed with a key number to select this algorithm
    pub const fn crypto_mode(self) -> u8 {
        match self {
            Self::Des => CRYPTO_DES,
            Self::ThreeK3Des => CRYPTO_3K3DES,
            Self::Aes => CRYPTO_AES,
        }
    }

    /// Native instruction that authenticates with a key of this algorithm
    pub const fn auth_instruction(self) -> u8 {
        match self {
            Self::Des => ins::AUTHENTICATE_LEGACY,
            Self::ThreeK3Des => ins::AUTHENTICATE_ISO,
            Self::Aes => ins::AUTHENTICATE_AES,
        }
    }

    /// Length of the random challenges exchanged during authentication
    pub(crate) const fn challenge_length(self) -> usize {
        match self {
            Self::Des => 8,
            Self::ThreeK3Des | Self::Aes => 16,
        }
    }

    /// Length of the key material inside a CHANGE_KEY cryptogram
    pub(crate) const fn wire_length(self) -> usize {
        match self {
            Self::Des | Self::Aes => 16,
            Self::ThreeK3Des => 24,
        }
    }

    /// Get the algorithm selected by the crypto-mode bits of a key number
    pub const fn from_crypto_mode(key_no: u8) -> Option<Self> {
        match key_no & 0xC0 {
            CRYPTO_DES => Some(Self::Des),
            CRYPTO_3K3DES => Some(Self::ThreeK3Des),
            CRYPTO_AES => Some(Self::Aes),
            _ => None,
        }
    }
}

/// Key for authenticating to and provisioning DESFire cards
///
/// Keys are immutable. The material is wiped when the key is dropped and is
/// never part of the `Debug` output.
#[derive(Clone)]
pub struct Key {
    algorithm: KeyAlgorithm,
    material: Zeroizing<Vec<u8>>,
    version: u8,
}

impl Key {
    /// Create a key from raw material
    ///
    /// Fails with [`Error::InvalidKeyLength`] unless `material` has exactly
    /// the length required by `algorithm`.
    pub fn new(algorithm: KeyAlgorithm, material: &[u8], version: u8) -> Result<Self> {
        if material.len() != algorithm.key_length() {
            return Err(Error::InvalidKeyLength {
                algorithm,
                expected: algorithm.key_length(),
                actual: material.len(),
            });
        }

        Ok(Self {
            algorithm,
            material: Zeroizing::new(material.to_vec()),
            version,
        })
    }

    /// Create a DES key
    pub fn des(material: [u8; 8], version: u8) -> Self {
        Self {
            algorithm: KeyAlgorithm::Des,
            material: Zeroizing::new(material.to_vec()),
            version,
        }
    }

    /// Create a 3K3DES key
    pub fn three_k3des(material: [u8; 24], version: u8) -> Self {
        Self {
            algorithm: KeyAlgorithm::ThreeK3Des,
            material: Zeroizing::new(material.to_vec()),
            version,
        }
    }

    /// Create an AES-128 key
    pub fn aes(material: [u8; 16], version: u8) -> Self {
        Self {
            algorithm: KeyAlgorithm::Aes,
            material: Zeroizing::new(material.to_vec()),
            version,
        }
    }

    /// All-zero key with version 0, as shipped on blank cards
    pub fn factory_default(algorithm: KeyAlgorithm) -> Self {
        Self {
            algorithm,
            material: Zeroizing::new(vec![0u8; algorithm.key_length()]),
            version: 0,
        }
    }

    /// Get the cipher family of this key
    pub const fn algorithm(&self) -> KeyAlgorithm {
        self.algorithm
    }

    /// Get the key version
    pub const fn version(&self) -> u8 {
        self.version
    }

    /// Raw key material
    #[cfg(test)]
    pub(crate) fn material(&self) -> &[u8] {
        &self.material
    }

    /// Block cipher keyed with this key
    pub(crate) fn cipher(&self) -> Result<BlockCipher> {
        BlockCipher::new(self.algorithm, &self.material)
    }

    /// Key material as carried by a CHANGE_KEY cryptogram
    ///
    /// DES and 3K3DES keys carry the version in the parity bits of their
    /// first eight bytes, and DES keys are sent as 16-byte double-length
    /// keys. AES keys are sent as-is; their version travels separately.
    pub(crate) fn wire_material(&self) -> Zeroizing<Vec<u8>> {
        let mut material = Zeroizing::new(Vec::with_capacity(self.algorithm.wire_length()));
        material.extend_from_slice(&self.material);

        if self.algorithm != KeyAlgorithm::Aes {
            for (n, byte) in material.iter_mut().take(8).enumerate() {
                let version_bit = (self.version >> (7 - n)) & 0x01;
                *byte = (*byte & 0xFE) | version_bit;
            }
        }

        if self.algorithm == KeyAlgorithm::Des {
            material.extend_from_within(..8);
        }

        material
    }
}

impl fmt::Debug for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Key")
            .field("algorithm", &self.algorithm)
            .field("version", &self.version)
            .finish_non_exhaustive()
    }
}

/// Read the version carried in the parity bits of DES key material
#[cfg(test)]
pub(crate) fn version_from_parity(material: &[u8]) -> u8 {
    material
        .iter()
        .take(8)
        .fold(0u8, |version, byte| (version << 1) | (byte & 0x01))
}
