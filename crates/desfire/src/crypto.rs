//! Cryptographic primitives for DESFire authentication and secure messaging
//!
//! This module provides the block cipher wrapper used by every key family,
//! the chaining modes the card speaks (CBC, the legacy DES "send mode" and
//! CMAC), session key derivation and the two CRCs used in cryptograms.

use std::fmt;
use std::ops::Range;

use aes::Aes128;
use cipher::{
    BlockDecrypt, BlockDecryptMut, BlockEncrypt, BlockEncryptMut, BlockSizeUser, InnerIvInit,
    IvState, KeyInit, generic_array::GenericArray,
};
use des::{Des, TdesEde3};
use rand::RngCore;
use zeroize::Zeroizing;

use crate::{Error, Result, key::KeyAlgorithm};

/// Largest block size of any supported cipher
const MAX_BLOCK_SIZE: usize = 16;

/// CMAC subkey constant for 64-bit block ciphers
const CMAC_RB_64: u8 = 0x1B;
/// CMAC subkey constant for 128-bit block ciphers
const CMAC_RB_128: u8 = 0x87;

/// Block cipher keyed for one DESFire key family
pub(crate) enum BlockCipher {
    /// Single DES
    Des(Des),
    /// Three-key triple DES
    Tdes(TdesEde3),
    /// AES-128
    Aes(Aes128),
}

impl BlockCipher {
    /// Create a cipher for the given algorithm and key material
    pub(crate) fn new(algorithm: KeyAlgorithm, key: &[u8]) -> Result<Self> {
        let cipher = match algorithm {
            KeyAlgorithm::Des => Des::new_from_slice(key).map(Self::Des),
            KeyAlgorithm::ThreeK3Des => TdesEde3::new_from_slice(key).map(Self::Tdes),
            KeyAlgorithm::Aes => Aes128::new_from_slice(key).map(Self::Aes),
        };
        cipher.map_err(|_| Error::Crypto("Key material does not fit the cipher"))
    }

    /// Block size in bytes
    pub(crate) const fn block_size(&self) -> usize {
        match self {
            Self::Des(_) | Self::Tdes(_) => 8,
            Self::Aes(_) => 16,
        }
    }

    /// Encrypt a single block in place
    pub(crate) fn encrypt_block(&self, block: &mut [u8]) {
        match self {
            Self::Des(c) => c.encrypt_block(GenericArray::from_mut_slice(block)),
            Self::Tdes(c) => c.encrypt_block(GenericArray::from_mut_slice(block)),
            Self::Aes(c) => c.encrypt_block(GenericArray::from_mut_slice(block)),
        }
    }

    /// Decrypt a single block in place
    pub(crate) fn decrypt_block(&self, block: &mut [u8]) {
        match self {
            Self::Des(c) => c.decrypt_block(GenericArray::from_mut_slice(block)),
            Self::Tdes(c) => c.decrypt_block(GenericArray::from_mut_slice(block)),
            Self::Aes(c) => c.decrypt_block(GenericArray::from_mut_slice(block)),
        }
    }

    /// CBC-encrypt `data` in place, leaving the last ciphertext block in `iv`
    pub(crate) fn cbc_encrypt(&self, iv: &mut [u8], data: &mut [u8]) {
        debug_assert_eq!(iv.len(), self.block_size());
        debug_assert_eq!(data.len() % self.block_size(), 0);

        match self {
            Self::Des(c) => cbc_encrypt_with(c, iv, data),
            Self::Tdes(c) => cbc_encrypt_with(c, iv, data),
            Self::Aes(c) => cbc_encrypt_with(c, iv, data),
        }
    }

    /// CBC-decrypt `data` in place, leaving the last ciphertext block in `iv`
    pub(crate) fn cbc_decrypt(&self, iv: &mut [u8], data: &mut [u8]) {
        debug_assert_eq!(iv.len(), self.block_size());
        debug_assert_eq!(data.len() % self.block_size(), 0);

        match self {
            Self::Des(c) => cbc_decrypt_with(c, iv, data),
            Self::Tdes(c) => cbc_decrypt_with(c, iv, data),
            Self::Aes(c) => cbc_decrypt_with(c, iv, data),
        }
    }

    /// Legacy DES "send mode": chain with a zero IV but run the decryption primitive
    ///
    /// Each output block is `D(p_i ^ o_{i-1})`. The card undoes it with its
    /// encryption primitive, so the host never needs the card's direction.
    pub(crate) fn legacy_send(&self, data: &mut [u8]) {
        let block_size = self.block_size();
        debug_assert_eq!(data.len() % block_size, 0);

        let mut previous = [0u8; MAX_BLOCK_SIZE];
        for block in data.chunks_exact_mut(block_size) {
            xor_in_place(block, &previous[..block_size]);
            self.decrypt_block(block);
            previous[..block_size].copy_from_slice(block);
        }
    }

    /// Compute the CMAC of `message`, chaining from `iv`
    ///
    /// On return `iv` holds the full-length MAC. With a zero IV this is the
    /// plain NIST SP 800-38B CMAC.
    pub(crate) fn cmac(&self, iv: &mut [u8], message: &[u8]) {
        let block_size = self.block_size();
        let (k1, k2) = self.cmac_subkeys();

        let complete = !message.is_empty() && message.len() % block_size == 0;
        let mut buffer = Zeroizing::new(message.to_vec());
        if !complete {
            buffer.push(0x80);
            pad_zeros(&mut buffer, block_size);
        }

        let last = buffer.len() - block_size;
        let subkey = if complete { &k1 } else { &k2 };
        xor_in_place(&mut buffer[last..], &subkey[..block_size]);

        self.cbc_encrypt(iv, &mut buffer);
    }

    fn cmac_subkeys(&self) -> ([u8; MAX_BLOCK_SIZE], [u8; MAX_BLOCK_SIZE]) {
        let block_size = self.block_size();
        let rb = if block_size == 16 {
            CMAC_RB_128
        } else {
            CMAC_RB_64
        };

        let mut l = [0u8; MAX_BLOCK_SIZE];
        self.encrypt_block(&mut l[..block_size]);

        let k1 = double(&l[..block_size], rb);
        let k2 = double(&k1[..block_size], rb);
        (k1, k2)
    }
}

impl fmt::Debug for BlockCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Des(_) => "Des",
            Self::Tdes(_) => "TdesEde3",
            Self::Aes(_) => "Aes128",
        };
        f.debug_tuple("BlockCipher").field(&name).finish()
    }
}

/// Run a CBC encryptor seeded with `iv` over `data` and store the chaining state back
fn cbc_encrypt_with<C>(cipher: &C, iv: &mut [u8], data: &mut [u8])
where
    C: BlockEncryptMut + cipher::BlockCipher + Clone,
{
    let mut encryptor =
        cbc::Encryptor::<C>::inner_iv_init(cipher.clone(), GenericArray::from_slice(iv));
    for block in data.chunks_exact_mut(C::block_size()) {
        encryptor.encrypt_block_mut(GenericArray::from_mut_slice(block));
    }
    iv.copy_from_slice(&encryptor.iv_state());
}

/// Run a CBC decryptor seeded with `iv` over `data` and store the chaining state back
fn cbc_decrypt_with<C>(cipher: &C, iv: &mut [u8], data: &mut [u8])
where
    C: BlockDecryptMut + cipher::BlockCipher + Clone,
{
    let mut decryptor =
        cbc::Decryptor::<C>::inner_iv_init(cipher.clone(), GenericArray::from_slice(iv));
    for block in data.chunks_exact_mut(C::block_size()) {
        decryptor.decrypt_block_mut(GenericArray::from_mut_slice(block));
    }
    iv.copy_from_slice(&decryptor.iv_state());
}

/// Multiply a block by x in GF(2^n)
fn double(input: &[u8], rb: u8) -> [u8; MAX_BLOCK_SIZE] {
    let mut output = [0u8; MAX_BLOCK_SIZE];
    let n = input.len();

    let mut carry = 0;
    for i in (0..n).rev() {
        output[i] = (input[i] << 1) | carry;
        carry = input[i] >> 7;
    }
    if input[0] & 0x80 != 0 {
        output[n - 1] ^= rb;
    }

    output
}

/// XOR `other` into `data`
pub(crate) fn xor_in_place(data: &mut [u8], other: &[u8]) {
    for (byte, other) in data.iter_mut().zip(other) {
        *byte ^= other;
    }
}

/// Pad with zero bytes up to a multiple of the block size
pub(crate) fn pad_zeros(data: &mut Vec<u8>, block_size: usize) {
    let remainder = data.len() % block_size;
    if remainder != 0 {
        data.resize(data.len() + block_size - remainder, 0);
    }
}

/// Rotate a challenge left by one byte
pub(crate) fn rotate_left(data: &[u8]) -> Zeroizing<Vec<u8>> {
    let mut rotated = Zeroizing::new(data.to_vec());
    rotated.rotate_left(1);
    rotated
}

/// Generate a random challenge of the given length
pub(crate) fn random_challenge(length: usize) -> Zeroizing<Vec<u8>> {
    let mut challenge = Zeroizing::new(vec![0u8; length]);
    rand::rng().fill_bytes(&mut challenge);
    challenge
}

/// Derive the session key from the two authentication challenges
pub(crate) fn derive_session_key(
    algorithm: KeyAlgorithm,
    rnd_a: &[u8],
    rnd_b: &[u8],
) -> Zeroizing<Vec<u8>> {
    let ranges: &[Range<usize>] = match algorithm {
        KeyAlgorithm::Des => &[0..4],
        KeyAlgorithm::ThreeK3Des => &[0..4, 6..10, 12..16],
        KeyAlgorithm::Aes => &[0..4, 12..16],
    };

    let mut key = Zeroizing::new(Vec::with_capacity(algorithm.key_length()));
    for range in ranges {
        key.extend_from_slice(&rnd_a[range.clone()]);
        key.extend_from_slice(&rnd_b[range.clone()]);
    }
    key
}

/// ISO/IEC 14443-3 type A CRC, as used by legacy cryptograms
pub(crate) fn crc16(data: &[u8]) -> [u8; 2] {
    let mut crc: u16 = 0x6363;
    for &byte in data {
        let mut b = byte ^ (crc as u8);
        b ^= b << 4;
        let b = u16::from(b);
        crc = (crc >> 8) ^ (b << 8) ^ (b << 3) ^ (b >> 4);
    }
    crc.to_le_bytes()
}

/// CRC32 as used by EV1 cryptograms (no final inversion)
pub(crate) fn crc32(data: &[u8]) -> [u8; 4] {
    let mut crc: u32 = 0xFFFF_FFFF;
    for &byte in data {
        crc ^= u32::from(byte);
        for _ in 0..8 {
            crc = if crc & 1 != 0 {
                (crc >> 1) ^ 0xEDB8_8320
            } else {
                crc >> 1
            };
        }
    }
    crc.to_le_bytes()
}
