//! Constants used in DESFire operations
//!
//! This module contains the native command codes, ISO 7816 wrapping bytes,
//! crypto-mode flags and file-type tags used by Mifare DESFire cards.

use derive_more::Display;

/// ISO 7816-4 wrapping of native DESFire commands
pub mod iso {
    /// CLA byte used for wrapped native commands
    pub const CLA: u8 = 0x90;
    /// SW1 returned by the card for every wrapped native response
    pub const SW1_NATIVE: u8 = 0x91;
}

/// Native DESFire instruction codes
pub mod ins {
    /// AUTHENTICATE (legacy DES/3DES)
    pub const AUTHENTICATE_LEGACY: u8 = 0x0A;
    /// AUTHENTICATE_ISO (3K3DES)
    pub const AUTHENTICATE_ISO: u8 = 0x1A;
    /// AUTHENTICATE_AES
    pub const AUTHENTICATE_AES: u8 = 0xAA;
    /// Continuation frame of a multi-frame exchange
    pub const ADDITIONAL_FRAME: u8 = 0xAF;
    /// CHANGE_KEY_SETTINGS
    pub const CHANGE_KEY_SETTINGS: u8 = 0x54;
    /// GET_KEY_SETTINGS
    pub const GET_KEY_SETTINGS: u8 = 0x45;
    /// CHANGE_KEY
    pub const CHANGE_KEY: u8 = 0xC4;
    /// GET_KEY_VERSION
    pub const GET_KEY_VERSION: u8 = 0x64;
    /// SELECT_APPLICATION
    pub const SELECT_APPLICATION: u8 = 0x5A;
}

/// DES cryptography mode, ORed with a key number
pub const CRYPTO_DES: u8 = 0x00;
/// 3K3DES cryptography mode, ORed with a key number
pub const CRYPTO_3K3DES: u8 = 0x40;
/// AES cryptography mode, ORed with a key number
pub const CRYPTO_AES: u8 = 0x80;

/// Mask selecting the key number out of a key-number byte
pub const KEY_NO_MASK: u8 = 0x0F;

/// Application identifier of the PICC level
pub const PICC_AID: [u8; 3] = [0x00, 0x00, 0x00];

/// Length of the truncated CMAC appended to EV1 responses
pub const MAC_LENGTH: usize = 8;

/// DESFire file types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
#[repr(u8)]
pub enum FileType {
    /// Standard data file
    #[display("standard data file")]
    StandardData = 0x00,
    /// Backup data file
    #[display("backup data file")]
    BackupData = 0x01,
    /// Value file with backup
    #[display("value file with backup")]
    ValueWithBackup = 0x02,
    /// Linear record file with backup
    #[display("linear record file with backup")]
    LinearRecordWithBackup = 0x03,
    /// Cyclic record file with backup
    #[display("cyclic record file with backup")]
    CyclicRecordWithBackup = 0x04,
}

impl FileType {
    /// Get the file type from its tag
    pub const fn from_u8(tag: u8) -> Option<Self> {
        match tag {
            0x00 => Some(Self::StandardData),
            0x01 => Some(Self::BackupData),
            0x02 => Some(Self::ValueWithBackup),
            0x03 => Some(Self::LinearRecordWithBackup),
            0x04 => Some(Self::CyclicRecordWithBackup),
            _ => None,
        }
    }

    /// Get the tag of this file type
    pub const fn to_u8(self) -> u8 {
        self as u8
    }
}

/// Standard data file tag
pub const STANDARD_DATA_FILE: u8 = FileType::StandardData.to_u8();
/// Backup data file tag
pub const BACKUP_DATA_FILE: u8 = FileType::BackupData.to_u8();
/// Value file with backup tag
pub const VALUE_FILE_WITH_BACKUP: u8 = FileType::ValueWithBackup.to_u8();
/// Linear record file with backup tag
pub const LINEAR_RECORD_FILE_WITH_BACKUP: u8 = FileType::LinearRecordWithBackup.to_u8();
/// Cyclic record file with backup tag
pub const CYCLIC_RECORD_FILE_WITH_BACKUP: u8 = FileType::CyclicRecordWithBackup.to_u8();
