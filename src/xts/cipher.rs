//! The block cipher underneath XTS. The mode only ever needs to
//! en/decrypt a single 16 byte block, so any AES backend can be plugged
//! in through [`BlockCipher`].
use super::{Block, KeySize, Result, XtsError};

use aes::{
    cipher::{generic_array::GenericArray, BlockDecrypt, BlockEncrypt, KeyInit},
    Aes128, Aes256,
};

/// A 128 bit block cipher with a prepared key schedule.
pub trait BlockCipher: Sized {
    /// Expands `key` into a key schedule.
    fn new(key: &[u8]) -> Result<Self>;
    fn encrypt_block(&self, block: &mut Block);
    fn decrypt_block(&self, block: &mut Block);
}

/// AES needs to prepare the keys before
/// en/decryption can occur. The round keys
/// are wiped on drop (`aes/zeroize`).
#[derive(Clone)]
pub enum AesCipher {
    Aes128(Aes128),
    Aes256(Aes256),
}

impl std::fmt::Debug for AesCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Aes128(_) => f.write_str("AesCipher::Aes128"),
            Self::Aes256(_) => f.write_str("AesCipher::Aes256"),
        }
    }
}

impl BlockCipher for AesCipher {
    fn new(key: &[u8]) -> Result<Self> {
        const SCHEDULE_REJECTED: XtsError = XtsError::PrimitiveFailure("AES rejected the key");
        match KeySize::from_key_len(key.len())? {
            KeySize::Aes128 => Aes128::new_from_slice(key)
                .map(Self::Aes128)
                .map_err(|_| SCHEDULE_REJECTED),
            KeySize::Aes256 => Aes256::new_from_slice(key)
                .map(Self::Aes256)
                .map_err(|_| SCHEDULE_REJECTED),
        }
    }

    fn encrypt_block(&self, block: &mut Block) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(aes) => aes.encrypt_block(block),
            Self::Aes256(aes) => aes.encrypt_block(block),
        }
    }

    fn decrypt_block(&self, block: &mut Block) {
        let block = GenericArray::from_mut_slice(block);
        match self {
            Self::Aes128(aes) => aes.decrypt_block(block),
            Self::Aes256(aes) => aes.decrypt_block(block),
        }
    }
}
