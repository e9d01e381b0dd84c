//! XTS-AES (IEEE P1619 / NIST SP 800-38E) over single data units.
//!
//! The two free functions [`encrypt_xts`] and [`decrypt_xts`] take raw key,
//! tweak and data slices. Callers encrypting many sectors under one key should
//! build an [`XtsContext`] once and reuse it, so the AES key schedules are only
//! expanded once.
use rand::RngCore;
use thiserror::Error;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

pub mod cipher;
pub mod engine;
pub mod tweak;

pub use cipher::{AesCipher, BlockCipher};
pub use engine::{Direction, XtsContext};
pub use tweak::{next_tweak, tweak_from_sequence_number, Tweak};

/// Always 128 bits by definition
pub const AES_BLOCK_SIZE: usize = 16;

/// IEEE P1619 caps a data unit at 2^20 AES blocks
pub const MAX_DATA_UNIT_SIZE: usize = (1 << 20) * AES_BLOCK_SIZE;

/// Alias for a block-sized byte array
pub type Block = [u8; AES_BLOCK_SIZE];

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum XtsError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(&'static str),
    #[error("Unsupported data unit size of {0} bytes (must be between 16 bytes and 2^20 blocks)")]
    UnsupportedDataUnitSize(usize),
    #[error("Block cipher failure: {0}")]
    PrimitiveFailure(&'static str),
}

pub type Result<T> = std::result::Result<T, XtsError>;

pub fn get_random_bytes<const N: usize>() -> [u8; N] {
    let mut buf = [0; N];
    rand::thread_rng().fill_bytes(&mut buf);
    buf
}

/// Length of each of the two AES keys in a combined XTS key.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySize {
    Aes128,
    Aes256,
}

impl KeySize {
    pub fn from_key_len(len: usize) -> Result<Self> {
        match len {
            16 => Ok(Self::Aes128),
            32 => Ok(Self::Aes256),
            _ => Err(XtsError::InvalidParameter(
                "AES key must be 16 or 32 bytes long",
            )),
        }
    }

    /// Bytes in a single AES key
    pub const fn key_len(self) -> usize {
        match self {
            Self::Aes128 => 16,
            Self::Aes256 => 32,
        }
    }

    /// Bytes in the combined `Key1 || Key2` form
    pub const fn combined_len(self) -> usize {
        2 * self.key_len()
    }
}

/// The pair of independent AES keys XTS needs: the data key (Key1)
/// encrypts the blocks, the tweak key (Key2) encrypts the tweak.
#[derive(Clone, Zeroize, ZeroizeOnDrop)]
pub struct XtsKey {
    data_key: Vec<u8>,
    tweak_key: Vec<u8>,
}

impl std::fmt::Debug for XtsKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("XtsKey")
            .field("size", &self.size())
            .finish_non_exhaustive()
    }
}

impl XtsKey {
    pub fn new(data_key: &[u8], tweak_key: &[u8]) -> Result<Self> {
        KeySize::from_key_len(data_key.len())?;
        KeySize::from_key_len(tweak_key.len())?;
        if data_key.len() != tweak_key.len() {
            return Err(XtsError::InvalidParameter(
                "data key and tweak key must have the same length",
            ));
        }
        Ok(Self {
            data_key: data_key.to_vec(),
            tweak_key: tweak_key.to_vec(),
        })
    }

    /// Splits a combined `Key1 || Key2` key (32 or 64 bytes) in half.
    pub fn from_combined(combined: &[u8]) -> Result<Self> {
        if combined.len() % 2 != 0 {
            return Err(XtsError::InvalidParameter(
                "combined XTS key must be 32 or 64 bytes long",
            ));
        }
        let (data_key, tweak_key) = combined.split_at(combined.len() / 2);
        KeySize::from_key_len(data_key.len()).map_err(|_| {
            XtsError::InvalidParameter("combined XTS key must be 32 or 64 bytes long")
        })?;
        Self::new(data_key, tweak_key)
    }

    pub fn random(size: KeySize) -> Self {
        let data_key = Zeroizing::new(get_random_bytes::<32>());
        let tweak_key = Zeroizing::new(get_random_bytes::<32>());
        Self {
            data_key: data_key[..size.key_len()].to_vec(),
            tweak_key: tweak_key[..size.key_len()].to_vec(),
        }
    }

    pub fn size(&self) -> KeySize {
        match self.data_key.len() {
            16 => KeySize::Aes128,
            _ => KeySize::Aes256,
        }
    }

    pub fn data_key(&self) -> &[u8] {
        &self.data_key
    }

    pub fn tweak_key(&self) -> &[u8] {
        &self.tweak_key
    }

    pub fn to_combined(&self) -> Zeroizing<Vec<u8>> {
        let mut combined = Zeroizing::new(Vec::with_capacity(self.size().combined_len()));
        combined.extend_from_slice(&self.data_key);
        combined.extend_from_slice(&self.tweak_key);
        combined
    }
}

/// Encrypts one data unit. `key1` is the data key, `key2` the tweak key,
/// `tweak` the 16 byte data unit identifier. The output has the same length
/// as `data`.
pub fn encrypt_xts(key1: &[u8], key2: &[u8], tweak: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let key = XtsKey::new(key1, key2)?;
    XtsContext::<AesCipher>::new(&key)?.encrypt(data, tweak)
}

/// Inverse of [`encrypt_xts`].
pub fn decrypt_xts(key1: &[u8], key2: &[u8], tweak: &[u8], data: &[u8]) -> Result<Vec<u8>> {
    let key = XtsKey::new(key1, key2)?;
    XtsContext::<AesCipher>::new(&key)?.decrypt(data, tweak)
}
