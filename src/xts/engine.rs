//! An XTS-AES implementation based off IEEE P1619,
//! including ciphertext stealing for data units
//! that aren't a multiple of the AES block size.
use super::{
    cipher::{AesCipher, BlockCipher},
    tweak::{tweak_from_sequence_number, Tweak},
    Block, Result, XtsError, XtsKey, AES_BLOCK_SIZE, MAX_DATA_UNIT_SIZE,
};
use tracing::trace;
use zeroize::Zeroizing;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Encrypt,
    Decrypt,
}

/// A validated data unit, split once into the part
/// handled block by block and the stolen tail.
enum DataUnit<'a> {
    /// Length is a multiple of the block size
    Aligned(&'a mut [u8]),
    /// `head` is at least one full block, `tail`
    /// holds the 1..=15 trailing bytes
    Stealing {
        head: &'a mut [u8],
        tail: &'a mut [u8],
    },
}

impl<'a> DataUnit<'a> {
    fn split(data: &'a mut [u8]) -> Result<Self> {
        if data.len() < AES_BLOCK_SIZE || data.len() > MAX_DATA_UNIT_SIZE {
            return Err(XtsError::UnsupportedDataUnitSize(data.len()));
        }
        let remainder = data.len() % AES_BLOCK_SIZE;
        if remainder == 0 {
            Ok(Self::Aligned(data))
        } else {
            let (head, tail) = data.split_at_mut(data.len() - remainder);
            Ok(Self::Stealing { head, tail })
        }
    }
}

fn xor_inplace<const N: usize>(dst: &mut [u8; N], other: &[u8; N]) {
    for (dst, &src) in dst.iter_mut().zip(other.iter()) {
        *dst ^= src
    }
}

fn as_block(chunk: &mut [u8]) -> &mut Block {
    let Ok(block) = chunk.try_into() else {
        unreachable!("callers only pass exact block-sized chunks")
    };
    block
}

fn check_tweak(tweak: &[u8]) -> Result<&Block> {
    tweak
        .try_into()
        .map_err(|_| XtsError::InvalidParameter("tweak must be 16 bytes long"))
}

/// Holds the prepared data and tweak key schedules.
/// The context is never mutated after construction,
/// so one instance can serve any number of threads.
#[derive(Debug, Clone)]
pub struct XtsContext<C: BlockCipher = AesCipher> {
    data_ctx: C,
    tweak_ctx: C,
}

impl<C: BlockCipher> XtsContext<C> {
    pub fn new(key: &XtsKey) -> Result<Self> {
        Ok(Self::from_ciphers(
            C::new(key.data_key())?,
            C::new(key.tweak_key())?,
        ))
    }

    pub fn from_ciphers(data_ctx: C, tweak_ctx: C) -> Self {
        Self {
            data_ctx,
            tweak_ctx,
        }
    }

    /// Encrypts the caller's tweak under the tweak key, giving `T0`.
    /// The tweak is encrypted in both directions.
    pub fn initial_tweak(&self, tweak: &Block) -> Tweak {
        let mut bytes = Zeroizing::new(*tweak);
        self.tweak_ctx.encrypt_block(&mut bytes);
        Tweak::from(*bytes)
    }

    fn xts_block(&self, block: &mut Block, tweak_bytes: &Block, direction: Direction) {
        xor_inplace(block, tweak_bytes);
        match direction {
            Direction::Encrypt => self.data_ctx.encrypt_block(block),
            Direction::Decrypt => self.data_ctx.decrypt_block(block),
        }
        xor_inplace(block, tweak_bytes);
    }

    fn xts_blocks(&self, data: &mut [u8], tweak: &mut Tweak, direction: Direction) {
        // `data` is always a whole number of blocks
        for chunk in data.chunks_exact_mut(AES_BLOCK_SIZE) {
            let tweak_bytes = tweak.advance();
            self.xts_block(as_block(chunk), &tweak_bytes, direction);
        }
    }

    /// Ciphertext stealing for the last full block `last` and the
    /// partial block `tail` behind it.
    ///
    /// Encrypting, `last` goes through with `T(m-1)`, its leading bytes
    /// become the output tail and the padded tail goes through with `T(m)`.
    /// Decrypting runs the same steps with the two tweaks swapped.
    fn steal(&self, last: &mut Block, tail: &mut [u8], tweak: &mut Tweak, direction: Direction) {
        let previous = tweak.advance();
        let next = tweak.advance();
        let (first, second) = match direction {
            Direction::Encrypt => (previous, next),
            Direction::Decrypt => (next, previous),
        };

        let remainder = tail.len();
        let mut stolen = Zeroizing::new(*last);
        self.xts_block(&mut stolen, &first, direction);

        let mut padded = Zeroizing::new(*stolen);
        padded[..remainder].copy_from_slice(tail);
        tail.copy_from_slice(&stolen[..remainder]);

        self.xts_block(&mut padded, &second, direction);
        last.copy_from_slice(&*padded);
    }

    /// Transforms one data unit in place. The buffer is only touched
    /// once every parameter has been validated.
    pub fn process_in_place(
        &self,
        data: &mut [u8],
        tweak: &[u8],
        direction: Direction,
    ) -> Result<()> {
        let tweak = check_tweak(tweak)?;
        let unit = DataUnit::split(data)?;
        let mut tweak = self.initial_tweak(tweak);
        match unit {
            DataUnit::Aligned(data) => {
                trace!(
                    "xts {:?}: {} aligned blocks",
                    direction,
                    data.len() / AES_BLOCK_SIZE
                );
                self.xts_blocks(data, &mut tweak, direction);
            }
            DataUnit::Stealing { head, tail } => {
                trace!(
                    "xts {:?}: {} full blocks, stealing {} bytes",
                    direction,
                    head.len() / AES_BLOCK_SIZE,
                    tail.len()
                );
                // `head` holds at least one block, `last` is exactly one
                let (body, last) = head.split_at_mut(head.len() - AES_BLOCK_SIZE);
                self.xts_blocks(body, &mut tweak, direction);
                self.steal(as_block(last), tail, &mut tweak, direction);
            }
        }
        Ok(())
    }

    pub fn encrypt_in_place(&self, data: &mut [u8], tweak: &[u8]) -> Result<()> {
        self.process_in_place(data, tweak, Direction::Encrypt)
    }

    pub fn decrypt_in_place(&self, data: &mut [u8], tweak: &[u8]) -> Result<()> {
        self.process_in_place(data, tweak, Direction::Decrypt)
    }

    pub fn encrypt(&self, plaintext: &[u8], tweak: &[u8]) -> Result<Vec<u8>> {
        let mut data = plaintext.to_vec();
        self.encrypt_in_place(&mut data, tweak)?;
        Ok(data)
    }

    pub fn decrypt(&self, ciphertext: &[u8], tweak: &[u8]) -> Result<Vec<u8>> {
        let mut data = ciphertext.to_vec();
        self.decrypt_in_place(&mut data, tweak)?;
        Ok(data)
    }

    /// Encrypts a data unit identified by its sequence number,
    /// e.g. the sector index.
    pub fn encrypt_sector(&self, data: &mut [u8], sequence_number: u128) -> Result<()> {
        self.encrypt_in_place(data, &tweak_from_sequence_number(sequence_number))
    }

    pub fn decrypt_sector(&self, data: &mut [u8], sequence_number: u128) -> Result<()> {
        self.decrypt_in_place(data, &tweak_from_sequence_number(sequence_number))
    }
}
