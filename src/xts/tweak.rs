//! Tweak arithmetic in GF(2^128).
use super::Block;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

/// Low terms of the reduction polynomial,
/// folded back in when a bit shifts out
const GF_128_FDBK: u128 = 0x87;

/// Multiplies `tweak` by α (the polynomial `x`) modulo
/// x^128 + x^7 + x^2 + x + 1.
///
/// The block is read as a little-endian 128-bit integer, so the carry
/// travels from byte 0 towards byte 15 and the reduction lands in byte 0.
/// The reduction is masked in rather than branched on, so the running time
/// does not depend on the tweak.
pub fn next_tweak(tweak: &Block) -> Block {
    let value = u128::from_le_bytes(*tweak);
    let carry = value >> 127;
    let reduced = (value << 1) ^ (GF_128_FDBK & carry.wrapping_neg());
    reduced.to_le_bytes()
}

/// The running tweak of one data unit, starting at the encrypted
/// initial tweak `T0`.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct Tweak {
    bytes: Block,
}

impl From<Block> for Tweak {
    fn from(bytes: Block) -> Self {
        Self { bytes }
    }
}

impl Tweak {
    /// Returns the contents, then
    /// multiplies the inner bytes by α.
    /// This is intentionally the only method
    /// giving access to the inner state,
    /// because each value must mask exactly
    /// one 128bit block.
    pub fn advance(&mut self) -> Zeroizing<Block> {
        let current = Zeroizing::new(self.bytes);
        self.bytes = next_tweak(&self.bytes);
        current
    }
}

/// Encodes a data unit sequence number as a tweak, little-endian
/// as IEEE P1619 prescribes.
pub fn tweak_from_sequence_number(sequence_number: u128) -> Block {
    sequence_number.to_le_bytes()
}
