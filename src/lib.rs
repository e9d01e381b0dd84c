//! XTS-AES sector encryption with NIST known-answer test support.
pub mod kat;
pub mod xts;

pub use xts::{decrypt_xts, encrypt_xts, XtsContext, XtsError, XtsKey};
