//! Digest helpers used in this crate.

use blake2::{Blake2b, Blake2b512};
use digest::{consts::U32, Digest};

pub type Blake2b256 = Blake2b<U32>;

/// Short base58 digest used to derive identifiers from other identifiers.
pub fn short_digest(input: &[u8]) -> String {
    let digest = Blake2b512::digest(input);
    bs58::encode(&digest[..10]).into_string()
}
