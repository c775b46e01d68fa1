//! Cryptographically secure randomness.
//!
//! All key, nonce and IV material comes from the OS generator. There is no
//! process-wide pool to seed: every call draws fresh entropy.

use rand::{RngCore, rngs::OsRng};

use crate::error::CryptoError;

/// Fill `buffer` from the OS generator.
pub fn fill_random(buffer: &mut [u8]) -> Result<(), CryptoError> {
    OsRng.try_fill_bytes(buffer).map_err(|e| CryptoError::EngineFailure(e.to_string()))
}

/// Allocate `len` random bytes.
pub fn random_bytes(len: usize) -> Result<Vec<u8>, CryptoError> {
    let mut bytes = vec![0u8; len];
    fill_random(&mut bytes)?;
    Ok(bytes)
}
