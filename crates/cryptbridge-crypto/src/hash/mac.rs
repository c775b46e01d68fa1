//! Keyed digest object.
//!
//! An HMAC is never observable without a key: objects are either built from
//! a caller key or from a fresh random one, and `set_key` swaps keys
//! atomically (a rejected key leaves the previous one installed).

use zeroize::Zeroizing;

use super::{
    Digester, HashAlgorithm, Keyed,
    engine::{MacEngine, mac_engine},
};
use crate::{error::CryptoError, random::random_bytes};

/// Largest accepted HMAC key, in bytes.
pub const MAX_HMAC_KEY_LENGTH: usize = i32::MAX as usize;

/// Key length used when the caller does not pick one, in bytes.
pub const DEFAULT_HMAC_KEY_LENGTH: usize = 16;

/// Incremental HMAC over one [`HashAlgorithm`].
pub struct Hmac {
    algorithm: HashAlgorithm,
    engine: Box<dyn MacEngine>,
    default_key_len: usize,
}

impl Hmac {
    /// Create an HMAC keyed with `key`.
    ///
    /// # Errors
    ///
    /// - `UnsupportedOperation` if the algorithm cannot back an HMAC (CRC32)
    /// - `InvalidKeyLength` if the key exceeds [`MAX_HMAC_KEY_LENGTH`]
    pub fn new(algorithm: HashAlgorithm, key: &[u8]) -> Result<Self, CryptoError> {
        check_key_length(key)?;
        let engine = mac_engine(algorithm, key)?;
        Ok(Self { algorithm, engine, default_key_len: DEFAULT_HMAC_KEY_LENGTH })
    }

    /// Create an HMAC keyed with `key_len` fresh random bytes.
    ///
    /// The key is never revealed, so MACs produced before an explicit
    /// [`set_key`](Keyed::set_key) cannot be reproduced by anyone else.
    pub fn with_random_key(algorithm: HashAlgorithm, key_len: usize) -> Result<Self, CryptoError> {
        let key = Zeroizing::new(random_bytes(key_len)?);
        let mut hmac = Self::new(algorithm, &key)?;
        hmac.default_key_len = key_len;
        Ok(hmac)
    }
}

fn check_key_length(key: &[u8]) -> Result<(), CryptoError> {
    if key.len() > MAX_HMAC_KEY_LENGTH {
        return Err(CryptoError::InvalidKeyLength {
            algorithm: "HMAC",
            role: "key",
            length: key.len() * 8,
        });
    }
    Ok(())
}

impl std::fmt::Debug for Hmac {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hmac").field("algorithm", &self.algorithm).finish_non_exhaustive()
    }
}

impl Digester for Hmac {
    fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    fn algorithm_name(&self) -> String {
        format!("HMAC({})", self.algorithm.name())
    }

    fn digest_size(&self) -> usize {
        self.engine.output_size()
    }

    fn block_size(&self) -> usize {
        self.engine.block_size()
    }

    fn update(&mut self, data: &[u8]) {
        self.engine.update(data);
    }

    fn finalize(&mut self) -> Vec<u8> {
        self.engine.finalize_reset()
    }

    fn restart(&mut self) {
        self.engine.reset();
    }
}

impl Keyed for Hmac {
    fn set_key(&mut self, key: &[u8]) -> Result<(), CryptoError> {
        check_key_length(key)?;
        self.engine = mac_engine(self.algorithm, key)?;
        Ok(())
    }

    fn min_key_length(&self) -> usize {
        0
    }

    fn max_key_length(&self) -> usize {
        MAX_HMAC_KEY_LENGTH
    }

    fn default_key_length(&self) -> usize {
        self.default_key_len
    }

    fn valid_key_length(&self, len: usize) -> usize {
        len.min(MAX_HMAC_KEY_LENGTH)
    }

    fn verify(&self, data: &[u8], mac: &[u8]) -> Result<bool, CryptoError> {
        let expected = self.digest_size();
        if mac.len() != expected {
            return Err(CryptoError::InvalidMacLength { expected, actual: mac.len() });
        }
        Ok(self.engine.verify(data, mac))
    }
}
