//! AES in counter mode.
//!
//! Key and IV may be installed in either order. Once both are present the
//! crypter holds two independent keystreams, one for each direction, that
//! advance across calls. Installing a new IV re-synchronizes both streams
//! without touching the key.

use aes::{Aes128, Aes192, Aes256};
use ctr::{
    Ctr128BE,
    cipher::{KeyIvInit, StreamCipher},
};
use zeroize::Zeroizing;

use super::{Crypter, CrypterFamily, KeyInstall};
use crate::{
    error::{CryptoError, LastError},
    random::random_bytes,
};

const ALGORITHM: &str = "AES";

/// AES block size, and the size of the IV (bytes)
const BLOCK_SIZE: usize = 16;

const MIN_KEY_BITS: usize = 128;
const MAX_KEY_BITS: usize = 256;
const KEY_BITS_STEP: usize = 64;
const IV_BITS: usize = BLOCK_SIZE * 8;

/// `len` rounded up to whole blocks, saturating at the largest block multiple.
fn block_round(len: usize) -> usize {
    len.checked_next_multiple_of(BLOCK_SIZE).unwrap_or(usize::MAX - usize::MAX % BLOCK_SIZE)
}

enum Keystream {
    Aes128(Ctr128BE<Aes128>),
    Aes192(Ctr128BE<Aes192>),
    Aes256(Ctr128BE<Aes256>),
}

impl Keystream {
    fn new(key: &[u8], iv: &[u8; BLOCK_SIZE]) -> Result<Self, CryptoError> {
        let stream = match key.len() {
            16 => Ctr128BE::<Aes128>::new_from_slices(key, iv).map(Self::Aes128),
            24 => Ctr128BE::<Aes192>::new_from_slices(key, iv).map(Self::Aes192),
            32 => Ctr128BE::<Aes256>::new_from_slices(key, iv).map(Self::Aes256),
            other => return Err(invalid_key(other * 8)),
        };
        stream.map_err(|e| CryptoError::EngineFailure(e.to_string()))
    }

    fn apply(&mut self, buffer: &mut [u8]) -> Result<(), CryptoError> {
        let result = match self {
            Self::Aes128(stream) => stream.try_apply_keystream(buffer),
            Self::Aes192(stream) => stream.try_apply_keystream(buffer),
            Self::Aes256(stream) => stream.try_apply_keystream(buffer),
        };
        result.map_err(|e| CryptoError::EngineFailure(e.to_string()))
    }
}

struct Keystreams {
    encrypt: Keystream,
    decrypt: Keystream,
}

fn invalid_key(bits: usize) -> CryptoError {
    CryptoError::InvalidKeyLength { algorithm: ALGORITHM, role: "key", length: bits }
}

fn invalid_iv(bits: usize) -> CryptoError {
    CryptoError::InvalidKeyLength { algorithm: ALGORITHM, role: "IV", length: bits }
}

fn is_key_bits(bits: usize) -> bool {
    matches!(bits, 128 | 192 | 256)
}

/// AES-128/192/256 in CTR mode with a 128-bit big-endian counter.
pub struct AesCrypter {
    key: Option<Zeroizing<Vec<u8>>>,
    iv: Option<[u8; BLOCK_SIZE]>,
    streams: Option<Keystreams>,
    last_error: LastError,
}

impl AesCrypter {
    /// Create a crypter with neither key nor IV.
    pub fn new() -> Self {
        Self { key: None, iv: None, streams: None, last_error: LastError::default() }
    }

    fn install_key(&mut self, key: &[u8]) -> Result<(), CryptoError> {
        if !is_key_bits(key.len() * 8) {
            return Err(invalid_key(key.len() * 8));
        }
        let key = Zeroizing::new(key.to_vec());
        self.streams = match &self.iv {
            Some(iv) => Some(Self::keystreams(&key, iv)?),
            None => None,
        };
        self.key = Some(key);
        Ok(())
    }

    fn install_iv(&mut self, iv: &[u8]) -> Result<(), CryptoError> {
        let Ok(iv) = <[u8; BLOCK_SIZE]>::try_from(iv) else {
            return Err(invalid_iv(iv.len() * 8));
        };
        self.streams = match &self.key {
            Some(key) => Some(Self::keystreams(key, &iv)?),
            None => None,
        };
        self.iv = Some(iv);
        Ok(())
    }

    fn keystreams(key: &[u8], iv: &[u8; BLOCK_SIZE]) -> Result<Keystreams, CryptoError> {
        Ok(Keystreams { encrypt: Keystream::new(key, iv)?, decrypt: Keystream::new(key, iv)? })
    }

    fn ready_streams(&mut self) -> Result<&mut Keystreams, CryptoError> {
        if self.key.is_none() {
            return Err(CryptoError::KeyNotSet { algorithm: ALGORITHM, role: "key" });
        }
        if self.iv.is_none() {
            return Err(CryptoError::KeyNotSet { algorithm: ALGORITHM, role: "IV" });
        }
        let Some(streams) = self.streams.as_mut() else {
            unreachable!("keystreams exist whenever key and IV are both installed");
        };
        Ok(streams)
    }

    fn generate_key(&mut self, bits: usize, install: KeyInstall) -> Result<Vec<u8>, CryptoError> {
        if !is_key_bits(bits) {
            return Err(invalid_key(bits));
        }
        let key = Zeroizing::new(random_bytes(bits / 8)?);
        if install == KeyInstall::Install {
            self.install_key(&key)?;
        }
        tracing::debug!(bits, ?install, "generated AES key");
        Ok(key.to_vec())
    }

    fn generate_iv(&mut self, bits: usize, install: KeyInstall) -> Result<Vec<u8>, CryptoError> {
        if bits != IV_BITS {
            return Err(invalid_iv(bits));
        }
        let iv = random_bytes(BLOCK_SIZE)?;
        if install == KeyInstall::Install {
            self.install_iv(&iv)?;
        }
        Ok(iv)
    }

    fn apply(&mut self, input: &[u8], encrypt: bool) -> Result<Vec<u8>, CryptoError> {
        let streams = self.ready_streams()?;
        let stream = if encrypt { &mut streams.encrypt } else { &mut streams.decrypt };
        let mut buffer = input.to_vec();
        stream.apply(&mut buffer)?;
        Ok(buffer)
    }
}

impl Default for AesCrypter {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for AesCrypter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AesCrypter")
            .field("key_bits", &self.key.as_ref().map(|k| k.len() * 8))
            .field("iv_set", &self.iv.is_some())
            .finish_non_exhaustive()
    }
}

impl Crypter for AesCrypter {
    fn family(&self) -> CrypterFamily {
        CrypterFamily::Symmetric
    }

    fn algorithm_name(&self) -> String {
        "AES/CTR".to_string()
    }

    fn max_plaintext_length(&self, ciphertext_len: usize) -> usize {
        block_round(ciphertext_len)
    }

    fn ciphertext_length(&self, plaintext_len: usize) -> usize {
        block_round(plaintext_len)
    }

    fn fixed_max_plaintext_length(&self) -> usize {
        BLOCK_SIZE
    }

    fn fixed_ciphertext_length(&self) -> usize {
        BLOCK_SIZE
    }

    fn valid_primary_key_length(&self, bits: usize) -> usize {
        bits.clamp(MIN_KEY_BITS, MAX_KEY_BITS).div_ceil(KEY_BITS_STEP) * KEY_BITS_STEP
    }

    fn valid_secondary_key_length(&self, _bits: usize) -> usize {
        IV_BITS
    }

    fn generate_primary_key(
        &mut self,
        bits: usize,
        install: KeyInstall,
    ) -> Result<Vec<u8>, CryptoError> {
        let result = self.generate_key(bits, install);
        self.last_error.capture(result)
    }

    fn set_primary_key(&mut self, key: &[u8]) -> Result<(), CryptoError> {
        let result = self.install_key(key);
        self.last_error.capture(result)
    }

    fn generate_secondary_key(
        &mut self,
        bits: usize,
        install: KeyInstall,
    ) -> Result<Vec<u8>, CryptoError> {
        let result = self.generate_iv(bits, install);
        self.last_error.capture(result)
    }

    fn derive_secondary_key(
        &mut self,
        _primary_key: &[u8],
        _install: KeyInstall,
    ) -> Result<Vec<u8>, CryptoError> {
        self.last_error.capture(Err(CryptoError::UnsupportedOperation(
            "AES IV cannot be derived from a key, generate it from a size",
        )))
    }

    fn set_secondary_key(&mut self, key: &[u8]) -> Result<(), CryptoError> {
        let result = self.install_iv(key);
        self.last_error.capture(result)
    }

    fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let result = self.apply(plaintext, true);
        self.last_error.capture(result)
    }

    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let result = self.apply(ciphertext, false);
        self.last_error.capture(result)
    }

    fn has_primary_key(&self) -> bool {
        self.key.is_some()
    }

    fn has_secondary_key(&self) -> bool {
        self.iv.is_some()
    }

    fn last_error(&self) -> &str {
        self.last_error.message()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unhex(s: &str) -> Vec<u8> {
        hex::decode(s).unwrap()
    }

    fn keyed(bits: usize) -> AesCrypter {
        let mut crypter = AesCrypter::new();
        crypter.generate_primary_key(bits, KeyInstall::Install).unwrap();
        crypter.generate_secondary_key(IV_BITS, KeyInstall::Install).unwrap();
        crypter
    }

    #[test]
    fn sp800_38a_ctr_aes128() {
        let mut crypter = AesCrypter::new();
        crypter.set_primary_key(&unhex("2b7e151628aed2a6abf7158809cf4f3c")).unwrap();
        crypter.set_secondary_key(&unhex("f0f1f2f3f4f5f6f7f8f9fafbfcfdfeff")).unwrap();

        let ciphertext = crypter.encrypt(&unhex("6bc1bee22e409f96e93d7e117393172a")).unwrap();
        assert_eq!(hex::encode(ciphertext), "874d6191b620e3261bef6864990db6ce");
    }

    #[test]
    fn roundtrip_all_key_sizes() {
        for bits in [128, 192, 256] {
            let mut crypter = keyed(bits);
            let plaintext = b"attack\0at\0dawn";

            let ciphertext = crypter.encrypt(plaintext).unwrap();
            assert_eq!(ciphertext.len(), plaintext.len());
            assert_ne!(ciphertext.as_slice(), plaintext.as_slice());
            assert_eq!(crypter.decrypt(&ciphertext).unwrap(), plaintext);
        }
    }

    #[test]
    fn empty_input_gives_empty_output() {
        let mut crypter = keyed(256);
        assert!(crypter.encrypt(b"").unwrap().is_empty());
        assert!(crypter.decrypt(b"").unwrap().is_empty());
    }

    #[test]
    fn keystream_continues_across_calls() {
        let mut split = keyed(128);
        let mut whole = AesCrypter::new();
        whole.set_primary_key(split.key.as_deref().unwrap()).unwrap();
        whole.set_secondary_key(&split.iv.unwrap()).unwrap();

        let mut chunked = split.encrypt(b"first half, ").unwrap();
        chunked.extend(split.encrypt(b"second half").unwrap());

        assert_eq!(chunked, whole.encrypt(b"first half, second half").unwrap());
    }

    #[test]
    fn iv_resync_restarts_stream_and_keeps_key() {
        let mut crypter = keyed(192);
        let iv = crypter.iv.unwrap();

        let first = crypter.encrypt(b"same plaintext").unwrap();
        crypter.set_secondary_key(&iv).unwrap();
        let second = crypter.encrypt(b"same plaintext").unwrap();

        assert_eq!(first, second);
        assert!(crypter.has_primary_key());
    }

    #[test]
    fn key_and_iv_order_does_not_matter() {
        let key = unhex("000102030405060708090a0b0c0d0e0f");
        let iv = [7u8; BLOCK_SIZE];

        let mut key_first = AesCrypter::new();
        key_first.set_primary_key(&key).unwrap();
        key_first.set_secondary_key(&iv).unwrap();

        let mut iv_first = AesCrypter::new();
        iv_first.set_secondary_key(&iv).unwrap();
        iv_first.set_primary_key(&key).unwrap();

        assert_eq!(key_first.encrypt(b"order").unwrap(), iv_first.encrypt(b"order").unwrap());
    }

    #[test]
    fn missing_iv_is_reported() {
        let mut crypter = AesCrypter::new();
        crypter.generate_primary_key(128, KeyInstall::Install).unwrap();

        let result = crypter.encrypt(b"data");
        assert_eq!(result, Err(CryptoError::KeyNotSet { algorithm: "AES", role: "IV" }));
        assert_eq!(crypter.last_error(), "AES IV was not set");
    }

    #[test]
    fn rejected_key_keeps_previous_key() {
        let mut crypter = keyed(128);
        let iv = crypter.iv.unwrap();
        let before = crypter.encrypt(b"x").unwrap();
        crypter.set_secondary_key(&iv).unwrap();

        let result = crypter.set_primary_key(&[0u8; 20]);
        assert_eq!(result, Err(invalid_key(160)));
        assert_eq!(crypter.encrypt(b"x").unwrap(), before);
    }

    #[test]
    fn generation_rejects_odd_sizes() {
        let mut crypter = AesCrypter::new();
        assert_eq!(crypter.generate_primary_key(100, KeyInstall::Install), Err(invalid_key(100)));
        assert_eq!(crypter.generate_secondary_key(64, KeyInstall::Install), Err(invalid_iv(64)));
        assert!(!crypter.has_primary_key());
        assert!(!crypter.has_secondary_key());
    }

    #[test]
    fn detached_generation_installs_nothing() {
        let mut crypter = AesCrypter::new();
        let key = crypter.generate_primary_key(256, KeyInstall::Detached).unwrap();
        let iv = crypter.generate_secondary_key(128, KeyInstall::Detached).unwrap();

        assert_eq!(key.len(), 32);
        assert_eq!(iv.len(), 16);
        assert!(!crypter.has_primary_key());
        assert!(!crypter.has_secondary_key());
    }

    #[test]
    fn valid_key_lengths() {
        let crypter = AesCrypter::new();
        let cases = [(0, 128), (128, 128), (129, 192), (192, 192), (200, 256), (4096, 256)];
        for (requested, valid) in cases {
            assert_eq!(crypter.valid_primary_key_length(requested), valid, "{requested}");
        }
        assert_eq!(crypter.valid_secondary_key_length(12345), 128);
    }

    #[test]
    fn sizes_round_to_block() {
        let crypter = AesCrypter::new();
        assert_eq!(crypter.ciphertext_length(0), 0);
        assert_eq!(crypter.ciphertext_length(1), 16);
        assert_eq!(crypter.ciphertext_length(16), 16);
        assert_eq!(crypter.max_plaintext_length(17), 32);
        assert_eq!(crypter.fixed_ciphertext_length(), 16);
    }

    #[test]
    fn sizes_saturate_at_largest_block() {
        let crypter = AesCrypter::new();
        let largest = usize::MAX - usize::MAX % BLOCK_SIZE;

        assert_eq!(crypter.ciphertext_length(usize::MAX), largest);
        assert_eq!(crypter.max_plaintext_length(usize::MAX), largest);
        assert_eq!(crypter.ciphertext_length(largest), largest);
        assert_eq!(crypter.ciphertext_length(largest - 1), largest);
    }
}
