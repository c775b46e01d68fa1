//! RSAES-OAEP with SHA-256 and MGF1(SHA-256).
//!
//! Private keys travel as PKCS#8 DER, public keys as SPKI DER. The two
//! halves are installed independently: encryption needs the public key,
//! decryption the private key. Re-keying one leaves the other alone.

use rand::rngs::OsRng;
use rsa::{
    Oaep, RsaPrivateKey, RsaPublicKey,
    pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey},
    traits::PublicKeyParts,
};
use sha2::Sha256;

use super::{Crypter, CrypterFamily, KeyInstall};
use crate::error::{CryptoError, LastError};

const ALGORITHM: &str = "RSA";

const MIN_MODULUS_BITS: usize = 1024;
const MAX_MODULUS_BITS: usize = 4096;

/// OAEP padding overhead for a 32-byte hash: `2 * hLen + 2`.
const OAEP_OVERHEAD: usize = 2 * 32 + 2;

fn check_modulus(bits: usize, role: &'static str) -> Result<(), CryptoError> {
    if (MIN_MODULUS_BITS..=MAX_MODULUS_BITS).contains(&bits) {
        Ok(())
    } else {
        Err(CryptoError::InvalidKeyLength { algorithm: ALGORITHM, role, length: bits })
    }
}

fn parse_private(der: &[u8]) -> Result<RsaPrivateKey, CryptoError> {
    let key = RsaPrivateKey::from_pkcs8_der(der).map_err(|e| CryptoError::InvalidKeyFormat {
        algorithm: ALGORITHM,
        role: "private key",
        reason: e.to_string(),
    })?;
    check_modulus(key.size() * 8, "private key")?;
    Ok(key)
}

fn parse_public(der: &[u8]) -> Result<RsaPublicKey, CryptoError> {
    let key = RsaPublicKey::from_public_key_der(der).map_err(|e| CryptoError::InvalidKeyFormat {
        algorithm: ALGORITHM,
        role: "public key",
        reason: e.to_string(),
    })?;
    check_modulus(key.size() * 8, "public key")?;
    Ok(key)
}

fn encode_private(key: &RsaPrivateKey) -> Result<Vec<u8>, CryptoError> {
    let der = key.to_pkcs8_der().map_err(|e| CryptoError::EngineFailure(e.to_string()))?;
    Ok(der.as_bytes().to_vec())
}

fn encode_public(key: &RsaPublicKey) -> Result<Vec<u8>, CryptoError> {
    let der = key.to_public_key_der().map_err(|e| CryptoError::EngineFailure(e.to_string()))?;
    Ok(der.as_bytes().to_vec())
}

/// RSA-OAEP crypter.
#[derive(Default)]
pub struct RsaCrypter {
    private_key: Option<RsaPrivateKey>,
    public_key: Option<RsaPublicKey>,
    last_error: LastError,
}

impl RsaCrypter {
    /// Create a crypter with no keys installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Modulus size in bytes of whichever key is installed, public first.
    fn modulus_len(&self) -> usize {
        match (&self.public_key, &self.private_key) {
            (Some(public), _) => public.size(),
            (None, Some(private)) => private.size(),
            (None, None) => 0,
        }
    }

    fn generate_private(
        &mut self,
        bits: usize,
        install: KeyInstall,
    ) -> Result<Vec<u8>, CryptoError> {
        check_modulus(bits, "private key")?;
        let key = RsaPrivateKey::new(&mut OsRng, bits)
            .map_err(|e| CryptoError::EngineFailure(e.to_string()))?;
        let der = encode_private(&key)?;
        if install == KeyInstall::Install {
            self.private_key = Some(key);
        }
        tracing::debug!(bits, ?install, "generated RSA private key");
        Ok(der)
    }

    fn derive_public(
        &mut self,
        private_der: &[u8],
        install: KeyInstall,
    ) -> Result<Vec<u8>, CryptoError> {
        let public = parse_private(private_der)?.to_public_key();
        let der = encode_public(&public)?;
        if install == KeyInstall::Install {
            self.public_key = Some(public);
        }
        Ok(der)
    }

    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let Some(public) = &self.public_key else {
            return Err(CryptoError::KeyNotSet { algorithm: ALGORITHM, role: "public key" });
        };
        public
            .encrypt(&mut OsRng, Oaep::new::<Sha256>(), plaintext)
            .map_err(|e| CryptoError::EngineFailure(e.to_string()))
    }

    fn open(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let Some(private) = &self.private_key else {
            return Err(CryptoError::KeyNotSet { algorithm: ALGORITHM, role: "private key" });
        };
        private
            .decrypt(Oaep::new::<Sha256>(), ciphertext)
            .map_err(|e| CryptoError::EngineFailure(e.to_string()))
    }
}

impl std::fmt::Debug for RsaCrypter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RsaCrypter")
            .field("private_key", &self.private_key.is_some())
            .field("public_key", &self.public_key.is_some())
            .finish_non_exhaustive()
    }
}

impl Crypter for RsaCrypter {
    fn family(&self) -> CrypterFamily {
        CrypterFamily::Rsa
    }

    fn algorithm_name(&self) -> String {
        "RSA/OAEP-MGF1(SHA-256)".to_string()
    }

    fn max_plaintext_length(&self, ciphertext_len: usize) -> usize {
        if ciphertext_len != 0 && ciphertext_len == self.modulus_len() {
            self.fixed_max_plaintext_length()
        } else {
            0
        }
    }

    fn ciphertext_length(&self, plaintext_len: usize) -> usize {
        let k = self.modulus_len();
        if k != 0 && plaintext_len <= self.fixed_max_plaintext_length() { k } else { 0 }
    }

    fn fixed_max_plaintext_length(&self) -> usize {
        self.modulus_len().saturating_sub(OAEP_OVERHEAD)
    }

    fn fixed_ciphertext_length(&self) -> usize {
        self.modulus_len()
    }

    fn valid_primary_key_length(&self, bits: usize) -> usize {
        bits.clamp(MIN_MODULUS_BITS, MAX_MODULUS_BITS)
    }

    fn valid_secondary_key_length(&self, bits: usize) -> usize {
        bits.clamp(MIN_MODULUS_BITS, MAX_MODULUS_BITS)
    }

    fn generate_primary_key(
        &mut self,
        bits: usize,
        install: KeyInstall,
    ) -> Result<Vec<u8>, CryptoError> {
        let result = self.generate_private(bits, install);
        self.last_error.capture(result)
    }

    fn set_primary_key(&mut self, key: &[u8]) -> Result<(), CryptoError> {
        let result = parse_private(key).map(|key| self.private_key = Some(key));
        self.last_error.capture(result)
    }

    fn generate_secondary_key(
        &mut self,
        _bits: usize,
        _install: KeyInstall,
    ) -> Result<Vec<u8>, CryptoError> {
        self.last_error.capture(Err(CryptoError::UnsupportedOperation(
            "RSA private key is required to generate a public key",
        )))
    }

    fn derive_secondary_key(
        &mut self,
        primary_key: &[u8],
        install: KeyInstall,
    ) -> Result<Vec<u8>, CryptoError> {
        let result = self.derive_public(primary_key, install);
        self.last_error.capture(result)
    }

    fn set_secondary_key(&mut self, key: &[u8]) -> Result<(), CryptoError> {
        let result = parse_public(key).map(|key| self.public_key = Some(key));
        self.last_error.capture(result)
    }

    fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let result = self.seal(plaintext);
        self.last_error.capture(result)
    }

    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let result = self.open(ciphertext);
        self.last_error.capture(result)
    }

    fn has_primary_key(&self) -> bool {
        self.private_key.is_some()
    }

    fn has_secondary_key(&self) -> bool {
        self.public_key.is_some()
    }

    fn last_error(&self) -> &str {
        self.last_error.message()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed() -> (RsaCrypter, Vec<u8>) {
        let mut crypter = RsaCrypter::new();
        let private = crypter.generate_primary_key(1024, KeyInstall::Install).unwrap();
        crypter.derive_secondary_key(&private, KeyInstall::Install).unwrap();
        (crypter, private)
    }

    #[test]
    fn roundtrip_and_sizes() {
        let (mut crypter, _) = keyed();

        assert_eq!(crypter.fixed_ciphertext_length(), 128);
        assert_eq!(crypter.fixed_max_plaintext_length(), 128 - 66);
        assert_eq!(crypter.ciphertext_length(62), 128);
        assert_eq!(crypter.ciphertext_length(63), 0);
        assert_eq!(crypter.max_plaintext_length(128), 62);
        assert_eq!(crypter.max_plaintext_length(127), 0);

        let plaintext = b"short\0secret";
        let ciphertext = crypter.encrypt(plaintext).unwrap();
        assert_eq!(ciphertext.len(), 128);
        assert_eq!(crypter.decrypt(&ciphertext).unwrap(), plaintext);
    }

    #[test]
    fn encryption_is_randomized() {
        let (mut crypter, _) = keyed();
        let first = crypter.encrypt(b"same").unwrap();
        let second = crypter.encrypt(b"same").unwrap();

        assert_ne!(first, second);
    }

    #[test]
    fn keys_roundtrip_through_set() {
        let (mut source, private) = keyed();
        let public = source.derive_secondary_key(&private, KeyInstall::Detached).unwrap();

        let mut sender = RsaCrypter::new();
        sender.set_secondary_key(&public).unwrap();
        let mut receiver = RsaCrypter::new();
        receiver.set_primary_key(&private).unwrap();

        let ciphertext = sender.encrypt(b"hello").unwrap();
        assert_eq!(receiver.decrypt(&ciphertext).unwrap(), b"hello");
        assert_eq!(source.decrypt(&ciphertext).unwrap(), b"hello");
    }

    #[test]
    fn private_key_alone_cannot_encrypt() {
        let mut crypter = RsaCrypter::new();
        crypter.generate_primary_key(1024, KeyInstall::Install).unwrap();

        let result = crypter.encrypt(b"data");
        assert_eq!(result, Err(CryptoError::KeyNotSet { algorithm: "RSA", role: "public key" }));
        assert_eq!(crypter.last_error(), "RSA public key was not set");
    }

    #[test]
    fn oversized_plaintext_is_engine_failure() {
        let (mut crypter, _) = keyed();
        let result = crypter.encrypt(&[0u8; 63]);

        assert!(matches!(result, Err(CryptoError::EngineFailure(_))));
    }

    #[test]
    fn garbage_keys_are_rejected() {
        let mut crypter = RsaCrypter::new();

        let private = crypter.set_primary_key(b"not a key");
        assert!(matches!(private, Err(CryptoError::InvalidKeyFormat { role: "private key", .. })));

        let public = crypter.set_secondary_key(b"not a key");
        assert!(matches!(public, Err(CryptoError::InvalidKeyFormat { role: "public key", .. })));

        let derived = crypter.derive_secondary_key(b"", KeyInstall::Install);
        assert!(matches!(derived, Err(CryptoError::InvalidKeyFormat { .. })));
        assert!(!crypter.has_primary_key());
        assert!(!crypter.has_secondary_key());
    }

    #[test]
    fn generation_rejects_out_of_range_sizes() {
        let mut crypter = RsaCrypter::new();
        let result = crypter.generate_primary_key(512, KeyInstall::Install);

        assert_eq!(
            result,
            Err(CryptoError::InvalidKeyLength { algorithm: "RSA", role: "private key", length: 512 })
        );
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let (mut crypter, _) = keyed();
        let mut ciphertext = crypter.encrypt(b"data").unwrap();
        ciphertext[10] ^= 0xFF;

        assert!(matches!(crypter.decrypt(&ciphertext), Err(CryptoError::EngineFailure(_))));
    }

    #[test]
    fn sizes_are_zero_without_keys() {
        let crypter = RsaCrypter::new();
        assert_eq!(crypter.fixed_ciphertext_length(), 0);
        assert_eq!(crypter.ciphertext_length(0), 0);
        assert_eq!(crypter.max_plaintext_length(0), 0);
        assert_eq!(crypter.valid_primary_key_length(100), 1024);
        assert_eq!(crypter.valid_primary_key_length(2048), 2048);
    }
}
