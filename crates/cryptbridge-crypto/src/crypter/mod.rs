//! Uniform encryption contract over three key models.
//!
//! | Family          | Primary key        | Secondary key       |
//! |-----------------|--------------------|---------------------|
//! | Symmetric (AES) | shared secret      | IV / nonce          |
//! | RSA             | PKCS#8 private key | SPKI public key     |
//! | Elliptic curve  | PKCS#8 private key | SPKI public key     |
//!
//! The families disagree on how a secondary key comes to be. Symmetric
//! crypters draw a fresh random IV ([`Crypter::generate_secondary_key`]);
//! asymmetric crypters compute the public half of a private key
//! ([`Crypter::derive_secondary_key`]). Each family supports exactly one of
//! the two shapes and rejects the other with `UnsupportedOperation`.
//!
//! Key sizes passed to generation and validation functions are in bits.
//! Buffer sizes passed to the size-mapping functions are in bytes.
//!
//! Every failing call is also recorded in the crypter's last-error slot, so
//! callers that only see a boolean can still fetch a diagnostic.

mod ecies;
mod rsa_oaep;
mod symmetric;

pub use ecies::{Curve, EcCrypter};
pub use rsa_oaep::RsaCrypter;
pub use symmetric::AesCrypter;

use crate::error::CryptoError;

/// Algorithm family of a crypter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CrypterFamily {
    /// Shared secret plus IV
    Symmetric,
    /// RSA private/public pair
    Rsa,
    /// Elliptic-curve private/public pair
    EllipticCurve,
}

impl CrypterFamily {
    /// Fresh crypter of this family with no keys installed.
    pub fn instantiate(self) -> Box<dyn Crypter> {
        match self {
            Self::Symmetric => Box::new(AesCrypter::new()),
            Self::Rsa => Box::new(RsaCrypter::new()),
            Self::EllipticCurve => Box::new(EcCrypter::new()),
        }
    }
}

/// Whether generated key material is installed into the crypter.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum KeyInstall {
    /// Install the key, replacing any previous one
    #[default]
    Install,
    /// Only return the key; the crypter is left untouched
    Detached,
}

/// Encryption contract shared by all families.
pub trait Crypter: Send {
    /// Family this crypter belongs to.
    fn family(&self) -> CrypterFamily;

    /// Stable human-readable algorithm identifier.
    fn algorithm_name(&self) -> String;

    /// Output buffer size that suffices for decrypting `ciphertext_len` bytes.
    ///
    /// Block-rounded for AES, so it may exceed `ciphertext_len`. Public-key
    /// schemes return the plaintext bound of their framing.
    fn max_plaintext_length(&self, ciphertext_len: usize) -> usize;

    /// Output buffer size needed to encrypt `plaintext_len` bytes.
    fn ciphertext_length(&self, plaintext_len: usize) -> usize;

    /// Largest plaintext of a single fixed-size block, 0 if the scheme has none.
    fn fixed_max_plaintext_length(&self) -> usize;

    /// Size of a single fixed-size ciphertext block, 0 if the scheme has none.
    fn fixed_ciphertext_length(&self) -> usize;

    /// Nearest accepted primary key size to `bits`.
    fn valid_primary_key_length(&self, bits: usize) -> usize;

    /// Nearest accepted secondary key size to `bits`.
    fn valid_secondary_key_length(&self, bits: usize) -> usize;

    /// Generate primary key material of `bits` strength.
    ///
    /// # Errors
    ///
    /// - `InvalidKeyLength` if the family does not accept `bits`
    fn generate_primary_key(
        &mut self,
        bits: usize,
        install: KeyInstall,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Install caller-supplied primary key material.
    ///
    /// A rejected key leaves the previously installed key in place.
    fn set_primary_key(&mut self, key: &[u8]) -> Result<(), CryptoError>;

    /// Generate a fresh random secondary key of `bits` (symmetric only).
    fn generate_secondary_key(
        &mut self,
        bits: usize,
        install: KeyInstall,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Compute the secondary key belonging to `primary_key` (asymmetric only).
    fn derive_secondary_key(
        &mut self,
        primary_key: &[u8],
        install: KeyInstall,
    ) -> Result<Vec<u8>, CryptoError>;

    /// Install caller-supplied secondary key material.
    fn set_secondary_key(&mut self, key: &[u8]) -> Result<(), CryptoError>;

    /// Encrypt `plaintext`.
    ///
    /// # Errors
    ///
    /// - `KeyNotSet` if a key needed for encryption is missing
    /// - `EngineFailure` if the engine rejects the input
    fn encrypt(&mut self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Decrypt `ciphertext`.
    ///
    /// # Errors
    ///
    /// - `KeyNotSet` if a key needed for decryption is missing
    /// - `EngineFailure` if the engine rejects the input
    fn decrypt(&mut self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError>;

    /// Whether a primary key is installed.
    fn has_primary_key(&self) -> bool;

    /// Whether a secondary key is installed.
    fn has_secondary_key(&self) -> bool;

    /// Most recent failure description. Empty if nothing failed yet.
    fn last_error(&self) -> &str;
}
