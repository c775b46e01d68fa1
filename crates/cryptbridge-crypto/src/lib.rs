//! Cryptbridge Cryptographic Objects
//!
//! Stateful crypter, digest and HMAC objects over RustCrypto engines. Each
//! object owns its engine state outright and reports failures as
//! [`CryptoError`] values, never as panics, so a host binding can forward
//! every outcome as an ordinary return value.
//!
//! # Crypters
//!
//! One [`Crypter`] contract covers three key models:
//!
//! ```text
//! Symmetric     primary = secret      secondary = IV          (generated)
//! RSA           primary = private key secondary = public key  (derived)
//! Elliptic      primary = private key secondary = public key  (derived)
//! ```
//!
//! Encryption and decryption refuse to run until the keys they need are
//! installed. Generated keys are installed by default; pass
//! [`KeyInstall::Detached`] to only receive the bytes.
//!
//! # Digests
//!
//! [`Hasher`] and [`Hmac`] share the [`Digester`] capability. [`Hmac`] adds
//! [`Keyed`]. A fresh HMAC always carries a random key, so it is usable (and
//! unforgeable) before the caller installs one.
//!
//! # Security
//!
//! - All key, IV and nonce material comes from the OS generator
//! - AES keys are zeroized on drop. Generated HMAC keys are wiped
//!   once installed, but the keyed engine state is not
//! - MAC verification compares in constant time

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod crypter;
pub mod error;
pub mod hash;
pub mod random;

pub use crypter::{AesCrypter, Crypter, CrypterFamily, Curve, EcCrypter, KeyInstall, RsaCrypter};
pub use error::{CryptoError, LastError};
pub use hash::{
    DEFAULT_HMAC_KEY_LENGTH, Digester, HashAlgorithm, Hasher, Hmac, Keyed, MAX_HMAC_KEY_LENGTH,
};
pub use random::{fill_random, random_bytes};
