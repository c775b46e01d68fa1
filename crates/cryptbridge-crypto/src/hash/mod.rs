//! Incremental hash and keyed-MAC objects.
//!
//! A [`Hasher`] wraps one hash transform. An [`Hmac`] has the same digest
//! capability plus a keying capability. The two capabilities are separate
//! traits ([`Digester`], [`Keyed`]) so the host can share one method table
//! for everything that digests and layer the keyed methods on top.
//!
//! ```text
//! Created ──Update*──▶ Final ──▶ (state reset) ──Update*──▶ Final ...
//! ```

mod engine;
mod hasher;
mod mac;

pub use hasher::Hasher;
pub use mac::{DEFAULT_HMAC_KEY_LENGTH, Hmac, MAX_HMAC_KEY_LENGTH};

use crate::error::CryptoError;

/// Hash transforms available to digest and HMAC objects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HashAlgorithm {
    /// CRC-32 (IEEE). Checksum only, cannot be keyed.
    Crc32,
    /// SHA-1
    Sha1,
    /// SHA-224
    Sha224,
    /// SHA-256
    Sha256,
    /// SHA-384
    Sha384,
    /// SHA-512
    Sha512,
    /// Tiger (192-bit)
    Tiger,
    /// Whirlpool
    Whirlpool,
    /// MD2
    Md2,
    /// MD4
    Md4,
    /// MD5
    Md5,
    /// RIPEMD-128
    Ripemd128,
    /// RIPEMD-160
    Ripemd160,
    /// RIPEMD-256
    Ripemd256,
    /// RIPEMD-320
    Ripemd320,
}

impl HashAlgorithm {
    /// Every supported algorithm, in registration order.
    pub const ALL: [Self; 15] = [
        Self::Crc32,
        Self::Sha1,
        Self::Sha224,
        Self::Sha256,
        Self::Sha384,
        Self::Sha512,
        Self::Tiger,
        Self::Whirlpool,
        Self::Md2,
        Self::Md4,
        Self::Md5,
        Self::Ripemd128,
        Self::Ripemd160,
        Self::Ripemd256,
        Self::Ripemd320,
    ];

    /// Identifier the host uses to select the algorithm (`"SHA256"`).
    pub fn id(self) -> &'static str {
        match self {
            Self::Crc32 => "CRC32",
            Self::Sha1 => "SHA1",
            Self::Sha224 => "SHA224",
            Self::Sha256 => "SHA256",
            Self::Sha384 => "SHA384",
            Self::Sha512 => "SHA512",
            Self::Tiger => "Tiger",
            Self::Whirlpool => "Whirlpool",
            Self::Md2 => "MD2",
            Self::Md4 => "MD4",
            Self::Md5 => "MD5",
            Self::Ripemd128 => "RIPEMD128",
            Self::Ripemd160 => "RIPEMD160",
            Self::Ripemd256 => "RIPEMD256",
            Self::Ripemd320 => "RIPEMD320",
        }
    }

    /// Human-readable algorithm name (`"SHA-256"`).
    pub fn name(self) -> &'static str {
        match self {
            Self::Crc32 => "CRC32",
            Self::Sha1 => "SHA-1",
            Self::Sha224 => "SHA-224",
            Self::Sha256 => "SHA-256",
            Self::Sha384 => "SHA-384",
            Self::Sha512 => "SHA-512",
            Self::Tiger => "Tiger",
            Self::Whirlpool => "Whirlpool",
            Self::Md2 => "MD2",
            Self::Md4 => "MD4",
            Self::Md5 => "MD5",
            Self::Ripemd128 => "RIPEMD-128",
            Self::Ripemd160 => "RIPEMD-160",
            Self::Ripemd256 => "RIPEMD-256",
            Self::Ripemd320 => "RIPEMD-320",
        }
    }

    /// Look up an algorithm by its host identifier.
    pub fn from_id(id: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|alg| alg.id() == id)
    }

    /// Whether the algorithm is still considered collision resistant.
    ///
    /// CRC32 is a checksum and makes no claim either way.
    pub fn is_secure(self) -> bool {
        !matches!(self, Self::Md2 | Self::Md4 | Self::Md5 | Self::Ripemd128 | Self::Ripemd256)
    }

    /// Whether the algorithm can back an HMAC.
    pub fn supports_hmac(self) -> bool {
        self != Self::Crc32
    }
}

/// Digest capability shared by hash and HMAC objects.
pub trait Digester {
    /// Algorithm driving this object.
    fn algorithm(&self) -> HashAlgorithm;

    /// Human-readable algorithm name.
    fn algorithm_name(&self) -> String;

    /// Size of the value returned by [`finalize`](Self::finalize), in bytes.
    fn digest_size(&self) -> usize;

    /// Internal block size of the transform, in bytes.
    fn block_size(&self) -> usize;

    /// Append `data` to the running state.
    fn update(&mut self, data: &[u8]);

    /// Emit the digest of everything passed to `update` since the last
    /// reset, then reset the running state.
    fn finalize(&mut self) -> Vec<u8>;

    /// Discard the running state.
    fn restart(&mut self);

    /// One-shot digest of `data`. Equivalent to `restart`, `update`,
    /// `finalize`, and leaves the object freshly reset.
    fn calculate_digest(&mut self, data: &[u8]) -> Vec<u8> {
        self.restart();
        self.update(data);
        self.finalize()
    }
}

/// Keying capability of HMAC objects.
pub trait Keyed: Digester {
    /// Replace the key. Discards the running state.
    fn set_key(&mut self, key: &[u8]) -> Result<(), CryptoError>;

    /// Shortest accepted key, in bytes.
    fn min_key_length(&self) -> usize;

    /// Longest accepted key, in bytes.
    fn max_key_length(&self) -> usize;

    /// Key length used for the key installed at creation, in bytes.
    fn default_key_length(&self) -> usize;

    /// Nearest accepted key length to `len`, in bytes.
    fn valid_key_length(&self, len: usize) -> usize;

    /// Check `mac` against the MAC of `data` under the current key.
    ///
    /// The comparison runs in constant time. The running state is untouched.
    ///
    /// # Errors
    ///
    /// - `InvalidMacLength` if `mac` is not exactly `digest_size()` bytes
    fn verify(&self, data: &[u8], mac: &[u8]) -> Result<bool, CryptoError>;
}
