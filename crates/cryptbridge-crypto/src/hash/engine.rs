//! Type-erased hash and HMAC engines.
//!
//! The RustCrypto digests are distinct generic types. Objects handed to the
//! host need a single concrete type per capability, so each digest is boxed
//! behind a small object-safe trait here.

use digest::{Digest, core_api::BlockSizeUser};
use hmac::{Mac, SimpleHmac};

use super::HashAlgorithm;
use crate::error::CryptoError;

/// Running state of an unkeyed hash transform.
pub(crate) trait HashEngine: Send {
    fn update(&mut self, data: &[u8]);

    /// Digest of the running state. The state is reset afterwards.
    fn finalize_reset(&mut self) -> Vec<u8>;

    fn reset(&mut self);

    fn output_size(&self) -> usize;

    fn block_size(&self) -> usize;
}

/// Running state of an HMAC.
pub(crate) trait MacEngine: Send {
    fn update(&mut self, data: &[u8]);

    /// MAC of the running state. The state is reset to "keyed, empty".
    fn finalize_reset(&mut self) -> Vec<u8>;

    fn reset(&mut self);

    /// Constant-time check of `tag` against the MAC of `data`, independent of
    /// the running state. `tag` must already have the right length.
    fn verify(&self, data: &[u8], tag: &[u8]) -> bool;

    fn output_size(&self) -> usize;

    fn block_size(&self) -> usize;
}

struct DigestEngine<D>(D);

impl<D> HashEngine for DigestEngine<D>
where
    D: Digest + BlockSizeUser + Send,
{
    fn update(&mut self, data: &[u8]) {
        Digest::update(&mut self.0, data);
    }

    fn finalize_reset(&mut self) -> Vec<u8> {
        std::mem::replace(&mut self.0, D::new()).finalize().to_vec()
    }

    fn reset(&mut self) {
        self.0 = D::new();
    }

    fn output_size(&self) -> usize {
        <D as Digest>::output_size()
    }

    fn block_size(&self) -> usize {
        <D as BlockSizeUser>::block_size()
    }
}

/// CRC-32 has no `Digest` implementation; output is the checksum in
/// little-endian byte order.
#[derive(Default)]
struct Crc32Engine(crc32fast::Hasher);

const CRC32_SIZE: usize = 4;

impl HashEngine for Crc32Engine {
    fn update(&mut self, data: &[u8]) {
        self.0.update(data);
    }

    fn finalize_reset(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.0).finalize().to_le_bytes().to_vec()
    }

    fn reset(&mut self) {
        self.0 = crc32fast::Hasher::new();
    }

    fn output_size(&self) -> usize {
        CRC32_SIZE
    }

    fn block_size(&self) -> usize {
        CRC32_SIZE
    }
}

struct HmacEngine<D: Digest + BlockSizeUser> {
    /// Keyed, nothing absorbed. Cloned to restart.
    keyed: SimpleHmac<D>,
    running: SimpleHmac<D>,
}

impl<D> HmacEngine<D>
where
    D: Digest + BlockSizeUser + Clone,
{
    fn new(key: &[u8]) -> Result<Self, CryptoError> {
        let keyed = <SimpleHmac<D> as Mac>::new_from_slice(key)
            .map_err(|e| CryptoError::EngineFailure(e.to_string()))?;
        Ok(Self { running: keyed.clone(), keyed })
    }
}

impl<D> MacEngine for HmacEngine<D>
where
    D: Digest + BlockSizeUser + Clone + Send,
{
    fn update(&mut self, data: &[u8]) {
        Mac::update(&mut self.running, data);
    }

    fn finalize_reset(&mut self) -> Vec<u8> {
        std::mem::replace(&mut self.running, self.keyed.clone()).finalize().into_bytes().to_vec()
    }

    fn reset(&mut self) {
        self.running = self.keyed.clone();
    }

    fn verify(&self, data: &[u8], tag: &[u8]) -> bool {
        let mut mac = self.keyed.clone();
        Mac::update(&mut mac, data);
        mac.verify_slice(tag).is_ok()
    }

    fn output_size(&self) -> usize {
        <D as Digest>::output_size()
    }

    fn block_size(&self) -> usize {
        <D as BlockSizeUser>::block_size()
    }
}

fn boxed_digest<D>() -> Box<dyn HashEngine>
where
    D: Digest + BlockSizeUser + Send + 'static,
{
    Box::new(DigestEngine(D::new()))
}

fn boxed_hmac<D>(key: &[u8]) -> Result<Box<dyn MacEngine>, CryptoError>
where
    D: Digest + BlockSizeUser + Clone + Send + 'static,
{
    Ok(Box::new(HmacEngine::<D>::new(key)?))
}

/// Fresh hash engine for `algorithm`.
pub(crate) fn hash_engine(algorithm: HashAlgorithm) -> Box<dyn HashEngine> {
    match algorithm {
        HashAlgorithm::Crc32 => Box::new(Crc32Engine::default()),
        HashAlgorithm::Sha1 => boxed_digest::<sha1::Sha1>(),
        HashAlgorithm::Sha224 => boxed_digest::<sha2::Sha224>(),
        HashAlgorithm::Sha256 => boxed_digest::<sha2::Sha256>(),
        HashAlgorithm::Sha384 => boxed_digest::<sha2::Sha384>(),
        HashAlgorithm::Sha512 => boxed_digest::<sha2::Sha512>(),
        HashAlgorithm::Tiger => boxed_digest::<tiger::Tiger>(),
        HashAlgorithm::Whirlpool => boxed_digest::<whirlpool::Whirlpool>(),
        HashAlgorithm::Md2 => boxed_digest::<md2::Md2>(),
        HashAlgorithm::Md4 => boxed_digest::<md4::Md4>(),
        HashAlgorithm::Md5 => boxed_digest::<md5::Md5>(),
        HashAlgorithm::Ripemd128 => boxed_digest::<ripemd::Ripemd128>(),
        HashAlgorithm::Ripemd160 => boxed_digest::<ripemd::Ripemd160>(),
        HashAlgorithm::Ripemd256 => boxed_digest::<ripemd::Ripemd256>(),
        HashAlgorithm::Ripemd320 => boxed_digest::<ripemd::Ripemd320>(),
    }
}

/// HMAC engine for `algorithm` keyed with `key`.
pub(crate) fn mac_engine(
    algorithm: HashAlgorithm,
    key: &[u8],
) -> Result<Box<dyn MacEngine>, CryptoError> {
    match algorithm {
        HashAlgorithm::Crc32 => {
            Err(CryptoError::UnsupportedOperation("CRC32 cannot be used as an HMAC hash"))
        },
        HashAlgorithm::Sha1 => boxed_hmac::<sha1::Sha1>(key),
        HashAlgorithm::Sha224 => boxed_hmac::<sha2::Sha224>(key),
        HashAlgorithm::Sha256 => boxed_hmac::<sha2::Sha256>(key),
        HashAlgorithm::Sha384 => boxed_hmac::<sha2::Sha384>(key),
        HashAlgorithm::Sha512 => boxed_hmac::<sha2::Sha512>(key),
        HashAlgorithm::Tiger => boxed_hmac::<tiger::Tiger>(key),
        HashAlgorithm::Whirlpool => boxed_hmac::<whirlpool::Whirlpool>(key),
        HashAlgorithm::Md2 => boxed_hmac::<md2::Md2>(key),
        HashAlgorithm::Md4 => boxed_hmac::<md4::Md4>(key),
        HashAlgorithm::Md5 => boxed_hmac::<md5::Md5>(key),
        HashAlgorithm::Ripemd128 => boxed_hmac::<ripemd::Ripemd128>(key),
        HashAlgorithm::Ripemd160 => boxed_hmac::<ripemd::Ripemd160>(key),
        HashAlgorithm::Ripemd256 => boxed_hmac::<ripemd::Ripemd256>(key),
        HashAlgorithm::Ripemd320 => boxed_hmac::<ripemd::Ripemd320>(key),
    }
}
