//! Integrated encryption over NIST P-256 and P-384.
//!
//! ```text
//! ephemeral key ──ECDH(recipient public)──▶ shared secret
//!        │                                       │
//!        └── point (salt) ──▶ HKDF-SHA256 ◀──────┘
//!                                 │
//!                       32-byte key ‖ 24-byte nonce
//!                                 │
//!                       XChaCha20-Poly1305 seal
//! ```
//!
//! Wire layout: `uncompressed ephemeral point ‖ ciphertext ‖ 16-byte tag`.
//! Every encryption uses a fresh ephemeral key, so the derived nonce is
//! never reused under the same key.

use chacha20poly1305::{
    Key, XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit},
};
use hkdf::Hkdf;
use p256::elliptic_curve::sec1::ToEncodedPoint;
use rand::rngs::OsRng;
use sha2::Sha256;
use zeroize::Zeroizing;

use super::{Crypter, CrypterFamily, KeyInstall};
use crate::error::{CryptoError, LastError};

const ALGORITHM: &str = "ECIES";

const HKDF_INFO: &[u8] = b"cryptbridge ECIES v1";

const AEAD_KEY_SIZE: usize = 32;
const AEAD_NONCE_SIZE: usize = 24;
const AEAD_TAG_SIZE: usize = 16;

/// Supported curves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Curve {
    /// NIST P-256 (secp256r1)
    P256,
    /// NIST P-384 (secp384r1)
    P384,
}

impl Curve {
    /// Curve for a key strength in bits.
    pub fn from_bits(bits: usize) -> Option<Self> {
        match bits {
            256 => Some(Self::P256),
            384 => Some(Self::P384),
            _ => None,
        }
    }

    /// Key strength in bits.
    pub fn bits(self) -> usize {
        match self {
            Self::P256 => 256,
            Self::P384 => 384,
        }
    }

    /// Size of an uncompressed SEC1 point.
    pub fn point_len(self) -> usize {
        1 + 2 * self.bits() / 8
    }
}

#[derive(Debug)]
enum EcSecret {
    P256(p256::SecretKey),
    P384(p384::SecretKey),
}

#[derive(Debug)]
enum EcPublic {
    P256(p256::PublicKey),
    P384(p384::PublicKey),
}

fn engine_failure(e: impl std::fmt::Display) -> CryptoError {
    CryptoError::EngineFailure(e.to_string())
}

fn format_error(role: &'static str, reason: String) -> CryptoError {
    CryptoError::InvalidKeyFormat { algorithm: ALGORITHM, role, reason }
}

impl EcSecret {
    fn generate(curve: Curve) -> Self {
        match curve {
            Curve::P256 => Self::P256(p256::SecretKey::random(&mut OsRng)),
            Curve::P384 => Self::P384(p384::SecretKey::random(&mut OsRng)),
        }
    }

    /// Parse PKCS#8 DER, detecting the curve from the algorithm parameters.
    fn from_der(der: &[u8]) -> Result<Self, CryptoError> {
        use p256::pkcs8::DecodePrivateKey;

        if let Ok(key) = p256::SecretKey::from_pkcs8_der(der) {
            return Ok(Self::P256(key));
        }
        p384::SecretKey::from_pkcs8_der(der)
            .map(Self::P384)
            .map_err(|e| format_error("private key", e.to_string()))
    }

    fn to_der(&self) -> Result<Vec<u8>, CryptoError> {
        use p256::pkcs8::EncodePrivateKey;

        let der = match self {
            Self::P256(key) => key.to_pkcs8_der(),
            Self::P384(key) => key.to_pkcs8_der(),
        };
        Ok(der.map_err(engine_failure)?.as_bytes().to_vec())
    }

    fn public_key(&self) -> EcPublic {
        match self {
            Self::P256(key) => EcPublic::P256(key.public_key()),
            Self::P384(key) => EcPublic::P384(key.public_key()),
        }
    }

    fn curve(&self) -> Curve {
        match self {
            Self::P256(_) => Curve::P256,
            Self::P384(_) => Curve::P384,
        }
    }

    /// ECDH with the peer point encoded in SEC1 form.
    fn agree(&self, peer_point: &[u8]) -> Result<Zeroizing<Vec<u8>>, CryptoError> {
        let shared = match self {
            Self::P256(key) => {
                let peer = p256::PublicKey::from_sec1_bytes(peer_point).map_err(engine_failure)?;
                let shared = p256::ecdh::diffie_hellman(key.to_nonzero_scalar(), peer.as_affine());
                shared.raw_secret_bytes().to_vec()
            },
            Self::P384(key) => {
                let peer = p384::PublicKey::from_sec1_bytes(peer_point).map_err(engine_failure)?;
                let shared = p384::ecdh::diffie_hellman(key.to_nonzero_scalar(), peer.as_affine());
                shared.raw_secret_bytes().to_vec()
            },
        };
        Ok(Zeroizing::new(shared))
    }
}

impl EcPublic {
    /// Parse SPKI DER, detecting the curve from the algorithm parameters.
    fn from_der(der: &[u8]) -> Result<Self, CryptoError> {
        use p256::pkcs8::DecodePublicKey;

        if let Ok(key) = p256::PublicKey::from_public_key_der(der) {
            return Ok(Self::P256(key));
        }
        p384::PublicKey::from_public_key_der(der)
            .map(Self::P384)
            .map_err(|e| format_error("public key", e.to_string()))
    }

    fn to_der(&self) -> Result<Vec<u8>, CryptoError> {
        use p256::pkcs8::EncodePublicKey;

        let der = match self {
            Self::P256(key) => key.to_public_key_der(),
            Self::P384(key) => key.to_public_key_der(),
        };
        Ok(der.map_err(engine_failure)?.as_bytes().to_vec())
    }

    fn curve(&self) -> Curve {
        match self {
            Self::P256(_) => Curve::P256,
            Self::P384(_) => Curve::P384,
        }
    }

    /// Fresh ephemeral agreement with this key.
    ///
    /// Returns the uncompressed ephemeral point and the shared secret.
    fn ephemeral_agree(&self) -> (Vec<u8>, Zeroizing<Vec<u8>>) {
        match self {
            Self::P256(recipient) => {
                let ephemeral = p256::ecdh::EphemeralSecret::random(&mut OsRng);
                let point = ephemeral.public_key().to_encoded_point(false).as_bytes().to_vec();
                let shared = ephemeral.diffie_hellman(recipient);
                (point, Zeroizing::new(shared.raw_secret_bytes().to_vec()))
            },
            Self::P384(recipient) => {
                let ephemeral = p384::ecdh::EphemeralSecret::random(&mut OsRng);
                let point = ephemeral.public_key().to_encoded_point(false).as_bytes().to_vec();
                let shared = ephemeral.diffie_hellman(recipient);
                (point, Zeroizing::new(shared.raw_secret_bytes().to_vec()))
            },
        }
    }
}

/// AEAD cipher and nonce bound to one ephemeral point.
fn derive_cipher(shared: &[u8], point: &[u8]) -> (XChaCha20Poly1305, [u8; AEAD_NONCE_SIZE]) {
    let hk = Hkdf::<Sha256>::new(Some(point), shared);
    let mut okm = Zeroizing::new([0u8; AEAD_KEY_SIZE + AEAD_NONCE_SIZE]);

    let Ok(()) = hk.expand(HKDF_INFO, okm.as_mut_slice()) else {
        unreachable!("HKDF-SHA256 can output up to 8160 bytes, 56 requested");
    };

    let cipher = XChaCha20Poly1305::new(Key::from_slice(&okm[..AEAD_KEY_SIZE]));
    let mut nonce = [0u8; AEAD_NONCE_SIZE];
    nonce.copy_from_slice(&okm[AEAD_KEY_SIZE..]);
    (cipher, nonce)
}

/// ECIES crypter over P-256 or P-384.
#[derive(Debug, Default)]
pub struct EcCrypter {
    secret: Option<EcSecret>,
    public: Option<EcPublic>,
    last_error: LastError,
}

impl EcCrypter {
    /// Create a crypter with no keys installed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Curve of the installed keys, public first. `None` when unkeyed.
    pub fn curve(&self) -> Option<Curve> {
        match (&self.public, &self.secret) {
            (Some(public), _) => Some(public.curve()),
            (None, Some(secret)) => Some(secret.curve()),
            (None, None) => None,
        }
    }

    fn point_len(&self) -> usize {
        self.curve().map_or(0, Curve::point_len)
    }

    fn generate_secret(
        &mut self,
        bits: usize,
        install: KeyInstall,
    ) -> Result<Vec<u8>, CryptoError> {
        let Some(curve) = Curve::from_bits(bits) else {
            return Err(CryptoError::InvalidKeyLength {
                algorithm: ALGORITHM,
                role: "private key",
                length: bits,
            });
        };
        let secret = EcSecret::generate(curve);
        let der = secret.to_der()?;
        if install == KeyInstall::Install {
            self.secret = Some(secret);
        }
        tracing::debug!(?curve, ?install, "generated EC private key");
        Ok(der)
    }

    fn derive_public(
        &mut self,
        secret_der: &[u8],
        install: KeyInstall,
    ) -> Result<Vec<u8>, CryptoError> {
        let public = EcSecret::from_der(secret_der)?.public_key();
        let der = public.to_der()?;
        if install == KeyInstall::Install {
            self.public = Some(public);
        }
        Ok(der)
    }

    fn seal(&self, plaintext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let Some(public) = &self.public else {
            return Err(CryptoError::KeyNotSet { algorithm: ALGORITHM, role: "public key" });
        };
        let (point, shared) = public.ephemeral_agree();
        let (cipher, nonce) = derive_cipher(&shared, &point);

        let sealed =
            cipher.encrypt(XNonce::from_slice(&nonce), plaintext).map_err(engine_failure)?;

        let mut out = point;
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn open(&self, ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
        let Some(secret) = &self.secret else {
            return Err(CryptoError::KeyNotSet { algorithm: ALGORITHM, role: "private key" });
        };
        let point_len = secret.curve().point_len();
        if ciphertext.len() < point_len + AEAD_TAG_SIZE {
            return Err(CryptoError::EngineFailure(format!(
                "ciphertext too short: {} bytes, need at least {}",
                ciphertext.len(),
                point_len + AEAD_TAG_SIZE
            )));
        }

        let (point, sealed) = ciphertext.split_at(point_len);
        let shared = secret.agree(point)?;
        let (cipher, nonce) = derive_cipher(&shared, point);

        cipher
            .decrypt(XNonce::from_slice(&nonce), sealed)
            .map_err(|_| CryptoError::EngineFailure("authentication failed".to_string()))
    }
}

impl Crypter for EcCrypter {
    fn family(&self) -> CrypterFamily {
        CrypterFamily::EllipticCurve
    }

    fn algorithm_name(&self) -> String {
        "ECIES/HKDF-SHA256/XChaCha20-Poly1305".to_string()
    }

    fn max_plaintext_length(&self, ciphertext_len: usize) -> usize {
        match self.point_len() {
            0 => 0,
            point_len => ciphertext_len.saturating_sub(point_len + AEAD_TAG_SIZE),
        }
    }

    fn ciphertext_length(&self, plaintext_len: usize) -> usize {
        match self.point_len() {
            0 => 0,
            point_len => point_len.saturating_add(plaintext_len).saturating_add(AEAD_TAG_SIZE),
        }
    }

    fn fixed_max_plaintext_length(&self) -> usize {
        0
    }

    fn fixed_ciphertext_length(&self) -> usize {
        0
    }

    fn valid_primary_key_length(&self, bits: usize) -> usize {
        if bits <= Curve::P256.bits() { Curve::P256.bits() } else { Curve::P384.bits() }
    }

    fn valid_secondary_key_length(&self, bits: usize) -> usize {
        self.valid_primary_key_length(bits)
    }

    fn generate_primary_key(
        &mut self,
        bits: usize,
        install: KeyInstall,
    ) -> Result<Vec<u8>, CryptoError> {
        let result = self.generate_secret(bits, install);
        self.last_error.capture(result)
    }

    fn set_primary_key(&mut self, key: &[u8]) -> Result<(), CryptoError> {
        let result = EcSecret::from_der(key).map(|key| self.secret = Some(key));
        self.last_error.capture(result)
    }

    fn generate_secondary_key(
        &mut self,
        _bits: usize,
        _install: KeyInstall,
    ) -> Result<Vec<u8>, CryptoError> {
        self.last_error.capture(Err(CryptoError::UnsupportedOperation(
            "EC private key is required to generate a public key",
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
        let result = EcPublic::from_der(key).map(|key| self.public = Some(key));
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
        self.secret.is_some()
    }

    fn has_secondary_key(&self) -> bool {
        self.public.is_some()
    }

    fn last_error(&self) -> &str {
        self.last_error.message()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keyed(bits: usize) -> (EcCrypter, Vec<u8>) {
        let mut crypter = EcCrypter::new();
        let private = crypter.generate_primary_key(bits, KeyInstall::Install).unwrap();
        crypter.derive_secondary_key(&private, KeyInstall::Install).unwrap();
        (crypter, private)
    }

    #[test]
    fn roundtrip_both_curves() {
        for (bits, point_len) in [(256, 65), (384, 97)] {
            let (mut crypter, _) = keyed(bits);
            let plaintext = b"elliptic\0payload";

            let ciphertext = crypter.encrypt(plaintext).unwrap();
            assert_eq!(ciphertext.len(), point_len + plaintext.len() + AEAD_TAG_SIZE);
            assert_eq!(ciphertext.len(), crypter.ciphertext_length(plaintext.len()));
            assert_eq!(crypter.max_plaintext_length(ciphertext.len()), plaintext.len());
            assert_eq!(crypter.decrypt(&ciphertext).unwrap(), plaintext);
        }
    }

    #[test]
    fn sizes_saturate_for_huge_lengths() {
        let (crypter, _) = keyed(256);

        assert_eq!(crypter.ciphertext_length(usize::MAX), usize::MAX);
        assert_eq!(crypter.ciphertext_length(usize::MAX - 82), usize::MAX - 1);
        assert_eq!(crypter.max_plaintext_length(usize::MAX), usize::MAX - 65 - AEAD_TAG_SIZE);
        assert_eq!(EcCrypter::new().ciphertext_length(usize::MAX), 0);
    }

    #[test]
    fn empty_plaintext_roundtrips() {
        let (mut crypter, _) = keyed(256);
        let ciphertext = crypter.encrypt(b"").unwrap();

        assert!(crypter.decrypt(&ciphertext).unwrap().is_empty());
    }

    #[test]
    fn ephemeral_keys_differ_per_message() {
        let (mut crypter, _) = keyed(256);
        let first = crypter.encrypt(b"same").unwrap();
        let second = crypter.encrypt(b"same").unwrap();

        assert_ne!(first[..65], second[..65]);
    }

    #[test]
    fn keys_roundtrip_through_set() {
        let (_, private) = keyed(384);
        let mut deriver = EcCrypter::new();
        let public = deriver.derive_secondary_key(&private, KeyInstall::Detached).unwrap();
        assert!(!deriver.has_secondary_key());

        let mut sender = EcCrypter::new();
        sender.set_secondary_key(&public).unwrap();
        assert_eq!(sender.curve(), Some(Curve::P384));

        let mut receiver = EcCrypter::new();
        receiver.set_primary_key(&private).unwrap();

        let ciphertext = sender.encrypt(b"across objects").unwrap();
        assert_eq!(receiver.decrypt(&ciphertext).unwrap(), b"across objects");
    }

    #[test]
    fn tampered_tag_fails() {
        let (mut crypter, _) = keyed(256);
        let mut ciphertext = crypter.encrypt(b"data").unwrap();
        let last = ciphertext.len() - 1;
        ciphertext[last] ^= 0x01;

        let result = crypter.decrypt(&ciphertext);
        assert_eq!(result, Err(CryptoError::EngineFailure("authentication failed".to_string())));
    }

    #[test]
    fn short_ciphertext_fails() {
        let (mut crypter, _) = keyed(256);
        let result = crypter.decrypt(&[0u8; 80]);

        assert!(matches!(result, Err(CryptoError::EngineFailure(_))));
        assert!(crypter.last_error().contains("too short"));
    }

    #[test]
    fn unsupported_strength_is_rejected() {
        let mut crypter = EcCrypter::new();
        let result = crypter.generate_primary_key(521, KeyInstall::Install);

        assert!(matches!(result, Err(CryptoError::InvalidKeyLength { length: 521, .. })));
        assert!(!crypter.has_primary_key());
    }

    #[test]
    fn garbage_keys_are_rejected() {
        let mut crypter = EcCrypter::new();
        assert!(matches!(
            crypter.set_primary_key(b"junk"),
            Err(CryptoError::InvalidKeyFormat { role: "private key", .. })
        ));
        assert!(matches!(
            crypter.set_secondary_key(b"junk"),
            Err(CryptoError::InvalidKeyFormat { role: "public key", .. })
        ));
    }

    #[test]
    fn valid_lengths_snap_to_curves() {
        let crypter = EcCrypter::new();
        assert_eq!(crypter.valid_primary_key_length(0), 256);
        assert_eq!(crypter.valid_primary_key_length(256), 256);
        assert_eq!(crypter.valid_primary_key_length(300), 384);
        assert_eq!(crypter.valid_secondary_key_length(1000), 384);
        assert_eq!(crypter.ciphertext_length(10), 0);
    }
}
