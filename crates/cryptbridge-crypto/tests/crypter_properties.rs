//! Property-based tests for the crypter families
//!
//! Symmetric crypters are exercised over all key sizes and arbitrary
//! messages. Asymmetric key generation is slow, so RSA and EC keys are
//! generated once per test and the messages vary.

use cryptbridge_crypto::{AesCrypter, CryptoError, Crypter, CrypterFamily, KeyInstall};
use proptest::prelude::*;

fn aes_key_bits() -> impl Strategy<Value = usize> {
    prop_oneof![Just(128usize), Just(192usize), Just(256usize)]
}

/// Serialized (private, public) key pair, generated once.
fn key_pair(family: CrypterFamily, bits: usize) -> (Vec<u8>, Vec<u8>) {
    let mut crypter = family.instantiate();
    let private = crypter.generate_primary_key(bits, KeyInstall::Detached).unwrap();
    let public = crypter.derive_secondary_key(&private, KeyInstall::Detached).unwrap();
    (private, public)
}

fn load(family: CrypterFamily, (private, public): &(Vec<u8>, Vec<u8>)) -> Box<dyn Crypter> {
    let mut crypter = family.instantiate();
    crypter.set_primary_key(private).unwrap();
    crypter.set_secondary_key(public).unwrap();
    crypter
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_aes_roundtrip(
        bits in aes_key_bits(),
        message in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let mut encrypter = AesCrypter::new();
        let key = encrypter.generate_primary_key(bits, KeyInstall::Install).unwrap();
        let iv = encrypter.generate_secondary_key(128, KeyInstall::Install).unwrap();

        let ciphertext = encrypter.encrypt(&message).unwrap();
        prop_assert_eq!(ciphertext.len(), message.len());

        // A second crypter with the same key and IV must decrypt
        let mut decrypter = AesCrypter::new();
        decrypter.set_primary_key(&key).unwrap();
        decrypter.set_secondary_key(&iv).unwrap();
        prop_assert_eq!(decrypter.decrypt(&ciphertext).unwrap(), message);
    }

    #[test]
    fn prop_aes_buffer_sizes_fit_output(len in 0usize..4096) {
        let crypter = AesCrypter::new();
        let sized = crypter.ciphertext_length(len);

        prop_assert!(sized >= len);
        prop_assert_eq!(sized % 16, 0);
        prop_assert!(sized < len + 16);
    }

    #[test]
    fn prop_valid_key_lengths_are_idempotent(bits in 0usize..20_000) {
        for family in [CrypterFamily::Symmetric, CrypterFamily::Rsa, CrypterFamily::EllipticCurve] {
            let crypter = family.instantiate();

            let primary = crypter.valid_primary_key_length(bits);
            prop_assert_eq!(crypter.valid_primary_key_length(primary), primary);

            let secondary = crypter.valid_secondary_key_length(bits);
            prop_assert_eq!(crypter.valid_secondary_key_length(secondary), secondary);
        }
    }

    #[test]
    fn prop_unkeyed_operations_fail_with_key_not_set(
        message in prop::collection::vec(any::<u8>(), 0..64),
    ) {
        for family in [CrypterFamily::Symmetric, CrypterFamily::Rsa, CrypterFamily::EllipticCurve] {
            let mut crypter = family.instantiate();

            let is_key_not_set = matches!(crypter.encrypt(&message), Err(CryptoError::KeyNotSet { .. }));
            prop_assert!(is_key_not_set);
            let is_key_not_set = matches!(crypter.decrypt(&message), Err(CryptoError::KeyNotSet { .. }));
            prop_assert!(is_key_not_set);
        }
    }
}

#[test]
fn prop_rsa_roundtrip() {
    let keys = key_pair(CrypterFamily::Rsa, 1024);
    let max = load(CrypterFamily::Rsa, &keys).fixed_max_plaintext_length();

    let config = ProptestConfig::with_cases(16);
    proptest!(config, |(message in prop::collection::vec(any::<u8>(), 0..=max))| {
        let mut crypter = load(CrypterFamily::Rsa, &keys);
        let ciphertext = crypter.encrypt(&message).unwrap();
        prop_assert_eq!(ciphertext.len(), crypter.ciphertext_length(message.len()));
        prop_assert_eq!(crypter.decrypt(&ciphertext).unwrap(), message);
    });
}

#[test]
fn prop_ec_roundtrip() {
    let keys = key_pair(CrypterFamily::EllipticCurve, 256);

    let config = ProptestConfig::with_cases(32);
    proptest!(config, |(message in prop::collection::vec(any::<u8>(), 0..1024))| {
        let mut crypter = load(CrypterFamily::EllipticCurve, &keys);
        let ciphertext = crypter.encrypt(&message).unwrap();
        prop_assert_eq!(ciphertext.len(), crypter.ciphertext_length(message.len()));
        prop_assert_eq!(crypter.decrypt(&ciphertext).unwrap(), message);
    });
}
