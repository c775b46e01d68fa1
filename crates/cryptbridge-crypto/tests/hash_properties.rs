//! Property-based tests for digest and HMAC objects
//!
//! The one-shot digest must agree with the incremental path for every
//! algorithm and input, and HMAC verification must accept exactly the MAC
//! it produced.

use cryptbridge_crypto::{Digester, HashAlgorithm, Hasher, Hmac, Keyed};
use proptest::prelude::*;

fn any_algorithm() -> impl Strategy<Value = HashAlgorithm> {
    prop::sample::select(HashAlgorithm::ALL.to_vec())
}

fn keyed_algorithm() -> impl Strategy<Value = HashAlgorithm> {
    prop::sample::select(
        HashAlgorithm::ALL.into_iter().filter(|alg| alg.supports_hmac()).collect::<Vec<_>>(),
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_calculate_digest_matches_incremental(
        algorithm in any_algorithm(),
        pending in prop::collection::vec(any::<u8>(), 0..64),
        message in prop::collection::vec(any::<u8>(), 0..512),
    ) {
        let mut hasher = Hasher::new(algorithm);
        hasher.update(&pending);
        let one_shot = hasher.calculate_digest(&message);

        hasher.restart();
        hasher.update(&message);
        let incremental = hasher.finalize();

        prop_assert_eq!(one_shot.len(), hasher.digest_size());
        prop_assert_eq!(one_shot, incremental);
    }

    #[test]
    fn prop_split_updates_match_single_update(
        algorithm in any_algorithm(),
        message in prop::collection::vec(any::<u8>(), 0..512),
        split in any::<prop::sample::Index>(),
    ) {
        let at = split.index(message.len() + 1);
        let mut split_hasher = Hasher::new(algorithm);
        split_hasher.update(&message[..at]);
        split_hasher.update(&message[at..]);

        let mut whole = Hasher::new(algorithm);
        prop_assert_eq!(split_hasher.finalize(), whole.calculate_digest(&message));
    }

    #[test]
    fn prop_hmac_verifies_own_mac(
        algorithm in keyed_algorithm(),
        key in prop::collection::vec(any::<u8>(), 0..200),
        message in prop::collection::vec(any::<u8>(), 0..256),
    ) {
        let mut hmac = Hmac::new(algorithm, &key).unwrap();
        let mut mac = hmac.calculate_digest(&message);

        prop_assert_eq!(hmac.verify(&message, &mac), Ok(true));

        let last = mac.len() - 1;
        mac[last] ^= 0x80;
        prop_assert_eq!(hmac.verify(&message, &mac), Ok(false));
    }

    #[test]
    fn prop_hmac_rejects_wrong_length(
        algorithm in keyed_algorithm(),
        len in 0usize..128,
    ) {
        let hmac = Hmac::new(algorithm, b"key").unwrap();
        prop_assume!(len != hmac.digest_size());

        prop_assert!(hmac.verify(b"data", &vec![0u8; len]).is_err());
    }
}
