//! Unkeyed digest object.

use super::{
    Digester, HashAlgorithm,
    engine::{HashEngine, hash_engine},
};

/// Stateful incremental hash over one [`HashAlgorithm`].
pub struct Hasher {
    algorithm: HashAlgorithm,
    engine: Box<dyn HashEngine>,
}

impl Hasher {
    /// Create a hasher with empty running state.
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm, engine: hash_engine(algorithm) }
    }
}

impl std::fmt::Debug for Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hasher").field("algorithm", &self.algorithm).finish_non_exhaustive()
    }
}

impl Digester for Hasher {
    fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    fn algorithm_name(&self) -> String {
        self.algorithm.name().to_string()
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

#[cfg(test)]
mod tests {
    use super::*;

    fn hex_digest(algorithm: HashAlgorithm, data: &[u8]) -> String {
        hex::encode(Hasher::new(algorithm).calculate_digest(data))
    }

    #[test]
    fn known_answers() {
        assert_eq!(
            hex_digest(HashAlgorithm::Sha1, b"abc"),
            "a9993e364706816aba3e25717850c26c9cd0d89d"
        );
        assert_eq!(
            hex_digest(HashAlgorithm::Sha256, b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
        assert_eq!(hex_digest(HashAlgorithm::Md5, b""), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(
            hex_digest(HashAlgorithm::Ripemd160, b"abc"),
            "8eb208f7e05d987a9b044a8e98c6b087f15a0bfc"
        );
    }

    #[test]
    fn incremental_matches_one_shot() {
        let mut hasher = Hasher::new(HashAlgorithm::Sha512);
        hasher.update(b"hello ");
        hasher.update(b"world");
        let incremental = hasher.finalize();

        assert_eq!(incremental, hasher.calculate_digest(b"hello world"));
    }

    #[test]
    fn embedded_zero_bytes_are_hashed() {
        let with_zero = hex_digest(HashAlgorithm::Sha256, b"a\0b");
        let without = hex_digest(HashAlgorithm::Sha256, b"ab");

        assert_ne!(with_zero, without);
    }

    #[test]
    fn restart_discards_pending_input() {
        let mut hasher = Hasher::new(HashAlgorithm::Sha256);
        hasher.update(b"garbage");
        hasher.restart();
        hasher.update(b"abc");

        assert_eq!(hasher.finalize(), Hasher::new(HashAlgorithm::Sha256).calculate_digest(b"abc"));
    }

    #[test]
    fn calculate_digest_ignores_pending_input() {
        let mut hasher = Hasher::new(HashAlgorithm::Tiger);
        hasher.update(b"pending");

        let one_shot = hasher.calculate_digest(b"data");
        assert_eq!(one_shot, Hasher::new(HashAlgorithm::Tiger).calculate_digest(b"data"));
    }

    #[test]
    fn digest_has_declared_size() {
        for alg in HashAlgorithm::ALL {
            let mut hasher = Hasher::new(alg);
            assert_eq!(hasher.calculate_digest(b"x").len(), hasher.digest_size(), "{alg:?}");
        }
    }
}
