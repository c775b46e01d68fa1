//! Native objects owned by the arena.

use cryptbridge_crypto::{Crypter, Digester, Hasher, Hmac, Keyed};

use crate::handle::TypeTag;

/// One natively owned object.
pub enum NativeObject {
    /// Crypter of any family
    Crypter(Box<dyn Crypter>),
    /// Unkeyed digest
    Digest(Hasher),
    /// Keyed digest
    Hmac(Hmac),
}

impl NativeObject {
    /// Type tag handles to this object carry.
    pub fn tag(&self) -> TypeTag {
        match self {
            Self::Crypter(_) => TypeTag::Crypter,
            Self::Digest(_) => TypeTag::Digest,
            Self::Hmac(_) => TypeTag::Hmac,
        }
    }

    /// Crypter capability.
    pub fn crypter_mut(&mut self) -> Option<&mut dyn Crypter> {
        match self {
            Self::Crypter(crypter) => Some(crypter.as_mut()),
            _ => None,
        }
    }

    /// Digest capability, shared by digests and HMACs.
    pub fn digester_mut(&mut self) -> Option<&mut dyn Digester> {
        match self {
            Self::Digest(hasher) => Some(hasher),
            Self::Hmac(hmac) => Some(hmac),
            Self::Crypter(_) => None,
        }
    }

    /// Keying capability.
    pub fn keyed_mut(&mut self) -> Option<&mut dyn Keyed> {
        match self {
            Self::Hmac(hmac) => Some(hmac),
            _ => None,
        }
    }
}

impl std::fmt::Debug for NativeObject {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Crypter(crypter) => {
                f.debug_tuple("Crypter").field(&crypter.algorithm_name()).finish()
            },
            Self::Digest(hasher) => f.debug_tuple("Digest").field(hasher).finish(),
            Self::Hmac(hmac) => f.debug_tuple("Hmac").field(hmac).finish(),
        }
    }
}
