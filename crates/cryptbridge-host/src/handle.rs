//! Type-tagged, generation-checked object handles.

/// Type identifier carried by every handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TypeTag {
    /// Symmetric, RSA or elliptic-curve crypter
    Crypter,
    /// Unkeyed digest
    Digest,
    /// Keyed digest
    Hmac,
}

impl TypeTag {
    /// Every tag, in registration order.
    pub const ALL: [Self; 3] = [Self::Crypter, Self::Digest, Self::Hmac];

    /// Host-visible type name.
    pub fn name(self) -> &'static str {
        match self {
            Self::Crypter => "crypter",
            Self::Digest => "hasher",
            Self::Hmac => "hmac",
        }
    }
}

/// Host-visible reference to one native object.
///
/// A handle names an arena slot and the generation the slot had when the
/// object was created. Once the slot is collected its generation moves on,
/// so stale handles are detected instead of aliasing a newer object.
/// Equality is identity: two handles are equal only if they name the same
/// object.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Handle {
    tag: TypeTag,
    slot: u32,
    generation: u32,
}

impl Handle {
    pub(crate) fn new(tag: TypeTag, slot: u32, generation: u32) -> Self {
        Self { tag, slot, generation }
    }

    /// Type of the referenced object.
    pub fn tag(self) -> TypeTag {
        self.tag
    }

    /// Arena slot index.
    pub fn slot(self) -> u32 {
        self.slot
    }

    /// Slot generation at creation time.
    pub fn generation(self) -> u32 {
        self.generation
    }

    /// Opaque identity for display, unique among live objects.
    pub fn address(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn names_are_host_facing() {
        let names: Vec<_> = TypeTag::ALL.into_iter().map(TypeTag::name).collect();
        assert_eq!(names, ["crypter", "hasher", "hmac"]);
    }

    #[test]
    fn generation_distinguishes_reused_slots() {
        let old = Handle::new(TypeTag::Digest, 3, 0);
        let new = Handle::new(TypeTag::Digest, 3, 1);

        assert_ne!(old, new);
        assert_ne!(old.address(), new.address());
    }
}
