use linkgraph_types::Address;

/// Domain-separated BLAKE3 content hasher.
///
/// Each hasher is keyed with BLAKE3's `derive_key` mode over its context
/// string, so equal bytes hashed for different purposes never collide.
pub struct ContentHasher {
    context: &'static str,
}

impl ContentHasher {
    /// Hasher for record revisions. A revision's address is this hash of its
    /// canonical encoding.
    pub const REVISION: Self = Self {
        context: "linkgraph 2024 revision address v1",
    };
    /// Hasher for link index fingerprints.
    pub const INDEX: Self = Self {
        context: "linkgraph 2024 link index fingerprint v1",
    };

    /// Hash raw bytes under this hasher's context.
    pub fn hash(&self, data: &[u8]) -> Address {
        let mut hasher = blake3::Hasher::new_derive_key(self.context);
        hasher.update(data);
        Address::from_hash(*hasher.finalize().as_bytes())
    }

    /// Verify that data produces the expected address.
    pub fn verify(&self, data: &[u8], expected: &Address) -> bool {
        self.hash(data) == *expected
    }
}
