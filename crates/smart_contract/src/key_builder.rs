//! Fluent construction of storage keys.

use neo_core::{UInt160, UInt256};
use neo_cryptography::ecc::ECPoint;
use neo_persistence::StorageKey;

/// Builds storage keys for a contract id, piece by piece.
pub struct KeyBuilder {
    id: i32,
    key: Vec<u8>,
}

impl KeyBuilder {
    /// Starts a key with a contract id and prefix byte.
    pub fn new(id: i32, prefix: u8) -> Self {
        Self {
            id,
            key: vec![prefix],
        }
    }

    /// Appends raw bytes.
    pub fn add(mut self, data: &[u8]) -> Self {
        self.key.extend_from_slice(data);
        self
    }

    /// Appends a script hash.
    pub fn add_hash(self, hash: &UInt160) -> Self {
        let bytes = *hash.as_bytes();
        self.add(&bytes)
    }

    /// Appends a 256-bit hash.
    pub fn add_hash256(self, hash: &UInt256) -> Self {
        let bytes = *hash.as_bytes();
        self.add(&bytes)
    }

    /// Appends a compressed public key.
    pub fn add_key(self, key: &ECPoint) -> Self {
        let bytes = *key.encoded();
        self.add(&bytes)
    }

    /// Appends a big-endian u32, preserving numeric order in iteration.
    pub fn add_u32(self, value: u32) -> Self {
        self.add(&value.to_be_bytes())
    }

    /// Finishes the key.
    pub fn build(self) -> StorageKey {
        StorageKey::new(self.id, self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builds_prefix_and_parts() {
        let key = KeyBuilder::new(-5, 0x14)
            .add_hash(&UInt160::from([7u8; 20]))
            .build();
        assert_eq!(key.id, -5);
        assert_eq!(key.key.len(), 21);
        assert_eq!(key.key[0], 0x14);
    }

    #[test]
    fn test_u32_is_big_endian() {
        let key = KeyBuilder::new(1, 9).add_u32(0x0102_0304).build();
        assert_eq!(&key.key[1..], &[1, 2, 3, 4]);
    }
}
