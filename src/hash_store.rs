//! Perceptual hash values and the run-wide hostname -> hash store.

use anyhow::{bail, Context, Result};
use indexmap::IndexMap;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};

/// Fixed-length perceptual fingerprint of an image
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PerceptualHash(Vec<u8>);

impl PerceptualHash {
    pub fn from_bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn bit_len(&self) -> usize {
        self.0.len() * 8
    }

    pub fn to_hex(&self) -> String {
        hex::encode(&self.0)
    }

    pub fn from_hex(encoded: &str) -> Result<Self> {
        let bytes = hex::decode(encoded.trim())
            .with_context(|| format!("Invalid perceptual hash encoding: {}", encoded))?;
        if bytes.is_empty() {
            bail!("Perceptual hash cannot be empty");
        }
        Ok(Self(bytes))
    }

    /// Hamming distance to another hash of the same length
    pub fn distance(&self, other: &PerceptualHash) -> Result<u32> {
        hamming_distance(&self.0, &other.0)
    }
}

impl fmt::Display for PerceptualHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl Serialize for PerceptualHash {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PerceptualHash {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let encoded = String::deserialize(deserializer)?;
        PerceptualHash::from_hex(&encoded).map_err(serde::de::Error::custom)
    }
}

pub fn hamming_distance(hash1: &[u8], hash2: &[u8]) -> Result<u32> {
    if hash1.len() != hash2.len() {
        bail!("Hashes must be the same length ({} vs {} bytes)", hash1.len(), hash2.len());
    }
    let mut distance = 0u32;
    for (byte1, byte2) in hash1.iter().zip(hash2.iter()) {
        distance += (byte1 ^ byte2).count_ones();
    }

    Ok(distance)
}

/// Hostname -> hash mapping shared by all fetch tasks.
///
/// Writes are serialized by a single lock held only for the map insert.
/// Iteration order is first-insertion order; re-registering a hostname
/// overwrites the hash in place. Reads are only meaningful once every
/// writer has finished.
#[derive(Debug, Clone, Default)]
pub struct HashStore {
    inner: Arc<Mutex<IndexMap<String, PerceptualHash>>>,
}

impl HashStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn guard(&self) -> MutexGuard<'_, IndexMap<String, PerceptualHash>> {
        // A panicking writer cannot leave a half-inserted entry behind
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register (or overwrite) the hash for a hostname
    pub fn insert(&self, hostname: &str, hash: PerceptualHash) {
        self.guard().insert(hostname.to_string(), hash);
    }

    pub fn get(&self, hostname: &str) -> Option<PerceptualHash> {
        self.guard().get(hostname).cloned()
    }

    pub fn contains(&self, hostname: &str) -> bool {
        self.guard().contains_key(hostname)
    }

    pub fn len(&self) -> usize {
        self.guard().len()
    }

    pub fn is_empty(&self) -> bool {
        self.guard().is_empty()
    }

    /// Copy of the current contents in insertion order
    pub fn snapshot(&self) -> IndexMap<String, PerceptualHash> {
        self.guard().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hamming_distance() {
        let hash1 = vec![0b11110000, 0b10101010];
        let hash2 = vec![0b11110000, 0b10101010];
        assert_eq!(hamming_distance(&hash1, &hash2).unwrap(), 0);

        let hash3 = vec![0b11110000, 0b00000000];
        let hash4 = vec![0b00001111, 0b11111111];
        assert_eq!(hamming_distance(&hash3, &hash4).unwrap(), 16);
    }

    #[test]
    fn test_hamming_distance_length_mismatch() {
        assert!(hamming_distance(&[0u8; 8], &[0u8; 4]).is_err());
    }

    #[test]
    fn test_hex_encoding() {
        let hash = PerceptualHash::from_bytes(vec![0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(hash.to_hex(), "deadbeef");
        assert_eq!(PerceptualHash::from_hex("deadbeef").unwrap(), hash);
        assert_eq!(hash.bit_len(), 32);
        assert!(PerceptualHash::from_hex("not-hex").is_err());
        assert!(PerceptualHash::from_hex("").is_err());
    }

    #[test]
    fn test_store_overwrites_in_place() {
        let store = HashStore::new();
        store.insert("a.com", PerceptualHash::from_bytes(vec![1]));
        store.insert("b.com", PerceptualHash::from_bytes(vec![2]));
        store.insert("a.com", PerceptualHash::from_bytes(vec![3]));

        let snapshot = store.snapshot();
        assert_eq!(snapshot.len(), 2);
        let keys: Vec<&String> = snapshot.keys().collect();
        assert_eq!(keys, vec!["a.com", "b.com"]);
        assert_eq!(store.get("a.com").unwrap().as_bytes(), &[3]);
    }

    #[test]
    fn test_store_concurrent_writers() {
        let store = HashStore::new();
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let store = store.clone();
                std::thread::spawn(move || {
                    for j in 0..100u8 {
                        store.insert(&format!("host{}.com", i), PerceptualHash::from_bytes(vec![j; 8]));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.len(), 8);
        for i in 0..8 {
            assert_eq!(store.get(&format!("host{}.com", i)).unwrap().as_bytes(), &[99u8; 8]);
        }
    }
}
