#![forbid(unsafe_code)]

use std::collections::BTreeMap;

use accord_kernel_contracts::media::{MimeType, StorageKey};
use sha2::{Digest, Sha256};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MediaStoreError {
    Unavailable { detail: String },
}

/// The object-store boundary. Blob removal must treat an already-absent
/// object as success so retention sweeps can re-run after a partial
/// failure without tripping on their own earlier progress.
pub trait MediaBlobStore {
    fn put(&mut self, bytes: &[u8], mime_type: &MimeType) -> Result<StorageKey, MediaStoreError>;
    fn signed_read_url(
        &self,
        key: &StorageKey,
        ttl_seconds: u32,
    ) -> Result<String, MediaStoreError>;
    fn delete(&mut self, key: &StorageKey) -> Result<(), MediaStoreError>;
    fn contains(&self, key: &StorageKey) -> bool;
}

/// Content-addressed in-memory blob store.
#[derive(Debug, Default)]
pub struct InMemoryMediaStore {
    blobs: BTreeMap<StorageKey, Vec<u8>>,
}

impl InMemoryMediaStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn blob_count(&self) -> usize {
        self.blobs.len()
    }
}

impl MediaBlobStore for InMemoryMediaStore {
    fn put(&mut self, bytes: &[u8], _mime_type: &MimeType) -> Result<StorageKey, MediaStoreError> {
        if bytes.is_empty() {
            return Err(MediaStoreError::Unavailable {
                detail: "refusing to store an empty blob".to_string(),
            });
        }
        let key = StorageKey::new(format!("media/{}", sha256_hex(bytes))).map_err(|_| {
            MediaStoreError::Unavailable {
                detail: "derived storage key was invalid".to_string(),
            }
        })?;
        self.blobs.insert(key.clone(), bytes.to_vec());
        Ok(key)
    }

    fn signed_read_url(
        &self,
        key: &StorageKey,
        ttl_seconds: u32,
    ) -> Result<String, MediaStoreError> {
        if !self.blobs.contains_key(key) {
            return Err(MediaStoreError::Unavailable {
                detail: format!("no blob at {}", key.as_str()),
            });
        }
        let sig = sha256_hex(format!("{}:{}", key.as_str(), ttl_seconds).as_bytes());
        Ok(format!(
            "memory://{}?ttl={}&sig={}",
            key.as_str(),
            ttl_seconds,
            &sig[..16]
        ))
    }

    fn delete(&mut self, key: &StorageKey) -> Result<(), MediaStoreError> {
        // Absent blob: already deleted, success.
        self.blobs.remove(key);
        Ok(())
    }

    fn contains(&self, key: &StorageKey) -> bool {
        self.blobs.contains_key(key)
    }
}

fn sha256_hex(bytes: &[u8]) -> String {
    let digest = Sha256::digest(bytes);
    let mut out = String::with_capacity(digest.len() * 2);
    for b in digest {
        out.push_str(&format!("{b:02x}"));
    }
    out
}
