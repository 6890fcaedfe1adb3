#![forbid(unsafe_code)]

use accord_kernel_contracts::media::{MimeType, StorageKey};
use accord_storage::media::{InMemoryMediaStore, MediaBlobStore, MediaStoreError};

fn mime() -> MimeType {
    MimeType::new("video/webm").unwrap()
}

#[test]
fn at_media_db_01_put_is_content_addressed() {
    let mut store = InMemoryMediaStore::new();
    let a = store.put(b"same bytes", &mime()).unwrap();
    let b = store.put(b"same bytes", &mime()).unwrap();
    assert_eq!(a, b);
    assert_eq!(store.blob_count(), 1);
}

#[test]
fn at_media_db_02_signed_url_embeds_key_and_ttl() {
    let mut store = InMemoryMediaStore::new();
    let key = store.put(b"payload", &mime()).unwrap();
    let url = store.signed_read_url(&key, 300).unwrap();
    assert!(url.contains(key.as_str()));
    assert!(url.contains("ttl=300"));
    assert!(url.contains("sig="));
}

#[test]
fn at_media_db_03_signed_url_for_missing_blob_is_unavailable() {
    let store = InMemoryMediaStore::new();
    let out = store.signed_read_url(&StorageKey::new("media/ghost").unwrap(), 60);
    assert!(matches!(out, Err(MediaStoreError::Unavailable { .. })));
}

#[test]
fn at_media_db_04_delete_tolerates_absent_blob() {
    let mut store = InMemoryMediaStore::new();
    let key = store.put(b"payload", &mime()).unwrap();
    store.delete(&key).unwrap();
    assert!(!store.contains(&key));
    // Second delete of the same key is still success.
    store.delete(&key).unwrap();
}

#[test]
fn at_media_db_05_empty_blob_is_refused() {
    let mut store = InMemoryMediaStore::new();
    assert!(matches!(
        store.put(b"", &mime()),
        Err(MediaStoreError::Unavailable { .. })
    ));
}
