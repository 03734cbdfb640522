//! Tests for `src/store/credentials.rs` — persisted session material.

use straylight::store::{self, CredentialBlob, CredentialStore};

async fn setup_store() -> CredentialStore {
    let pool = store::open_in_memory()
        .await
        .expect("in-memory store should open");
    CredentialStore::new(pool)
}

fn blob(name: &str, content: &[u8]) -> CredentialBlob {
    CredentialBlob {
        name: name.to_owned(),
        content: content.to_vec(),
    }
}

#[tokio::test]
async fn save_then_load_all_round_trips() {
    let store = setup_store().await;

    store
        .save(&blob("creds.json", b"{\"noiseKey\":\"abc\"}"))
        .await
        .expect("save should succeed");
    store
        .save(&blob("app-state-sync-key-1.json", b"\x00\x01\x02"))
        .await
        .expect("save should succeed");

    let blobs = store.load_all().await.expect("load should succeed");
    assert_eq!(blobs.len(), 2);
    // Ordered by name for deterministic restore.
    assert_eq!(blobs[0].name, "app-state-sync-key-1.json");
    assert_eq!(blobs[0].content, b"\x00\x01\x02");
    assert_eq!(blobs[1].name, "creds.json");
}

#[tokio::test]
async fn save_overwrites_existing_blob() {
    let store = setup_store().await;

    store
        .save(&blob("creds.json", b"old"))
        .await
        .expect("save should succeed");
    store
        .save(&blob("creds.json", b"new"))
        .await
        .expect("save should succeed");

    let blobs = store.load_all().await.expect("load should succeed");
    assert_eq!(blobs.len(), 1);
    assert_eq!(blobs[0].content, b"new");
}

#[tokio::test]
async fn load_all_on_empty_store_returns_nothing() {
    let store = setup_store().await;
    let blobs = store.load_all().await.expect("load should succeed");
    assert!(blobs.is_empty());
}

#[tokio::test]
async fn clear_removes_every_blob() {
    let store = setup_store().await;

    store
        .save(&blob("creds.json", b"a"))
        .await
        .expect("save should succeed");
    store
        .save(&blob("keys.json", b"b"))
        .await
        .expect("save should succeed");

    let deleted = store.clear().await.expect("clear should succeed");
    assert_eq!(deleted, 2);

    let blobs = store.load_all().await.expect("load should succeed");
    assert!(blobs.is_empty());
}
