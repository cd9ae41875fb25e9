//! Object storage abstraction.
//!
//! The [`ObjectStore`] trait is the only way the upload issuer and the
//! processing pipeline touch blob storage, so neither depends on a specific
//! provider. Two backends ship with the crate:
//!
//! | Backend | Use |
//! |---------|-----|
//! | [`s3::S3ObjectStore`] | S3 and S3-compatible services (MinIO, R2) via SigV4 |
//! | [`memory::InMemoryObjectStore`] | Tests and local experiments |
//!
//! Implementations must be `Send + Sync` to be shared across request handlers.

pub mod memory;
pub mod s3;

use anyhow::Result;
use async_trait::async_trait;

/// Returned (inside an `anyhow::Error`) when a key does not exist.
///
/// Callers can detect it with `err.downcast_ref::<ObjectNotFound>()`.
#[derive(Debug, thiserror::Error)]
#[error("object not found: {key}")]
pub struct ObjectNotFound {
    pub key: String,
}

/// Capability interface over a key/value blob store.
///
/// # Operations
///
/// | Method | Purpose |
/// |--------|---------|
/// | [`get_object`](ObjectStore::get_object) | Download an object's bytes |
/// | [`put_object`](ObjectStore::put_object) | Upload bytes under a key |
/// | [`delete_object`](ObjectStore::delete_object) | Remove a key |
/// | [`presign_put`](ObjectStore::presign_put) | Issue a time-limited direct-upload URL |
/// | [`public_url`](ObjectStore::public_url) | Public address of a key |
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Download the full object. A missing key yields [`ObjectNotFound`].
    async fn get_object(&self, key: &str) -> Result<Vec<u8>>;

    /// Upload `body` under `key`, replacing any existing object.
    async fn put_object(&self, key: &str, body: Vec<u8>, content_type: &str) -> Result<()>;

    /// Delete `key`. Deleting an absent key is not an error.
    async fn delete_object(&self, key: &str) -> Result<()>;

    /// Build a URL that lets a client `PUT` directly to `key` for
    /// `expires_in_secs` seconds. Writes nothing.
    fn presign_put(&self, key: &str, expires_in_secs: u64) -> Result<String>;

    /// Public (CDN or bucket website) URL for `key`.
    fn public_url(&self, key: &str) -> String;
}

/// Join a base URL and an object key with exactly one slash.
pub fn join_public_url(base: &str, key: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        key.trim_start_matches('/')
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_join_public_url() {
        assert_eq!(
            join_public_url("https://cdn.example.com/", "/gallery/a.webp"),
            "https://cdn.example.com/gallery/a.webp"
        );
        assert_eq!(
            join_public_url("https://cdn.example.com", "gallery/a.webp"),
            "https://cdn.example.com/gallery/a.webp"
        );
    }

    #[test]
    fn test_not_found_downcast() {
        let err: anyhow::Error = ObjectNotFound {
            key: "uploads/gallery/x.jpg".into(),
        }
        .into();
        assert!(err.downcast_ref::<ObjectNotFound>().is_some());
        assert!(err.to_string().contains("uploads/gallery/x.jpg"));
    }
}
