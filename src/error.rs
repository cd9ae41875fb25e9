//! Error taxonomy for the upload issuer and the processing pipeline.
//!
//! Plumbing code (storage backends, index stores, config) returns
//! `anyhow::Error`; the operations exposed over HTTP wrap those failures in
//! [`FolioError`] so the server can pick a status code without inspecting
//! message text.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum FolioError {
    /// Missing or invalid request fields. Raised before any side effect.
    #[error("{0}")]
    Validation(String),

    /// Object store get/put/delete/presign failure.
    #[error("storage error: {0:#}")]
    Storage(anyhow::Error),

    /// The uploaded bytes could not be decoded or encoded.
    #[error("image processing failed: {0:#}")]
    Imaging(anyhow::Error),

    /// Content index unreadable, malformed, or not writable.
    #[error("content index error: {0:#}")]
    Index(anyhow::Error),
}

impl FolioError {
    pub fn validation(message: impl Into<String>) -> Self {
        FolioError::Validation(message.into())
    }

    /// True for failures caused by the caller's input.
    pub fn is_client_error(&self) -> bool {
        matches!(self, FolioError::Validation(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_includes_source_chain() {
        let inner = anyhow::anyhow!("connection reset").context("S3 GetObject failed");
        let err = FolioError::Storage(inner);
        let msg = err.to_string();
        assert!(msg.starts_with("storage error: "));
        assert!(msg.contains("S3 GetObject failed"));
        assert!(msg.contains("connection reset"));
        assert!(!err.is_client_error());
        assert!(FolioError::validation("title is required").is_client_error());
    }
}
