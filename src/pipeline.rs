//! Upload completion pipeline.
//!
//! Runs after a client has uploaded an original through a pre-signed URL:
//!
//! ```text
//! validate ─▶ get original ─▶ WebP + thumbnail ─▶ ┌ put image     ┐ ─▶ append to index
//!                                                 ├ put thumbnail ┤
//!                                                 └ delete orig.  ┘
//! ```
//!
//! The three storage writes are independent and run concurrently; all three
//! are awaited, and any failure fails the run. The index is written last,
//! so a failed run never leaves a partial record. Nothing is retried or
//! rolled back: a failure after some writes succeeded can leave orphaned
//! objects behind, and once the original is deleted a repeat call fails at
//! the fetch step.

use std::sync::Arc;

use anyhow::anyhow;
use chrono::{SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::config::ProcessingConfig;
use crate::error::FolioError;
use crate::imaging::{self, ImageSettings, WEBP_CONTENT_TYPE, WEBP_EXTENSION};
use crate::index::IndexStore;
use crate::models::{Category, ContentRecord, ProcessingStats};
use crate::store::ObjectStore;

/// Body of `POST /api/{category}/process`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompleteUploadRequest {
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub link: Option<String>,
}

/// Result of a successful run.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedUpload {
    pub record: ContentRecord,
    pub stats: ProcessingStats,
}

/// Keys of the derived objects for one upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DerivedKeys {
    pub image: String,
    pub thumbnail: String,
}

impl DerivedKeys {
    pub fn new(category: Category, id: &str) -> Self {
        Self {
            image: format!("{}{}.{}", category.public_prefix(), id, WEBP_EXTENSION),
            thumbnail: format!("{}{}.{}", category.thumbnail_prefix(), id, WEBP_EXTENSION),
        }
    }
}

/// A request that passed validation.
#[derive(Debug, Clone, PartialEq)]
struct ValidatedUpload {
    id: String,
    key: String,
    title: String,
    description: Option<String>,
    label: String,
    link: Option<String>,
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Identifier segment of a staging key: the file name without its extension.
pub fn identifier_from_key(category: Category, key: &str) -> Result<String, FolioError> {
    let prefix = category.staging_prefix();
    let file_name = key.strip_prefix(prefix.as_str()).ok_or_else(|| {
        FolioError::validation(format!("key must start with '{}'", prefix))
    })?;
    if key.contains("..") || file_name.contains('/') {
        return Err(FolioError::validation(format!("invalid key '{}'", key)));
    }

    let id = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name);
    let valid = !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
    if !valid {
        return Err(FolioError::validation(format!(
            "key '{}' has no usable identifier",
            key
        )));
    }
    Ok(id.to_string())
}

fn validate(category: Category, req: &CompleteUploadRequest) -> Result<ValidatedUpload, FolioError> {
    let title = req.title.trim();
    if title.is_empty() {
        return Err(FolioError::validation("title is required"));
    }
    let key = req.key.trim();
    if key.is_empty() {
        return Err(FolioError::validation("key is required"));
    }
    let id = identifier_from_key(category, key)?;

    Ok(ValidatedUpload {
        id,
        key: key.to_string(),
        title: title.to_string(),
        description: non_empty(&req.description),
        label: non_empty(&req.category).unwrap_or_else(|| category.default_label().to_string()),
        link: non_empty(&req.link),
    })
}

fn duplicate_record(category: Category, id: &str) -> FolioError {
    FolioError::Index(anyhow!(
        "record '{}' already exists in the {} index",
        id,
        category
    ))
}

/// Turns staged originals into published records.
pub struct UploadPipeline {
    objects: Arc<dyn ObjectStore>,
    index: Arc<dyn IndexStore>,
    settings: ImageSettings,
    max_upload_bytes: u64,
}

impl UploadPipeline {
    pub fn new(
        objects: Arc<dyn ObjectStore>,
        index: Arc<dyn IndexStore>,
        processing: &ProcessingConfig,
    ) -> Self {
        Self {
            objects,
            index,
            settings: ImageSettings::from(processing),
            max_upload_bytes: processing.max_upload_bytes,
        }
    }

    /// Process the staged object named in `req` and append its record to
    /// the `category` index.
    #[instrument(skip_all, fields(%category, key = %req.key))]
    pub async fn complete(
        &self,
        category: Category,
        req: &CompleteUploadRequest,
    ) -> Result<CompletedUpload, FolioError> {
        let upload = validate(category, req)?;

        // 1. Fetch the original.
        let original = self
            .objects
            .get_object(&upload.key)
            .await
            .map_err(FolioError::Storage)?;
        let original_bytes = original.len() as u64;
        if original_bytes > self.max_upload_bytes {
            return Err(FolioError::validation(format!(
                "upload is {} bytes; the limit is {}",
                original_bytes, self.max_upload_bytes
            )));
        }

        // 2. Transcode.
        let processed = imaging::process_image_blocking(original, self.settings)
            .await
            .map_err(FolioError::Imaging)?;
        let stats = ProcessingStats::new(
            original_bytes,
            processed.optimized.len() as u64,
            processed.thumbnail.len() as u64,
        );

        // Derived keys reuse the id, so a published id must not be overwritten.
        let existing = self.index.read(category).await.map_err(FolioError::Index)?;
        if existing.contains(&upload.id) {
            return Err(duplicate_record(category, &upload.id));
        }

        // 3-4. Write derivatives and drop the original, jointly.
        let keys = DerivedKeys::new(category, &upload.id);
        let (image_put, thumb_put, original_delete) = tokio::join!(
            self.objects
                .put_object(&keys.image, processed.optimized, WEBP_CONTENT_TYPE),
            self.objects
                .put_object(&keys.thumbnail, processed.thumbnail, WEBP_CONTENT_TYPE),
            self.objects.delete_object(&upload.key),
        );
        image_put
            .and(thumb_put)
            .and(original_delete)
            .map_err(FolioError::Storage)?;

        // 5. Append to the index.
        let record = ContentRecord {
            id: upload.id.clone(),
            url: self.objects.public_url(&keys.image),
            thumbnail_url: Some(self.objects.public_url(&keys.thumbnail)),
            title: upload.title,
            description: upload.description,
            category: upload.label,
            link: upload.link,
            width: Some(processed.width),
            height: Some(processed.height),
            created_at: Utc::now().to_rfc3339_opts(SecondsFormat::Secs, true),
        };

        let mut index = self.index.read(category).await.map_err(FolioError::Index)?;
        if index.contains(&record.id) {
            return Err(duplicate_record(category, &record.id));
        }
        index.push(record.clone());
        self.index
            .write(category, &index)
            .await
            .map_err(FolioError::Index)?;

        info!(
            id = %record.id,
            original_bytes = stats.original_bytes,
            optimized_bytes = stats.optimized_bytes,
            thumbnail_bytes = stats.thumbnail_bytes,
            reduction_percent = stats.reduction_percent,
            records = index.len(),
            "upload processed"
        );

        Ok(CompletedUpload { record, stats })
    }
}
