//! Core data models: content categories, index records, and processing stats.
//!
//! These types flow between the upload issuer, the processing pipeline, the
//! index store, and the HTTP layer. Records serialize in camelCase because
//! the public site consumes the index documents directly.

use std::fmt;
use std::str::FromStr;

use anyhow::bail;
use serde::{Deserialize, Serialize};

/// A media category. Each has its own staging prefix, public prefix, and
/// index document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Gallery,
    Photos360,
    Videos,
    Tours,
}

const COMMON_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "heic"];
const PANORAMA_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp", "heic", "heif"];

impl Category {
    /// Every category, in the order the CLI and admin pages list them.
    pub const ALL: [Category; 4] = [
        Category::Gallery,
        Category::Photos360,
        Category::Videos,
        Category::Tours,
    ];

    /// Path segment used in routes, prefixes, and index file names.
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::Gallery => "gallery",
            Category::Photos360 => "photos360",
            Category::Videos => "videos",
            Category::Tours => "tours",
        }
    }

    /// Prefix under which originals land after a pre-signed upload.
    pub fn staging_prefix(&self) -> String {
        format!("uploads/{}/", self.as_str())
    }

    /// Prefix for the normalized public image.
    pub fn public_prefix(&self) -> String {
        format!("{}/", self.as_str())
    }

    /// Prefix for derived thumbnails.
    pub fn thumbnail_prefix(&self) -> String {
        format!("{}/thumbs/", self.as_str())
    }

    /// File name of the index document for this category.
    pub fn index_file_name(&self) -> String {
        format!("{}.json", self.as_str())
    }

    /// Upload extensions accepted for this category (lower-case, no dot).
    pub fn allowed_extensions(&self) -> &'static [&'static str] {
        match self {
            Category::Photos360 => PANORAMA_EXTENSIONS,
            _ => COMMON_EXTENSIONS,
        }
    }

    /// Label stored on a record when the admin leaves the category blank.
    pub fn default_label(&self) -> &'static str {
        match self {
            Category::Gallery => "general",
            Category::Photos360 => "panorama",
            Category::Videos => "video",
            Category::Tours => "tour",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Category {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> anyhow::Result<Self> {
        match s {
            "gallery" => Ok(Category::Gallery),
            "photos360" | "360" => Ok(Category::Photos360),
            "videos" => Ok(Category::Videos),
            "tours" => Ok(Category::Tours),
            other => bail!(
                "unknown category: '{}'. Must be gallery, photos360, videos, or tours",
                other
            ),
        }
    }
}

/// One published item in a category index.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentRecord {
    pub id: String,
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail_url: Option<String>,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub category: String,
    /// External target for video and tour records, whose uploaded image is a poster.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub created_at: String,
}

/// The ordered list of records for one category.
///
/// Serialized transparently as a top-level JSON array.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContentIndex {
    pub records: Vec<ContentRecord>,
}

impl ContentIndex {
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.records.iter().any(|r| r.id == id)
    }

    /// Append a record at the end. Existing records are never touched.
    pub fn push(&mut self, record: ContentRecord) {
        self.records.push(record);
    }
}

/// Size statistics reported after a successful processing run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessingStats {
    pub original_bytes: u64,
    pub optimized_bytes: u64,
    pub thumbnail_bytes: u64,
    pub reduction_percent: f64,
}

impl ProcessingStats {
    pub fn new(original_bytes: u64, optimized_bytes: u64, thumbnail_bytes: u64) -> Self {
        let reduction_percent = if original_bytes == 0 {
            0.0
        } else {
            let ratio = 1.0 - optimized_bytes as f64 / original_bytes as f64;
            (ratio * 1000.0).round() / 10.0
        };
        Self {
            original_bytes,
            optimized_bytes,
            thumbnail_bytes,
            reduction_percent,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(id: &str) -> ContentRecord {
        ContentRecord {
            id: id.to_string(),
            url: format!("https://cdn.example.com/gallery/{}.webp", id),
            thumbnail_url: None,
            title: "Sunset".to_string(),
            description: None,
            category: "general".to_string(),
            link: None,
            width: Some(1200),
            height: Some(800),
            created_at: "2026-01-01T00:00:00Z".to_string(),
        }
    }

    #[test]
    fn test_category_parse_and_alias() {
        assert_eq!("gallery".parse::<Category>().unwrap(), Category::Gallery);
        assert_eq!("360".parse::<Category>().unwrap(), Category::Photos360);
        assert_eq!("tours".parse::<Category>().unwrap(), Category::Tours);
        assert!("podcasts".parse::<Category>().is_err());
    }

    #[test]
    fn test_category_prefixes() {
        let c = Category::Photos360;
        assert_eq!(c.staging_prefix(), "uploads/photos360/");
        assert_eq!(c.public_prefix(), "photos360/");
        assert_eq!(c.thumbnail_prefix(), "photos360/thumbs/");
        assert_eq!(c.index_file_name(), "photos360.json");
    }

    #[test]
    fn test_heif_only_for_panoramas() {
        assert!(Category::Photos360.allowed_extensions().contains(&"heif"));
        assert!(!Category::Gallery.allowed_extensions().contains(&"heif"));
        assert!(Category::Gallery.allowed_extensions().contains(&"heic"));
    }

    #[test]
    fn test_index_serializes_as_array() {
        let mut index = ContentIndex::default();
        index.push(record("a1"));
        let json = serde_json::to_value(&index).unwrap();
        assert!(json.is_array());
        assert_eq!(json[0]["id"], "a1");
        assert_eq!(json[0]["createdAt"], "2026-01-01T00:00:00Z");
        assert!(json[0].get("thumbnailUrl").is_none());
    }

    #[test]
    fn test_stats_reduction() {
        let stats = ProcessingStats::new(1000, 250, 40);
        assert_eq!(stats.reduction_percent, 75.0);

        let stats = ProcessingStats::new(3, 2, 1);
        assert_eq!(stats.reduction_percent, 33.3);

        let stats = ProcessingStats::new(0, 10, 1);
        assert_eq!(stats.reduction_percent, 0.0);
    }
}
