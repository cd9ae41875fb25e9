//! Content index persistence.
//!
//! Each category has one JSON document holding a top-level array of
//! [`ContentRecord`](crate::models::ContentRecord)s. The public site reads
//! these documents directly; the processing pipeline is the only writer.
//!
//! Callers go through the [`IndexStore`] trait and never touch the
//! filesystem themselves. Writes replace the whole document. There is no
//! locking or version token: two writers that read the same document and
//! each append a record will lose one of the appends (last write wins).

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::RwLock;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use uuid::Uuid;

use crate::models::{Category, ContentIndex};

/// Read/write access to per-category content indexes.
#[async_trait]
pub trait IndexStore: Send + Sync {
    /// Read the full document for `category`.
    ///
    /// Fails if the document is absent or is not a valid index; a malformed
    /// document is never treated as empty.
    async fn read(&self, category: Category) -> Result<ContentIndex>;

    /// Replace the full document for `category`.
    async fn write(&self, category: Category, index: &ContentIndex) -> Result<()>;
}

/// Parse an index document, naming the category in the error.
pub fn parse_index(category: Category, raw: &str) -> Result<ContentIndex> {
    serde_json::from_str(raw)
        .with_context(|| format!("Malformed content index for category '{}'", category))
}

// ═══════════════════════════════════════════════════════════════════════
// JSON files on disk
// ═══════════════════════════════════════════════════════════════════════

/// Stores each index as `<dir>/<category>.json`.
pub struct JsonFileIndexStore {
    dir: PathBuf,
}

impl JsonFileIndexStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn path_for(&self, category: Category) -> PathBuf {
        self.dir.join(category.index_file_name())
    }

    /// Create an empty index for every category that has none yet.
    ///
    /// Existing documents are left untouched. Returns the categories that
    /// were created.
    pub async fn init_missing(&self) -> Result<Vec<Category>> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create content dir: {}", self.dir.display()))?;

        let mut created = Vec::new();
        for category in Category::ALL {
            let path = self.path_for(category);
            if tokio::fs::try_exists(&path).await? {
                continue;
            }
            self.write(category, &ContentIndex::default()).await?;
            created.push(category);
        }
        Ok(created)
    }
}

#[async_trait]
impl IndexStore for JsonFileIndexStore {
    async fn read(&self, category: Category) -> Result<ContentIndex> {
        let path = self.path_for(category);
        let raw = tokio::fs::read_to_string(&path)
            .await
            .with_context(|| format!("Failed to read content index: {}", path.display()))?;
        parse_index(category, &raw)
    }

    async fn write(&self, category: Category, index: &ContentIndex) -> Result<()> {
        let path = self.path_for(category);
        let json = serde_json::to_string_pretty(index)?;

        // Readers see either the old or the new document, never a partial one.
        let tmp_path = temp_sibling(&path);
        tokio::fs::write(&tmp_path, json.as_bytes())
            .await
            .with_context(|| format!("Failed to write {}", tmp_path.display()))?;
        tokio::fs::rename(&tmp_path, &path)
            .await
            .with_context(|| format!("Failed to replace content index: {}", path.display()))?;
        Ok(())
    }
}

fn temp_sibling(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default();
    path.with_file_name(format!(".{}.{}.tmp", name, Uuid::new_v4()))
}

// ═══════════════════════════════════════════════════════════════════════
// In-memory
// ═══════════════════════════════════════════════════════════════════════

/// Keeps raw JSON documents in memory so tests exercise the same parsing
/// (and the same malformed-document failures) as the file store.
#[derive(Default)]
pub struct InMemoryIndexStore {
    docs: RwLock<HashMap<Category, String>>,
}

impl InMemoryIndexStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store where every category starts with an empty index.
    pub fn with_empty_categories() -> Self {
        let store = Self::new();
        for category in Category::ALL {
            store.insert_raw(category, "[]");
        }
        store
    }

    /// Replace a document with arbitrary text.
    pub fn insert_raw(&self, category: Category, raw: &str) {
        self.docs
            .write()
            .unwrap()
            .insert(category, raw.to_string());
    }
}

#[async_trait]
impl IndexStore for InMemoryIndexStore {
    async fn read(&self, category: Category) -> Result<ContentIndex> {
        let raw = self
            .docs
            .read()
            .unwrap()
            .get(&category)
            .cloned()
            .ok_or_else(|| anyhow!("No content index for category '{}'", category))?;
        parse_index(category, &raw)
    }

    async fn write(&self, category: Category, index: &ContentIndex) -> Result<()> {
        let json = serde_json::to_string(index)?;
        self.insert_raw(category, &json);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ContentRecord;
    use tempfile::TempDir;

    fn record(id: &str) -> ContentRecord {
        ContentRecord {
            id: id.to_string(),
            url: format!("https://cdn.test/tours/{}.webp", id),
            thumbnail_url: Some(format!("https://cdn.test/tours/thumbs/{}.webp", id)),
            title: format!("Tour {}", id),
            description: Some("Old town".to_string()),
            category: "tour".to_string(),
            link: Some("https://tours.example.com/old-town".to_string()),
            width: None,
            height: None,
            created_at: "2026-03-01T10:00:00Z".to_string(),
        }
    }

    #[tokio::test]
    async fn test_file_store_roundtrip_and_init() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileIndexStore::new(tmp.path().join("content"));

        let created = store.init_missing().await.unwrap();
        assert_eq!(created.len(), 4);
        assert!(store.read(Category::Tours).await.unwrap().is_empty());

        let mut index = ContentIndex::default();
        index.push(record("t1"));
        store.write(Category::Tours, &index).await.unwrap();

        // A second init leaves existing documents alone.
        assert!(store.init_missing().await.unwrap().is_empty());
        let read_back = store.read(Category::Tours).await.unwrap();
        assert_eq!(read_back, index);

        let raw = std::fs::read_to_string(store.path_for(Category::Tours)).unwrap();
        assert!(raw.trim_start().starts_with('['));
        assert!(raw.contains("\"thumbnailUrl\""));
    }

    #[tokio::test]
    async fn test_missing_document_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileIndexStore::new(tmp.path());
        let err = store.read(Category::Videos).await.unwrap_err();
        assert!(err.to_string().contains("videos.json"));
    }

    #[tokio::test]
    async fn test_malformed_document_is_an_error() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileIndexStore::new(tmp.path());
        std::fs::write(store.path_for(Category::Gallery), "{ not json").unwrap();
        let err = store.read(Category::Gallery).await.unwrap_err();
        assert!(err.to_string().contains("Malformed"));

        let mem = InMemoryIndexStore::new();
        mem.insert_raw(Category::Gallery, "{\"records\": 3}");
        assert!(mem.read(Category::Gallery).await.is_err());
    }

    #[tokio::test]
    async fn test_write_leaves_no_temp_files() {
        let tmp = TempDir::new().unwrap();
        let store = JsonFileIndexStore::new(tmp.path());
        store.init_missing().await.unwrap();
        let names: Vec<String> = std::fs::read_dir(tmp.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().to_string())
            .collect();
        assert_eq!(names.len(), 4);
        assert!(names.iter().all(|n| n.ends_with(".json")));
    }
}
