//! Pre-signed upload URL issuer.
//!
//! Validates the requested file name and content type against the
//! category's allow-list, picks a fresh staging key, and asks the object
//! store for a time-limited `PUT` URL. The client then uploads straight to
//! storage, so the image body never passes through this server. Nothing is
//! written to storage here.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::FolioError;
use crate::models::Category;
use crate::store::ObjectStore;

/// Body of `POST /api/{category}/upload-url`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlRequest {
    #[serde(default)]
    pub filename: String,
    #[serde(default)]
    pub content_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadUrlResponse {
    pub upload_url: String,
    pub key: String,
    pub expires_in: u64,
}

/// Check the request and return the lower-cased file extension.
pub fn validate_upload_request(
    category: Category,
    req: &UploadUrlRequest,
) -> Result<String, FolioError> {
    let filename = req.filename.trim();
    let content_type = req.content_type.trim();

    if filename.is_empty() || content_type.is_empty() {
        return Err(FolioError::validation(
            "filename and contentType are required",
        ));
    }
    if !content_type.to_ascii_lowercase().starts_with("image/") {
        return Err(FolioError::validation(format!(
            "only image uploads are accepted, got '{}'",
            content_type
        )));
    }

    let extension = match filename.rsplit_once('.') {
        Some((_, ext)) if !ext.is_empty() => ext.to_ascii_lowercase(),
        _ => {
            return Err(FolioError::validation(format!(
                "filename '{}' has no extension",
                filename
            )))
        }
    };
    if !category.allowed_extensions().contains(&extension.as_str()) {
        return Err(FolioError::validation(format!(
            "extension '.{}' is not allowed for {}; allowed: {}",
            extension,
            category,
            category.allowed_extensions().join(", ")
        )));
    }

    Ok(extension)
}

/// Staging key for a new upload: `uploads/<category>/<uuid>.<ext>`.
pub fn staging_key(category: Category, extension: &str) -> String {
    format!(
        "{}{}.{}",
        category.staging_prefix(),
        Uuid::new_v4(),
        extension
    )
}

/// Validate `req` and issue a pre-signed `PUT` URL valid for `expires_in_secs`.
pub fn issue_upload_url(
    store: &dyn ObjectStore,
    category: Category,
    req: &UploadUrlRequest,
    expires_in_secs: u64,
) -> Result<UploadUrlResponse, FolioError> {
    let extension = validate_upload_request(category, req)?;
    let key = staging_key(category, &extension);
    let upload_url = store
        .presign_put(&key, expires_in_secs)
        .map_err(FolioError::Storage)?;

    Ok(UploadUrlResponse {
        upload_url,
        key,
        expires_in: expires_in_secs,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::memory::{InMemoryObjectStore, StoreOp};

    fn req(filename: &str, content_type: &str) -> UploadUrlRequest {
        UploadUrlRequest {
            filename: filename.to_string(),
            content_type: content_type.to_string(),
        }
    }

    #[test]
    fn test_valid_request_for_every_allowed_extension() {
        let store = InMemoryObjectStore::new("https://cdn.test");
        for category in Category::ALL {
            for ext in category.allowed_extensions() {
                let filename = format!("Holiday Photo.{}", ext.to_uppercase());
                let resp =
                    issue_upload_url(&store, category, &req(&filename, "image/jpeg"), 600)
                        .unwrap();
                assert!(resp.key.starts_with(&category.staging_prefix()));
                assert!(resp.key.ends_with(&format!(".{}", ext)));
                assert!(resp.upload_url.contains(&resp.key));
                assert_eq!(resp.expires_in, 600);
            }
        }
    }

    #[test]
    fn test_rejections_issue_no_credentials() {
        let store = InMemoryObjectStore::new("https://cdn.test");
        let cases = [
            req("", "image/png"),
            req("a.png", ""),
            req("a.png", "application/pdf"),
            req("a.gif", "image/gif"),
            req("a.heif", "image/heif"),
            req("noextension", "image/png"),
            req("trailingdot.", "image/png"),
        ];
        for case in &cases {
            let err = issue_upload_url(&store, Category::Gallery, case, 600).unwrap_err();
            assert!(err.is_client_error(), "expected validation error for {:?}", case);
        }
        assert_eq!(store.calls(StoreOp::Presign), 0);
    }

    #[test]
    fn test_heif_allowed_for_panoramas() {
        let ext = validate_upload_request(Category::Photos360, &req("pano.HEIF", "image/heif"))
            .unwrap();
        assert_eq!(ext, "heif");
    }

    #[test]
    fn test_presign_failure_is_storage_error() {
        let store = InMemoryObjectStore::new("https://cdn.test");
        store.fail_operation(StoreOp::Presign);
        let err =
            issue_upload_url(&store, Category::Tours, &req("a.jpg", "image/jpeg"), 60).unwrap_err();
        assert!(matches!(err, FolioError::Storage(_)));
    }

    #[test]
    fn test_staging_keys_are_unique() {
        let a = staging_key(Category::Videos, "png");
        let b = staging_key(Category::Videos, "png");
        assert_ne!(a, b);
        assert!(a.starts_with("uploads/videos/"));
    }
}
