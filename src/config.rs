use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub content: ContentConfig,
    #[serde(default)]
    pub processing: ProcessingConfig,
    #[serde(default)]
    pub auth: AuthConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub bind: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub bucket: String,
    #[serde(default = "default_region")]
    pub region: String,
    /// Custom endpoint for S3-compatible services (MinIO, R2, LocalStack).
    #[serde(default)]
    pub endpoint_url: Option<String>,
    /// Address objects as `<endpoint>/<bucket>/<key>` instead of a bucket subdomain.
    #[serde(default)]
    pub path_style: bool,
    pub public_base_url: String,
    #[serde(default = "default_presign_expiry")]
    pub presign_expiry_secs: u64,
}

fn default_region() -> String {
    "us-east-1".to_string()
}
fn default_presign_expiry() -> u64 {
    900
}

#[derive(Debug, Deserialize, Clone)]
pub struct ContentConfig {
    /// Directory holding one `<category>.json` index per category.
    pub dir: PathBuf,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProcessingConfig {
    #[serde(default = "default_quality")]
    pub quality: f32,
    #[serde(default = "default_thumbnail_max_px")]
    pub thumbnail_max_px: u32,
    #[serde(default = "default_max_dimension_px")]
    pub max_dimension_px: u32,
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self {
            quality: 80.0,
            thumbnail_max_px: 400,
            max_dimension_px: 8192,
            max_upload_bytes: 50 * 1024 * 1024,
        }
    }
}

fn default_quality() -> f32 {
    80.0
}
fn default_thumbnail_max_px() -> u32 {
    400
}
fn default_max_dimension_px() -> u32 {
    8192
}
fn default_max_upload_bytes() -> u64 {
    50 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct AuthConfig {
    /// Hex SHA-256 digests of accepted admin tokens.
    #[serde(default)]
    pub token_sha256: Vec<String>,
    /// External session endpoint; a 2xx answer marks the token valid.
    #[serde(default)]
    pub verify_url: Option<String>,
    #[serde(default = "default_cookie_name")]
    pub cookie_name: String,
    #[serde(default = "default_login_path")]
    pub login_path: String,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            token_sha256: Vec::new(),
            verify_url: None,
            cookie_name: default_cookie_name(),
            login_path: default_login_path(),
        }
    }
}

fn default_cookie_name() -> String {
    "folio_session".to_string()
}
fn default_login_path() -> String {
    "/login".to_string()
}

/// Longest validity S3 accepts for a SigV4 pre-signed URL (7 days).
const MAX_PRESIGN_EXPIRY_SECS: u64 = 604_800;

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    let config: Config = toml::from_str(&content).with_context(|| "Failed to parse config file")?;

    validate(&config)?;
    Ok(config)
}

pub fn validate(config: &Config) -> Result<()> {
    // Validate storage
    if config.storage.bucket.trim().is_empty() {
        anyhow::bail!("storage.bucket must not be empty");
    }
    if config.storage.public_base_url.trim().is_empty() {
        anyhow::bail!("storage.public_base_url must not be empty");
    }
    if let Some(ref endpoint) = config.storage.endpoint_url {
        if crate::store::s3::endpoint_has_path(endpoint) {
            anyhow::bail!(
                "storage.endpoint_url must be scheme and host only, got '{}'",
                endpoint
            );
        }
    }
    if config.storage.presign_expiry_secs == 0
        || config.storage.presign_expiry_secs > MAX_PRESIGN_EXPIRY_SECS
    {
        anyhow::bail!(
            "storage.presign_expiry_secs must be in [1, {}]",
            MAX_PRESIGN_EXPIRY_SECS
        );
    }

    // Validate processing
    let quality = config.processing.quality;
    if !(quality > 0.0 && quality <= 100.0) {
        anyhow::bail!("processing.quality must be in (0, 100]");
    }
    if config.processing.thumbnail_max_px == 0 {
        anyhow::bail!("processing.thumbnail_max_px must be > 0");
    }
    if config.processing.max_dimension_px < config.processing.thumbnail_max_px {
        anyhow::bail!("processing.max_dimension_px must be >= processing.thumbnail_max_px");
    }
    if config.processing.max_upload_bytes == 0 {
        anyhow::bail!("processing.max_upload_bytes must be > 0");
    }

    // Validate auth
    if config.auth.token_sha256.is_empty() && config.auth.verify_url.is_none() {
        anyhow::bail!("auth requires at least one of auth.token_sha256 or auth.verify_url");
    }
    for digest in &config.auth.token_sha256 {
        if digest.len() != 64 || !digest.chars().all(|c| c.is_ascii_hexdigit()) {
            anyhow::bail!("auth.token_sha256 entries must be 64 hex characters");
        }
    }
    if config.auth.cookie_name.trim().is_empty() {
        anyhow::bail!("auth.cookie_name must not be empty");
    }

    Ok(())
}
