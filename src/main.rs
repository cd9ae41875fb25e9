//! # Folio CLI (`folio`)
//!
//! Runs the media server and offers a few maintenance commands for the
//! content indexes.
//!
//! ## Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `folio serve` | Start the HTTP server |
//! | `folio index init` | Create empty index documents for missing categories |
//! | `folio index list <category>` | Print the records of a category |
//! | `folio presign <category> <filename>` | Issue a pre-signed upload URL |
//!
//! ## Examples
//!
//! ```bash
//! folio --config ./config/folio.toml index init
//! folio --config ./config/folio.toml serve
//! folio presign gallery sunset.jpg --content-type image/jpeg
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use folio::config;
use folio::index::{IndexStore, JsonFileIndexStore};
use folio::models::Category;
use folio::presign::{issue_upload_url, UploadUrlRequest};
use folio::server;
use folio::store::s3::S3ObjectStore;

/// Folio: media back end for a portfolio site.
///
/// All commands accept a `--config` flag pointing to a TOML configuration
/// file.
#[derive(Parser)]
#[command(
    name = "folio",
    about = "Folio: pre-signed uploads, WebP processing and JSON content indexes",
    version
)]
struct Cli {
    /// Path to configuration file (TOML).
    #[arg(long, global = true, default_value = "./config/folio.toml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server.
    ///
    /// Binds to `[server].bind`. S3 credentials are read from
    /// `AWS_ACCESS_KEY_ID` / `AWS_SECRET_ACCESS_KEY`.
    Serve,

    /// Inspect and initialize content indexes.
    Index {
        #[command(subcommand)]
        action: IndexAction,
    },

    /// Issue a pre-signed upload URL without going through the server.
    ///
    /// Applies the same validation as `POST /api/{category}/upload-url`.
    Presign {
        /// Target category: gallery, photos360, videos, or tours.
        category: Category,
        /// File name; its extension must be allowed for the category.
        filename: String,
        /// MIME type of the upload.
        #[arg(long, default_value = "image/jpeg")]
        content_type: String,
    },
}

#[derive(Subcommand)]
enum IndexAction {
    /// Create `[]` documents for categories that have no index yet.
    ///
    /// Existing documents are never modified.
    Init,
    /// Print every record of a category, in index order.
    List {
        /// Category to list.
        category: Category,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("folio=info")),
        )
        .init();

    let cli = Cli::parse();
    let cfg = config::load_config(&cli.config)?;

    match cli.command {
        Commands::Serve => {
            server::run_server(&cfg).await?;
        }
        Commands::Index { action } => {
            let store = JsonFileIndexStore::new(&cfg.content.dir);
            match action {
                IndexAction::Init => {
                    let created = store.init_missing().await?;
                    if created.is_empty() {
                        println!("All content indexes already exist.");
                    } else {
                        for category in &created {
                            println!("created {}", store.path_for(*category).display());
                        }
                    }
                }
                IndexAction::List { category } => {
                    let index = store.read(category).await?;
                    println!("{} ({} records)", category, index.len());
                    for record in &index.records {
                        println!(
                            "  {:<38} {:<24} {}",
                            record.id, record.title, record.url
                        );
                    }
                }
            }
        }
        Commands::Presign {
            category,
            filename,
            content_type,
        } => {
            let store = S3ObjectStore::from_env(cfg.storage.clone())
                .context("Failed to set up S3 object store")?;
            let req = UploadUrlRequest {
                filename,
                content_type,
            };
            let resp = issue_upload_url(
                &store,
                category,
                &req,
                cfg.storage.presign_expiry_secs,
            )?;
            println!("key: {}", resp.key);
            println!("url: {}", resp.upload_url);
            println!("expires in: {}s", resp.expires_in);
        }
    }

    Ok(())
}
