//! # Folio
//!
//! Media back end for a portfolio site.
//!
//! Admins upload images straight to an S3-compatible bucket through
//! pre-signed URLs, then ask Folio to finish the upload: the original is
//! transcoded to WebP, a thumbnail is derived, both are published, the
//! original is deleted, and a record is appended to the category's JSON
//! content index that the public site renders from.
//!
//! ## Architecture
//!
//! ```text
//!  browser ──(1) upload-url──▶ ┌────────┐        ┌──────────────┐
//!     │                        │ server │──────▶ │ ObjectStore  │
//!     └──(2) PUT original────────────────────────▶│ (S3 / mem)   │
//!     └──(3) process────────▶  │        │──┐     └──────────────┘
//!                              └────────┘  │     ┌──────────────┐
//!                                          └───▶ │ IndexStore   │
//!                                                │ (JSON files) │
//!                                                └──────────────┘
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`models`] | Categories, records, stats |
//! | [`error`] | Error taxonomy for HTTP-facing operations |
//! | [`store`] | Object store trait, S3 and in-memory backends |
//! | [`index`] | Content index trait, JSON-file and in-memory backends |
//! | [`imaging`] | WebP normalization and thumbnails |
//! | [`presign`] | Pre-signed upload URL issuer |
//! | [`pipeline`] | Upload completion pipeline |
//! | [`auth`] | Session access gate |
//! | [`server`] | HTTP server |

pub mod auth;
pub mod config;
pub mod error;
pub mod imaging;
pub mod index;
pub mod models;
pub mod pipeline;
pub mod presign;
pub mod server;
pub mod store;
