//! # fei2html
//!
//! Convert word-processor documents (`.docx`) to web-safe, structured HTML.
//!
//! ## Why this crate?
//!
//! Document converters reproduce what an author *typed*: a bold paragraph
//! instead of a heading, `•`-prefixed paragraphs instead of a list, images
//! sized with inline styles, links to a scratch directory that vanishes
//! after the run. Serving that markup directly is both ugly and unsafe.
//! This crate runs the converter, then infers the intended structure,
//! moves images to durable storage and filters the result through a strict
//! allow-list before anything is stored or served.
//!
//! ## Pipeline Overview
//!
//! ```text
//! .docx
//!  │
//!  ├─ 1. Input      resolve local file or download from URL
//!  ├─ 2. Engine     external converter → raw HTML + extracted media
//!  ├─ 3. Assets     store media, rewrite <img src> to durable URLs
//!  ├─ 4. Structure  headings, tables, lists, images, heading ids
//!  ├─ 5. Sanitize   allow-list + rel="noopener noreferrer" + root wrapper
//!  └─ 6. Output     HTML + asset manifest (+ preview and record when publishing)
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use fei2html::{convert, ConverterConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ConverterConfig::default();
//!     let store = config.local_store();
//!     let output = convert("report.docx", None, &config, &store).await?;
//!     println!("{}", output.html);
//!     eprintln!("{} assets in {}ms", output.stats.asset_count, output.stats.total_duration_ms);
//!     Ok(())
//! }
//! ```
//!
//! The structural passes and the sanitizer are plain functions and can be
//! used on any HTML fragment without running an engine:
//!
//! ```rust
//! use fei2html::pipeline::{postprocess::process_all, sanitize::Sanitizer};
//!
//! let html = process_all("<p>• 第一项</p><p>• 第二项</p>");
//! assert_eq!(html, "<ul><li>第一项</li><li>第二项</li></ul>");
//! assert_eq!(
//!     Sanitizer::default().sanitize(&html),
//!     "<div class=\"lark-article\"><ul><li>第一项</li><li>第二项</li></ul></div>"
//! );
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `fei2html` binary (clap + anyhow + tracing-subscriber + indicatif) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! fei2html = { version = "0.1", default-features = false }
//! ```

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod convert;
pub mod document;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod preview;
pub mod publish;
pub mod storage;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{ConverterConfig, ConverterConfigBuilder};
pub use convert::{convert, convert_sync, convert_to_file, render_fragment};
pub use document::{DocumentRecord, DocumentSummary, FileDocumentStore};
pub use error::Fei2HtmlError;
pub use output::{AssetItem, AssetManifest, ConversionOutput, ConversionStats};
pub use pipeline::sanitize::{AllowListPolicy, Sanitizer};
pub use preview::PreviewInfo;
pub use publish::{PublishOutcome, PublishRequest, Publisher};
pub use storage::{AssetStore, HttpAssetStore, LocalAssetStore};
