//! Publishing: convert a document and persist everything about it.
//!
//! [`Publisher::publish`] is the upload-and-save flow:
//!
//! ```text
//! resolve ─▶ sha256(source) ─▶ [lock doc_id] ─▶ clear old assets? ─▶ convert
//!                                              ─▶ preview ─▶ manifest ─▶ upsert record
//! ```
//!
//! ## Why a per-document lock?
//!
//! Overwriting a document clears its asset namespace and then writes the new
//! assets into it. Two publishes of the same id running at once could
//! interleave those steps and delete each other's freshly stored images.
//! Every publish therefore holds an async mutex keyed by the logical id for
//! its whole clear-convert-save sequence. Publishes of different ids never
//! wait on each other.

use crate::config::ConverterConfig;
use crate::convert::{convert_resolved, logical_doc_id};
use crate::document::{validate_doc_id, DocumentRecord, FileDocumentStore};
use crate::error::Fei2HtmlError;
use crate::output::{write_atomic, ConversionStats};
use crate::pipeline::input;
use crate::preview::{write_preview, PreviewInfo};
use crate::storage::AssetStore;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Default stylesheet version recorded on published documents.
pub const DEFAULT_CSS_VERSION: &str = "v1";

/// Options for one publish.
#[derive(Debug, Clone)]
pub struct PublishRequest {
    /// Logical id; defaults to the input file stem.
    pub doc_id: Option<String>,
    pub title: Option<String>,
    pub css_version: Option<String>,
    /// Clear the document's previously stored assets first. Default: true.
    pub overwrite: bool,
}

impl Default for PublishRequest {
    fn default() -> Self {
        Self {
            doc_id: None,
            title: None,
            css_version: Some(DEFAULT_CSS_VERSION.to_string()),
            overwrite: true,
        }
    }
}

/// What a publish produced.
#[derive(Debug, Clone)]
pub struct PublishOutcome {
    pub record: DocumentRecord,
    /// `true` if no record with this id existed before.
    pub created: bool,
    pub preview: Option<PreviewInfo>,
    pub manifest_path: PathBuf,
    pub stats: ConversionStats,
}

/// Converts documents and saves records, serialising work per document id.
pub struct Publisher<S: AssetStore> {
    config: ConverterConfig,
    store: S,
    documents: FileDocumentStore,
    locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl<S: AssetStore> Publisher<S> {
    /// Records are kept under the configuration's `out_dir/documents`.
    pub fn new(config: ConverterConfig, store: S) -> Self {
        let documents = FileDocumentStore::new(config.documents_dir());
        Self {
            config,
            store,
            documents,
            locks: Mutex::new(HashMap::new()),
        }
    }

    pub fn config(&self) -> &ConverterConfig {
        &self.config
    }

    pub fn documents(&self) -> &FileDocumentStore {
        &self.documents
    }

    async fn lock_for(&self, doc_id: &str) -> Arc<Mutex<()>> {
        let mut table = self.locks.lock().await;
        Arc::clone(table.entry(doc_id.to_string()).or_default())
    }

    /// Convert `input_str` and persist preview, manifest and record.
    pub async fn publish(
        &self,
        input_str: impl AsRef<str>,
        request: &PublishRequest,
    ) -> Result<PublishOutcome, Fei2HtmlError> {
        let total_start = Instant::now();
        let input_str = input_str.as_ref();
        info!("Publishing: {}", input_str);

        let resolved = input::resolve_input(input_str, self.config.download_timeout_secs).await?;
        let doc_id = logical_doc_id(request.doc_id.as_deref(), &resolved, input_str)?;
        validate_doc_id(&doc_id)?;
        let source_hash = source_hash(resolved.path()).await?;

        let lock = self.lock_for(&doc_id).await;
        let _guard = lock.lock().await;

        if request.overwrite && self.documents.exists(&doc_id).await? {
            // Best effort: stale assets are only a leak, not a failure.
            if let Err(e) = self.store.clear_namespace(&doc_id).await {
                warn!("Could not clear old assets for '{}': {}", doc_id, e);
            }
        }

        let output = convert_resolved(&resolved, &doc_id, &self.config, &self.store, total_start).await?;

        let preview = write_preview(&self.config, &doc_id, request.title.as_deref(), &output.html).await?;

        let manifest_path = self.config.manifest_path(&doc_id);
        write_atomic(&manifest_path, output.manifest().to_json()?.as_bytes()).await?;

        let record = DocumentRecord {
            doc_id: doc_id.clone(),
            title: request.title.clone(),
            source_hash,
            engine: output.engine,
            css_version: request.css_version.clone(),
            html_content: output.html,
            asset_manifest: output.assets,
        };
        let created = self.documents.upsert(&record).await?;

        info!(
            "Published '{}' ({}) in {}ms",
            doc_id,
            if created { "new" } else { "updated" },
            total_start.elapsed().as_millis()
        );

        Ok(PublishOutcome {
            record,
            created,
            preview,
            manifest_path,
            stats: output.stats,
        })
    }
}

/// Hex SHA-256 of the file at `path`.
pub async fn source_hash(path: &Path) -> Result<String, Fei2HtmlError> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| Fei2HtmlError::Internal(format!("Failed to read source for hashing: {}", e)))?;
    Ok(hex::encode(Sha256::digest(&bytes)))
}
