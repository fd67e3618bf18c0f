//! Persisted document records.
//!
//! A published document is stored as one JSON file per logical id under
//! `<out_dir>/documents/`. Writes go through a temp file and a rename, so a
//! reader never observes a half-written record.

use crate::error::Fei2HtmlError;
use crate::output::{write_atomic, AssetItem};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Everything kept about a published document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentRecord {
    pub doc_id: String,
    pub title: Option<String>,
    /// Hex SHA-256 of the source document bytes.
    pub source_hash: String,
    pub engine: String,
    /// Version of the stylesheet the HTML was produced for.
    pub css_version: Option<String>,
    /// Sanitized HTML fragment.
    pub html_content: String,
    pub asset_manifest: Vec<AssetItem>,
}

/// Listing view of a record, without the HTML body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentSummary {
    pub doc_id: String,
    pub title: Option<String>,
    pub engine: String,
    pub source_hash: String,
}

impl From<&DocumentRecord> for DocumentSummary {
    fn from(r: &DocumentRecord) -> Self {
        Self {
            doc_id: r.doc_id.clone(),
            title: r.title.clone(),
            engine: r.engine.clone(),
            source_hash: r.source_hash.clone(),
        }
    }
}

/// Check that `doc_id` can name a file and an asset namespace.
pub fn validate_doc_id(doc_id: &str) -> Result<(), Fei2HtmlError> {
    let bad = doc_id.trim().is_empty()
        || doc_id == "."
        || doc_id == ".."
        || doc_id.contains(['/', '\\', '\0']);
    if bad {
        return Err(Fei2HtmlError::DocumentStoreFailed {
            doc_id: doc_id.to_string(),
            reason: "document id must be a non-empty name without path separators".into(),
        });
    }
    Ok(())
}

/// JSON-file-per-record document store.
#[derive(Debug, Clone)]
pub struct FileDocumentStore {
    dir: PathBuf,
}

impl FileDocumentStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, doc_id: &str) -> PathBuf {
        self.dir.join(format!("{doc_id}.json"))
    }

    /// Insert or replace the record for `record.doc_id`.
    ///
    /// Returns `true` when no record existed before.
    pub async fn upsert(&self, record: &DocumentRecord) -> Result<bool, Fei2HtmlError> {
        validate_doc_id(&record.doc_id)?;
        let path = self.record_path(&record.doc_id);
        let created = !tokio::fs::try_exists(&path).await.unwrap_or(false);

        let json = serde_json::to_vec_pretty(record).map_err(|e| Fei2HtmlError::DocumentStoreFailed {
            doc_id: record.doc_id.clone(),
            reason: e.to_string(),
        })?;
        write_atomic(&path, &json).await?;

        debug!(
            "{} document record '{}'",
            if created { "Created" } else { "Updated" },
            record.doc_id
        );
        Ok(created)
    }

    pub async fn get(&self, doc_id: &str) -> Result<Option<DocumentRecord>, Fei2HtmlError> {
        validate_doc_id(doc_id)?;
        let path = self.record_path(doc_id);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(Fei2HtmlError::DocumentStoreFailed {
                    doc_id: doc_id.to_string(),
                    reason: e.to_string(),
                })
            }
        };
        serde_json::from_slice(&bytes)
            .map(Some)
            .map_err(|e| Fei2HtmlError::DocumentStoreFailed {
                doc_id: doc_id.to_string(),
                reason: format!("corrupt record {}: {}", path.display(), e),
            })
    }

    pub async fn exists(&self, doc_id: &str) -> Result<bool, Fei2HtmlError> {
        validate_doc_id(doc_id)?;
        Ok(tokio::fs::try_exists(self.record_path(doc_id))
            .await
            .unwrap_or(false))
    }

    /// Summaries of every stored record, sorted by document id.
    pub async fn list(&self) -> Result<Vec<DocumentSummary>, Fei2HtmlError> {
        let fail = |reason: String| Fei2HtmlError::DocumentStoreFailed {
            doc_id: "*".to_string(),
            reason,
        };

        let mut entries = match tokio::fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(fail(e.to_string())),
        };

        let mut summaries = Vec::new();
        while let Some(entry) = entries.next_entry().await.map_err(|e| fail(e.to_string()))? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(doc_id) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };
            if let Some(record) = self.get(&doc_id).await? {
                summaries.push(DocumentSummary::from(&record));
            }
        }
        summaries.sort_by(|a, b| a.doc_id.cmp(&b.doc_id));
        Ok(summaries)
    }
}
