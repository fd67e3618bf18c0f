//! Error types for the fei2html library.
//!
//! A single fatal error type, [`Fei2HtmlError`], covers every way a
//! conversion can fail to produce output: the input could not be found or
//! fetched, the conversion engine is missing or misbehaved, or an extracted
//! asset could not be stored.
//!
//! The structural post-processing passes never fail. They are total
//! functions over their input text and leave it unchanged in the worst case,
//! so nothing in [`crate::pipeline::postprocess`] returns a `Result`.
//!
//! Callers that want to retry can ask [`Fei2HtmlError::is_retryable`]
//! instead of matching on variants: a timeout or a temporarily missing
//! engine may succeed on a second attempt, a malformed document will not.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the fei2html library.
#[derive(Debug, Error)]
pub enum Fei2HtmlError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// Input file was not found at the given path.
    #[error("Input document not found: '{path}'\nCheck the path exists and is readable.")]
    InputNotFound { path: PathBuf },

    /// The input is not something the engine can convert.
    #[error("Invalid input '{input}': {reason}")]
    InvalidInput { input: String, reason: String },

    /// HTTP URL was syntactically valid but download failed.
    #[error("Failed to download '{url}': {reason}\nCheck your internet connection.")]
    DownloadFailed { url: String, reason: String },

    /// Download exceeded the configured timeout.
    #[error("Download timed out after {secs}s for '{url}'\nIncrease --download-timeout.")]
    DownloadTimeout { url: String, secs: u64 },

    // ── Engine errors ─────────────────────────────────────────────────────
    /// The conversion engine could not be started or failed its version check.
    #[error("Conversion engine '{engine}' is not available: {reason}\nInstall it or point --engine at an executable.")]
    EngineUnavailable { engine: String, reason: String },

    /// The engine did not finish within the configured timeout.
    #[error("Conversion timed out after {secs}s")]
    ConversionTimeout { secs: u64 },

    /// The engine exited with a non-zero status.
    #[error("Conversion failed: {message}")]
    ConversionFailed { message: String },

    // ── Storage errors ────────────────────────────────────────────────────
    /// An extracted asset could not be written to the asset store.
    #[error("Failed to store asset '{key}': {reason}")]
    StorageWriteFailed { key: String, reason: String },

    /// Could not create or write an output file (HTML, manifest, preview).
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The document record store could not be read or written.
    #[error("Document store error for '{doc_id}': {reason}")]
    DocumentStoreFailed { doc_id: String, reason: String },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Fei2HtmlError {
    /// Whether repeating the same request could plausibly succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Fei2HtmlError::ConversionTimeout { .. }
                | Fei2HtmlError::EngineUnavailable { .. }
                | Fei2HtmlError::DownloadTimeout { .. }
        )
    }
}
