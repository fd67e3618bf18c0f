//! Input resolution: normalise a user-supplied path or URL to a local file.
//!
//! ## Why download to a temp file?
//!
//! The conversion engine is an external process that only takes a file
//! path. Downloading to a `TempDir` gives it a path to open while ensuring
//! cleanup happens automatically when `ResolvedInput` is dropped, even if
//! the process panics. We validate the ZIP magic bytes (`PK\x03\x04`, every
//! `.docx` is a ZIP container) before returning so callers get a meaningful
//! error rather than an opaque engine failure.

use crate::error::Fei2HtmlError;
use std::io::Read;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tempfile::TempDir;
use tracing::{debug, info};

/// Leading bytes of every ZIP container, `.docx` included.
pub const DOCX_MAGIC: [u8; 4] = *b"PK\x03\x04";

/// The resolved input: either a local path or a downloaded temp file.
pub enum ResolvedInput {
    /// Input was already a local file.
    Local(PathBuf),
    /// Input was a URL; document downloaded to a temp directory.
    /// The `TempDir` is kept alive to prevent cleanup until processing completes.
    Downloaded { path: PathBuf, _temp_dir: TempDir },
}

impl ResolvedInput {
    /// Get the path to the document regardless of how it was resolved.
    pub fn path(&self) -> &Path {
        match self {
            ResolvedInput::Local(p) => p,
            ResolvedInput::Downloaded { path, .. } => path,
        }
    }

    /// File stem of the document, used as the default logical document id.
    pub fn stem(&self) -> String {
        self.path()
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Check if the input string looks like a URL.
pub fn is_url(input: &str) -> bool {
    input.starts_with("http://") || input.starts_with("https://")
}

fn has_docx_extension(path: &Path) -> bool {
    path.extension()
        .map(|e| e.eq_ignore_ascii_case("docx"))
        .unwrap_or(false)
}

fn invalid(input: &str, reason: impl Into<String>) -> Fei2HtmlError {
    Fei2HtmlError::InvalidInput {
        input: input.to_string(),
        reason: reason.into(),
    }
}

/// Resolve the input string to a local `.docx` file path.
///
/// If the input is a URL, download it to a temporary directory.
/// If the input is a local file, validate it exists and is readable.
pub async fn resolve_input(input: &str, timeout_secs: u64) -> Result<ResolvedInput, Fei2HtmlError> {
    if is_url(input) {
        download_url(input, timeout_secs).await
    } else {
        resolve_local(input)
    }
}

/// Refuse anything that does not start like a ZIP container.
fn check_magic(input: &str, head: &[u8]) -> Result<(), Fei2HtmlError> {
    if head.starts_with(&DOCX_MAGIC) {
        Ok(())
    } else {
        Err(invalid(input, "not a ZIP-based .docx document"))
    }
}

/// Resolve a local file path, validating existence and magic bytes.
fn resolve_local(path_str: &str) -> Result<ResolvedInput, Fei2HtmlError> {
    let path = PathBuf::from(path_str);

    if !path.is_file() {
        return Err(Fei2HtmlError::InputNotFound { path });
    }
    if !has_docx_extension(&path) {
        return Err(invalid(path_str, "only .docx documents are supported"));
    }

    let mut head = Vec::with_capacity(DOCX_MAGIC.len());
    std::fs::File::open(&path)
        .and_then(|f| f.take(DOCX_MAGIC.len() as u64).read_to_end(&mut head))
        .map_err(|e| match e.kind() {
            std::io::ErrorKind::PermissionDenied => invalid(path_str, "permission denied"),
            _ => Fei2HtmlError::InputNotFound { path: path.clone() },
        })?;
    check_magic(path_str, &head)?;

    debug!("Resolved local document: {}", path.display());
    Ok(ResolvedInput::Local(path))
}

/// Download `url` into a fresh temp directory.
///
/// The body is checked before anything is written, so a non-document
/// response never reaches the engine.
async fn download_url(url: &str, timeout_secs: u64) -> Result<ResolvedInput, Fei2HtmlError> {
    info!("Downloading document from: {}", url);

    let bytes = fetch(url, timeout_secs)
        .await
        .map_err(|e| download_error(url, timeout_secs, e))?;
    check_magic(url, &bytes)?;

    let temp_dir = tempfile::Builder::new()
        .prefix("fei2html-")
        .tempdir()
        .map_err(|e| Fei2HtmlError::Internal(format!("Failed to create temp dir: {}", e)))?;
    let path = temp_dir.path().join(filename_from_url(url));
    tokio::fs::write(&path, &bytes)
        .await
        .map_err(|e| Fei2HtmlError::Internal(format!("Failed to write temp file: {}", e)))?;

    info!("Downloaded {} bytes to {}", bytes.len(), path.display());
    Ok(ResolvedInput::Downloaded {
        path,
        _temp_dir: temp_dir,
    })
}

async fn fetch(url: &str, timeout_secs: u64) -> Result<Vec<u8>, reqwest::Error> {
    let response = reqwest::Client::builder()
        .timeout(Duration::from_secs(timeout_secs))
        .build()?
        .get(url)
        .send()
        .await?
        .error_for_status()?;
    Ok(response.bytes().await?.to_vec())
}

fn download_error(url: &str, timeout_secs: u64, e: reqwest::Error) -> Fei2HtmlError {
    if e.is_timeout() {
        return Fei2HtmlError::DownloadTimeout {
            url: url.to_string(),
            secs: timeout_secs,
        };
    }
    let reason = match e.status() {
        Some(status) => format!("HTTP {}", status),
        None => e.to_string(),
    };
    Fei2HtmlError::DownloadFailed {
        url: url.to_string(),
        reason,
    }
}

/// Pick a `.docx` file name from the last URL path segment.
fn filename_from_url(url: &str) -> String {
    if let Ok(parsed) = reqwest::Url::parse(url) {
        if let Some(mut segments) = parsed.path_segments() {
            if let Some(last) = segments.next_back() {
                if has_docx_extension(Path::new(last)) {
                    return last.to_string();
                }
            }
        }
    }

    "downloaded.docx".to_string()
}
