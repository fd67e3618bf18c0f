//! Conversion engine adapter: run the external document converter.
//!
//! The engine is an external program (Pandoc by default) invoked as
//!
//! ```text
//! <engine> --from docx --to html5 --wrap none --extract-media <dir> [--mathjax] <input>
//! ```
//!
//! It writes the raw HTML fragment to stdout and every embedded image under
//! `<dir>`. Each failure mode maps to its own [`Fei2HtmlError`] variant so
//! callers can tell a missing engine (retry after install) from a document
//! the engine rejected (do not retry).
//!
//! The child is spawned with `kill_on_drop`, so when the timeout elapses the
//! pending future is dropped, the process is killed, and nothing it produced
//! is returned.

use crate::error::Fei2HtmlError;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info};

/// Upper bound for the `--version` availability check.
pub const VERSION_TIMEOUT: Duration = Duration::from_secs(10);

/// One file the engine extracted from the document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedAsset {
    /// Where the engine wrote the file.
    pub local_path: PathBuf,
    /// File name, used as the display name and the storage key suffix.
    pub name: String,
}

/// Unprocessed engine output.
#[derive(Debug, Clone)]
pub struct RawConversion {
    pub html: String,
    pub assets: Vec<ExtractedAsset>,
    /// Engine identifier recorded in manifests.
    pub engine: String,
}

/// Handle to the external conversion program.
#[derive(Debug, Clone)]
pub struct Engine {
    program: String,
    timeout: Duration,
    mathjax: bool,
}

impl Engine {
    pub fn new(program: impl Into<String>, timeout_secs: u64, mathjax: bool) -> Self {
        Self {
            program: program.into(),
            timeout: Duration::from_secs(timeout_secs),
            mathjax,
        }
    }

    /// Engine identifier: the program's file stem (`/usr/bin/pandoc` → `pandoc`).
    pub fn name(&self) -> String {
        Path::new(&self.program)
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| self.program.clone())
    }

    fn unavailable(&self, reason: impl Into<String>) -> Fei2HtmlError {
        Fei2HtmlError::EngineUnavailable {
            engine: self.program.clone(),
            reason: reason.into(),
        }
    }

    /// Check that the engine can be started; returns the first line of its
    /// `--version` output.
    pub async fn version(&self) -> Result<String, Fei2HtmlError> {
        let child = Command::new(&self.program)
            .arg("--version")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(VERSION_TIMEOUT, child).await {
            Err(_) => {
                return Err(self.unavailable(format!(
                    "version check did not answer within {}s",
                    VERSION_TIMEOUT.as_secs()
                )))
            }
            Ok(Err(e)) => return Err(self.unavailable(e.to_string())),
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            return Err(self.unavailable(format!("version check exited with {}", output.status)));
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let version = stdout.lines().next().unwrap_or("").trim().to_string();
        debug!("Engine '{}' available: {}", self.program, version);
        Ok(version)
    }

    /// Convert `input` to a raw HTML fragment, extracting media into `media_dir`.
    pub async fn convert(&self, input: &Path, media_dir: &Path) -> Result<RawConversion, Fei2HtmlError> {
        if !input.is_file() {
            return Err(Fei2HtmlError::InputNotFound {
                path: input.to_path_buf(),
            });
        }
        self.version().await?;

        tokio::fs::create_dir_all(media_dir)
            .await
            .map_err(|e| Fei2HtmlError::Internal(format!("Failed to create media dir: {}", e)))?;

        let mut cmd = Command::new(&self.program);
        cmd.args(["--from", "docx", "--to", "html5", "--wrap", "none", "--extract-media"])
            .arg(media_dir);
        if self.mathjax {
            cmd.arg("--mathjax");
        }
        cmd.arg(input)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        info!("Running {} on {}", self.name(), input.display());

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Err(_) => {
                return Err(Fei2HtmlError::ConversionTimeout {
                    secs: self.timeout.as_secs(),
                })
            }
            Ok(Err(e)) => return Err(self.unavailable(e.to_string())),
            Ok(Ok(output)) => output,
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            let message = if stderr.is_empty() {
                format!("{} exited with {}", self.name(), output.status)
            } else {
                stderr
            };
            return Err(Fei2HtmlError::ConversionFailed { message });
        }

        let html = String::from_utf8_lossy(&output.stdout).into_owned();

        let dir = media_dir.to_path_buf();
        let assets = tokio::task::spawn_blocking(move || collect_assets(&dir))
            .await
            .map_err(|e| Fei2HtmlError::Internal(format!("Asset scan panicked: {}", e)))?
            .map_err(|e| Fei2HtmlError::Internal(format!("Failed to scan media dir: {}", e)))?;

        debug!("Engine produced {} bytes of HTML and {} assets", html.len(), assets.len());

        Ok(RawConversion {
            html,
            assets,
            engine: self.name(),
        })
    }
}

/// Every regular file under `dir`, recursively, sorted by path.
pub fn collect_assets(dir: &Path) -> std::io::Result<Vec<ExtractedAsset>> {
    let mut files = Vec::new();
    let mut pending = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        for entry in std::fs::read_dir(&current)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_dir() {
                pending.push(entry.path());
            } else if file_type.is_file() {
                files.push(entry.path());
            }
        }
    }
    files.sort();

    Ok(files
        .into_iter()
        .map(|local_path| ExtractedAsset {
            name: local_path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default(),
            local_path,
        })
        .collect())
}
