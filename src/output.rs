//! Result types returned by the conversion entry points.

use crate::error::Fei2HtmlError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// A finished conversion: sanitized HTML plus where its assets went.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConversionOutput {
    /// Logical document id; also the asset storage namespace.
    pub doc_id: String,
    /// Sanitized fragment, wrapped in the root container.
    pub html: String,
    /// Stored assets in engine extraction order.
    pub assets: Vec<AssetItem>,
    /// Engine that produced the raw HTML.
    pub engine: String,
    pub stats: ConversionStats,
}

impl ConversionOutput {
    /// The persisted `{engine, assets}` view of this conversion.
    pub fn manifest(&self) -> AssetManifest {
        AssetManifest {
            engine: self.engine.clone(),
            assets: self.assets.clone(),
        }
    }
}

/// One stored asset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssetItem {
    pub name: String,
    pub url: String,
}

/// Asset manifest as written to `<doc_id>.assets.json`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AssetManifest {
    pub engine: String,
    pub assets: Vec<AssetItem>,
}

impl AssetManifest {
    pub fn to_json(&self) -> Result<String, Fei2HtmlError> {
        serde_json::to_string_pretty(self)
            .map_err(|e| Fei2HtmlError::Internal(format!("Failed to serialise manifest: {}", e)))
    }
}

/// Timing and size counters for one conversion.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConversionStats {
    /// Number of assets stored.
    pub asset_count: usize,
    /// Size of the raw engine HTML in bytes.
    pub raw_html_bytes: usize,
    /// Size of the sanitized HTML in bytes.
    pub html_bytes: usize,
    pub total_duration_ms: u64,
    pub engine_duration_ms: u64,
    pub upload_duration_ms: u64,
    /// Asset rewriting, structural passes and sanitization together.
    pub postprocess_duration_ms: u64,
}

/// Path of the manifest written next to an HTML output file.
///
/// `out/doc1.html` → `out/doc1.assets.json`
pub fn manifest_path_for(html_path: &Path) -> PathBuf {
    let stem = html_path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    html_path.with_file_name(format!("{stem}.assets.json"))
}

/// Write `contents` to `path` via a sibling temp file and rename.
pub async fn write_atomic(path: &Path, contents: &[u8]) -> Result<(), Fei2HtmlError> {
    let fail = |e: std::io::Error| Fei2HtmlError::OutputWriteFailed {
        path: path.to_path_buf(),
        source: e,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            tokio::fs::create_dir_all(parent).await.map_err(fail)?;
        }
    }

    let mut tmp_name = path.as_os_str().to_owned();
    tmp_name.push(".tmp");
    let tmp_path = PathBuf::from(tmp_name);

    tokio::fs::write(&tmp_path, contents).await.map_err(fail)?;
    tokio::fs::rename(&tmp_path, path).await.map_err(fail)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_manifest_path() {
        assert_eq!(
            manifest_path_for(Path::new("out/doc1.html")),
            PathBuf::from("out/doc1.assets.json")
        );
        assert_eq!(
            manifest_path_for(Path::new("手册.html")),
            PathBuf::from("手册.assets.json")
        );
    }

    #[test]
    fn test_manifest_json_shape() {
        let manifest = AssetManifest {
            engine: "pandoc".into(),
            assets: vec![AssetItem {
                name: "image1.png".into(),
                url: "/assets/doc1/image1.png".into(),
            }],
        };
        let value: serde_json::Value = serde_json::from_str(&manifest.to_json().unwrap()).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "engine": "pandoc",
                "assets": [{"name": "image1.png", "url": "/assets/doc1/image1.png"}]
            })
        );
    }

    #[tokio::test]
    async fn test_write_atomic_creates_parents_and_leaves_no_temp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/out/doc.html");
        write_atomic(&path, b"<p>x</p>").await.unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "<p>x</p>");
        assert!(!dir.path().join("nested/out/doc.html.tmp").exists());
    }
}
