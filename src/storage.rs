//! Durable asset storage.
//!
//! Extracted images must outlive the engine's scratch directory. An
//! [`AssetStore`] takes a local file plus a logical key of the form
//! `<doc_id>/<file name>` and returns the URL the stored copy is served
//! from. Two stores ship with the crate:
//!
//! | Store | Writes to | URL |
//! |-------|-----------|-----|
//! | [`LocalAssetStore`] | `base_dir/key` on disk | `base_url/key` |
//! | [`HttpAssetStore`] | `PUT endpoint/key` | `public_base_url/key` |

use crate::error::Fei2HtmlError;
use std::future::Future;
use std::path::{Component, Path, PathBuf};
use tracing::debug;

/// A place extracted assets can be saved to and served from.
pub trait AssetStore: Send + Sync {
    /// Store `local` under `key` and return its durable URL.
    fn save(&self, local: &Path, key: &str) -> impl Future<Output = Result<String, Fei2HtmlError>> + Send;

    /// Remove everything stored under `namespace/`.
    ///
    /// Stores whose writes replace by key may leave this a no-op.
    fn clear_namespace(&self, namespace: &str) -> impl Future<Output = Result<(), Fei2HtmlError>> + Send {
        let _ = namespace;
        async { Ok(()) }
    }
}

/// Storage key for an asset of document `doc_id`.
pub fn asset_key(doc_id: &str, file_name: &str) -> String {
    format!("{}/{}", doc_id.trim_matches('/'), file_name)
}

/// Join a base URL and a key with exactly one `/` between them.
pub fn join_url(base: &str, key: &str) -> String {
    format!("{}/{}", base.trim_end_matches('/'), key.trim_start_matches('/'))
}

/// Reject keys that would escape the store root.
fn checked_relative(key: &str) -> Result<PathBuf, Fei2HtmlError> {
    let path = Path::new(key);
    let escapes = key.is_empty()
        || path
            .components()
            .any(|c| !matches!(c, Component::Normal(_)));
    if escapes {
        return Err(Fei2HtmlError::StorageWriteFailed {
            key: key.to_string(),
            reason: "key must be a relative path without '.' or '..' segments".into(),
        });
    }
    Ok(path.to_path_buf())
}

// ── Local filesystem ─────────────────────────────────────────────────────

/// Stores assets in a directory served statically under `base_url`.
#[derive(Debug, Clone)]
pub struct LocalAssetStore {
    base_dir: PathBuf,
    base_url: String,
}

impl LocalAssetStore {
    pub fn new(base_dir: impl Into<PathBuf>, base_url: impl Into<String>) -> Self {
        Self {
            base_dir: base_dir.into(),
            base_url: base_url.into(),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }
}

impl AssetStore for LocalAssetStore {
    async fn save(&self, local: &Path, key: &str) -> Result<String, Fei2HtmlError> {
        let dest = self.base_dir.join(checked_relative(key)?);
        let fail = |e: std::io::Error| Fei2HtmlError::StorageWriteFailed {
            key: key.to_string(),
            reason: e.to_string(),
        };

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await.map_err(fail)?;
        }
        tokio::fs::copy(local, &dest).await.map_err(fail)?;

        debug!("Stored {} → {}", local.display(), dest.display());
        Ok(join_url(&self.base_url, key))
    }

    async fn clear_namespace(&self, namespace: &str) -> Result<(), Fei2HtmlError> {
        let dir = self.base_dir.join(checked_relative(namespace)?);
        match tokio::fs::remove_dir_all(&dir).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Fei2HtmlError::StorageWriteFailed {
                key: namespace.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

// ── Remote object storage ────────────────────────────────────────────────

/// Uploads assets with `PUT <endpoint>/<key>` to an object store or CDN origin.
#[derive(Debug, Clone)]
pub struct HttpAssetStore {
    client: reqwest::Client,
    endpoint: String,
    public_base_url: String,
    bearer_token: Option<String>,
}

impl HttpAssetStore {
    /// `endpoint` receives the uploads; `public_base_url` is what readers fetch from.
    pub fn new(endpoint: impl Into<String>, public_base_url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            endpoint: endpoint.into(),
            public_base_url: public_base_url.into(),
            bearer_token: None,
        }
    }

    pub fn with_bearer_token(mut self, token: impl Into<String>) -> Self {
        self.bearer_token = Some(token.into());
        self
    }
}

impl AssetStore for HttpAssetStore {
    async fn save(&self, local: &Path, key: &str) -> Result<String, Fei2HtmlError> {
        checked_relative(key)?;
        let fail = |reason: String| Fei2HtmlError::StorageWriteFailed {
            key: key.to_string(),
            reason,
        };

        let bytes = tokio::fs::read(local).await.map_err(|e| fail(e.to_string()))?;
        let mut request = self
            .client
            .put(join_url(&self.endpoint, key))
            .body(bytes);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| fail(e.to_string()))?;
        if !response.status().is_success() {
            return Err(fail(format!("HTTP {}", response.status())));
        }

        debug!("Uploaded {} as {}", local.display(), key);
        Ok(join_url(&self.public_base_url, key))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    #[test]
    fn test_key_and_url_joining() {
        assert_eq!(asset_key("doc1", "a.png"), "doc1/a.png");
        assert_eq!(join_url("/assets/", "doc1/a.png"), "/assets/doc1/a.png");
        assert_eq!(join_url("https://cdn.test", "/doc1/a.png"), "https://cdn.test/doc1/a.png");
    }

    #[test]
    fn test_escaping_keys_rejected() {
        assert!(checked_relative("../etc/passwd").is_err());
        assert!(checked_relative("/abs/a.png").is_err());
        assert!(checked_relative("doc/../a.png").is_err());
        assert!(checked_relative("").is_err());
        assert!(checked_relative("doc1/a.png").is_ok());
    }

    #[tokio::test]
    async fn test_local_save_and_clear() {
        let root = tempfile::tempdir().unwrap();
        let src = root.path().join("image1.png");
        std::fs::write(&src, b"png-bytes").unwrap();

        let store = LocalAssetStore::new(root.path().join("assets"), "/assets");
        let url = store.save(&src, "doc1/image1.png").await.unwrap();
        assert_eq!(url, "/assets/doc1/image1.png");

        let stored = root.path().join("assets/doc1/image1.png");
        assert_eq!(std::fs::read(&stored).unwrap(), b"png-bytes");

        store.clear_namespace("doc1").await.unwrap();
        assert!(!stored.exists());
        // Clearing twice is fine.
        store.clear_namespace("doc1").await.unwrap();
    }

    #[tokio::test]
    async fn test_local_save_missing_source() {
        let root = tempfile::tempdir().unwrap();
        let store = LocalAssetStore::new(root.path(), "/assets");
        let err = store
            .save(&root.path().join("gone.png"), "doc1/gone.png")
            .await
            .unwrap_err();
        assert!(matches!(err, Fei2HtmlError::StorageWriteFailed { .. }), "got: {err}");
    }

    /// Answer exactly one HTTP request with `status_line`, returning the request head.
    async fn one_shot_server(status_line: &'static str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = Vec::new();
            let mut chunk = [0u8; 1024];
            loop {
                let n = socket.read(&mut chunk).await.unwrap();
                buf.extend_from_slice(&chunk[..n]);
                let text = String::from_utf8_lossy(&buf).to_string();
                if let Some(head_end) = text.find("\r\n\r\n") {
                    let length = text[..head_end]
                        .lines()
                        .find_map(|l| {
                            let lower = l.to_ascii_lowercase();
                            lower
                                .strip_prefix("content-length:")
                                .map(|v| v.trim().parse::<usize>().unwrap())
                        })
                        .unwrap_or(0);
                    if buf.len() >= head_end + 4 + length || n == 0 {
                        break;
                    }
                }
                if n == 0 {
                    break;
                }
            }
            let response = format!("{status_line}\r\ncontent-length: 0\r\nconnection: close\r\n\r\n");
            socket.write_all(response.as_bytes()).await.unwrap();
            String::from_utf8_lossy(&buf).to_string()
        });
        (format!("http://{addr}"), handle)
    }

    #[tokio::test]
    async fn test_http_put_with_token() {
        let (endpoint, server) = one_shot_server("HTTP/1.1 200 OK").await;
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("image1.png");
        std::fs::write(&src, b"abc").unwrap();

        let store = HttpAssetStore::new(endpoint, "https://cdn.test/assets").with_bearer_token("s3cret");
        let url = store.save(&src, "doc1/image1.png").await.unwrap();
        assert_eq!(url, "https://cdn.test/assets/doc1/image1.png");

        let request = server.await.unwrap();
        assert!(request.starts_with("PUT /doc1/image1.png "), "request: {request}");
        assert!(request.to_ascii_lowercase().contains("authorization: bearer s3cret"));
        assert!(request.ends_with("abc"));
    }

    #[tokio::test]
    async fn test_http_error_status_is_storage_failure() {
        let (endpoint, server) = one_shot_server("HTTP/1.1 403 Forbidden").await;
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("image1.png");
        std::fs::write(&src, b"abc").unwrap();

        let store = HttpAssetStore::new(endpoint, "https://cdn.test");
        let err = store.save(&src, "doc1/image1.png").await.unwrap_err();
        assert!(matches!(err, Fei2HtmlError::StorageWriteFailed { .. }), "got: {err}");
        assert!(err.to_string().contains("403"));
        server.await.unwrap();
    }
}
