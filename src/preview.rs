//! Standalone preview pages.
//!
//! A preview wraps a sanitized fragment in a minimal HTML page so it can be
//! opened straight from `<out_dir>/previews/<doc_id>/index.html` by a static
//! file server. Asset URLs under the configured base path are made relative
//! (`/assets/…` → `../../assets/…`) so the page also works from a copy of
//! the output tree.

use crate::config::ConverterConfig;
use crate::error::Fei2HtmlError;
use crate::output::write_atomic;
use std::path::PathBuf;
use tracing::{debug, info};

const BASE_STYLE: &str = "body { margin: 0; background: #f5f5f5; font-family: -apple-system, BlinkMacSystemFont, 'Segoe UI', Roboto, 'Helvetica Neue', Arial, 'Noto Sans'; }\n      \
.page { max-width: 860px; margin: 24px auto; padding: 16px; background: #fff; box-shadow: 0 1px 4px rgba(0,0,0,.08); }";

/// Where a preview was written and the URL it is served at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreviewInfo {
    pub path: PathBuf,
    pub url: String,
}

/// Point root-relative asset URLs at the asset directory two levels up.
pub fn relativize_asset_urls(fragment: &str, assets_base_url: &str) -> String {
    let base = assets_base_url.trim_end_matches('/');
    if !base.starts_with('/') || base.starts_with("//") {
        return fragment.to_string();
    }
    fragment.replace(
        &format!("src=\"{base}/"),
        &format!("src=\"../..{base}/"),
    )
}

/// Render the full preview page for a sanitized fragment.
pub fn render_page(title: &str, fragment: &str, css_text: &str, assets_base_url: &str) -> String {
    let title = html_escape::encode_text(title);
    // Stylesheet text must not be able to close the style element early.
    let css = css_text.replace("</style", "<\\/style");
    let body = relativize_asset_urls(fragment, assets_base_url);
    format!(
        "<!doctype html>
<html lang=\"zh-CN\">
  <head>
    <meta charset=\"utf-8\" />
    <meta name=\"viewport\" content=\"width=device-width, initial-scale=1\" />
    <title>{title}</title>
    <style>
      {BASE_STYLE}
      {css}
    </style>
  </head>
  <body>
    <div class=\"page\">
      <div style=\"margin-bottom:16px;color:#666;\">{title}</div>
      {body}
    </div>
  </body>
</html>"
    )
}

/// Write the preview page for `doc_id`, returning `None` when the id is empty.
pub async fn write_preview(
    config: &ConverterConfig,
    doc_id: &str,
    title: Option<&str>,
    fragment: &str,
) -> Result<Option<PreviewInfo>, Fei2HtmlError> {
    if doc_id.is_empty() {
        return Ok(None);
    }

    let css_text = match &config.css_path {
        Some(path) => match tokio::fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) => {
                debug!("No preview stylesheet at {}: {}", path.display(), e);
                String::new()
            }
        },
        None => String::new(),
    };

    let page = render_page(
        title.unwrap_or(doc_id),
        fragment,
        &css_text,
        &config.assets_base_url,
    );
    let path = config.previews_dir().join(doc_id).join("index.html");
    write_atomic(&path, page.as_bytes()).await?;

    let out_name = config
        .out_dir
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "out".to_string());
    let url = format!("/{out_name}/previews/{doc_id}/");

    info!("Preview written to {}", path.display());
    Ok(Some(PreviewInfo { path, url }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_relativize_asset_urls() {
        assert_eq!(
            relativize_asset_urls("<img src=\"/assets/d/a.png\"><img src=\"/other/b.png\">", "/assets"),
            "<img src=\"../../assets/d/a.png\"><img src=\"/other/b.png\">"
        );
        assert_eq!(
            relativize_asset_urls("<img src=\"/assets/d/a.png\">", "/assets/"),
            "<img src=\"../../assets/d/a.png\">"
        );
    }

    #[test]
    fn test_absolute_base_left_alone() {
        let fragment = "<img src=\"https://cdn.test/assets/a.png\">";
        assert_eq!(relativize_asset_urls(fragment, "https://cdn.test/assets"), fragment);
    }

    #[test]
    fn test_title_is_escaped() {
        let page = render_page("<b>R&D</b>", "<p>x</p>", "", "/assets");
        assert!(page.contains("<title>&lt;b&gt;R&amp;D&lt;/b&gt;</title>"), "page: {page}");
        assert!(page.contains("<p>x</p>"));
    }

    #[test]
    fn test_css_cannot_close_style() {
        let page = render_page("t", "", "p{}</style><script>x()</script>", "/assets");
        assert!(!page.contains("</style><script>"));
    }

    #[tokio::test]
    async fn test_write_preview_layout() {
        let dir = tempfile::tempdir().unwrap();
        let css = dir.path().join("article.css");
        std::fs::write(&css, ".lark-article h2 { color: #123456; }").unwrap();
        let config = ConverterConfig::builder()
            .out_dir(dir.path().join("out"))
            .css_path(&css)
            .build()
            .unwrap();

        let info = write_preview(&config, "doc1", None, "<div class=\"lark-article\"><img src=\"/assets/doc1/a.png\"></div>")
            .await
            .unwrap()
            .unwrap();

        assert_eq!(info.path, dir.path().join("out/previews/doc1/index.html"));
        assert_eq!(info.url, "/out/previews/doc1/");
        let page = std::fs::read_to_string(&info.path).unwrap();
        assert!(page.contains("<title>doc1</title>"));
        assert!(page.contains("#123456"));
        assert!(page.contains("src=\"../../assets/doc1/a.png\""));
    }

    #[tokio::test]
    async fn test_empty_doc_id_skipped() {
        let config = ConverterConfig::default();
        assert!(write_preview(&config, "", None, "").await.unwrap().is_none());
    }
}
