//! Conversion entry points.
//!
//! ## Stage order
//!
//! ```text
//! resolve input ─▶ engine ─▶ store assets ─▶ rewrite img src ─▶ structural passes ─▶ sanitize
//! ```
//!
//! Asset URLs are rewritten before the structural passes so every later
//! stage sees durable URLs, and sanitization runs last so nothing a pass
//! emits can bypass the allow-list. The engine's scratch directory is a
//! `TempDir` dropped when [`convert`] returns.

use crate::config::ConverterConfig;
use crate::error::Fei2HtmlError;
use crate::output::{manifest_path_for, write_atomic, AssetItem, ConversionOutput, ConversionStats};
use crate::pipeline::engine::ExtractedAsset;
use crate::pipeline::input::ResolvedInput;
use crate::pipeline::sanitize::Sanitizer;
use crate::pipeline::{assets, input, postprocess};
use crate::storage::{asset_key, AssetStore};
use futures::stream::{self, StreamExt};
use std::collections::HashMap;
use std::path::Path;
use std::time::Instant;
use tracing::{debug, info};

/// Convert a `.docx` file or URL to sanitized HTML.
///
/// This is the primary entry point for the library.
///
/// # Arguments
/// * `input_str`: Local file path or HTTP/HTTPS URL to a `.docx` document
/// * `doc_id`: Logical document id; defaults to the input file stem
/// * `config`: Conversion configuration
/// * `store`: Where extracted assets are saved
///
/// # Errors
/// Every failure is fatal: no HTML is returned unless the engine succeeded
/// and every asset was stored.
pub async fn convert<S: AssetStore>(
    input_str: impl AsRef<str>,
    doc_id: Option<&str>,
    config: &ConverterConfig,
    store: &S,
) -> Result<ConversionOutput, Fei2HtmlError> {
    let total_start = Instant::now();
    let input_str = input_str.as_ref();
    info!("Starting conversion: {}", input_str);

    // ── Step 1: Resolve input ────────────────────────────────────────────
    let resolved = input::resolve_input(input_str, config.download_timeout_secs).await?;
    let doc_id = logical_doc_id(doc_id, &resolved, input_str)?;

    convert_resolved(&resolved, &doc_id, config, store, total_start).await
}

/// The explicit id when given, otherwise the input file stem.
pub(crate) fn logical_doc_id(
    doc_id: Option<&str>,
    resolved: &ResolvedInput,
    input_str: &str,
) -> Result<String, Fei2HtmlError> {
    let doc_id = match doc_id {
        Some(id) if !id.trim().is_empty() => id.trim().to_string(),
        _ => resolved.stem(),
    };
    if doc_id.is_empty() {
        return Err(Fei2HtmlError::InvalidInput {
            input: input_str.to_string(),
            reason: "cannot derive a document id; pass one explicitly".into(),
        });
    }
    Ok(doc_id)
}

/// Steps 2–4 of [`convert`] for an already-resolved input.
pub(crate) async fn convert_resolved<S: AssetStore>(
    resolved: &ResolvedInput,
    doc_id: &str,
    config: &ConverterConfig,
    store: &S,
    total_start: Instant,
) -> Result<ConversionOutput, Fei2HtmlError> {
    // ── Step 2: Run the engine ───────────────────────────────────────────
    let scratch = tempfile::tempdir()
        .map_err(|e| Fei2HtmlError::Internal(format!("Failed to create scratch dir: {}", e)))?;
    let engine_start = Instant::now();
    let raw = config
        .engine()
        .convert(resolved.path(), &scratch.path().join("media"))
        .await?;
    let engine_duration_ms = engine_start.elapsed().as_millis() as u64;
    info!(
        "Engine '{}' finished in {}ms with {} assets",
        raw.engine,
        engine_duration_ms,
        raw.assets.len()
    );

    // ── Step 3: Store assets ─────────────────────────────────────────────
    let upload_start = Instant::now();
    let stored = store_assets(&raw.assets, doc_id, store, config.upload_concurrency).await?;
    let upload_duration_ms = upload_start.elapsed().as_millis() as u64;

    let local_to_url: HashMap<String, String> = raw
        .assets
        .iter()
        .zip(&stored)
        .map(|(asset, item)| (asset.local_path.to_string_lossy().into_owned(), item.url.clone()))
        .collect();

    // ── Step 4: Rewrite, restructure, sanitize ───────────────────────────
    let post_start = Instant::now();
    let html = render_fragment(&raw.html, &local_to_url, config.sanitizer());
    let postprocess_duration_ms = post_start.elapsed().as_millis() as u64;

    let stats = ConversionStats {
        asset_count: stored.len(),
        raw_html_bytes: raw.html.len(),
        html_bytes: html.len(),
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        engine_duration_ms,
        upload_duration_ms,
        postprocess_duration_ms,
    };

    info!(
        "Conversion complete: '{}' → {} bytes, {}ms total",
        doc_id, stats.html_bytes, stats.total_duration_ms
    );

    Ok(ConversionOutput {
        doc_id: doc_id.to_string(),
        html,
        assets: stored,
        engine: raw.engine,
        stats,
    })
}

/// Turn raw engine HTML into the final sanitized fragment.
///
/// Pure and synchronous: asset rewriting, the structural passes, then
/// sanitization.
pub fn render_fragment(
    raw_html: &str,
    local_to_url: &HashMap<String, String>,
    sanitizer: &Sanitizer,
) -> String {
    let rewritten = assets::rewrite_image_sources(raw_html, local_to_url);
    let structured = postprocess::process_all(&rewritten);
    sanitizer.sanitize(&structured)
}

/// Convert a document and write the HTML plus its asset manifest.
///
/// The manifest lands next to the HTML as `<stem>.assets.json`. Both files
/// use atomic writes (temp file + rename) to prevent partial files.
pub async fn convert_to_file<S: AssetStore>(
    input_str: impl AsRef<str>,
    output_path: impl AsRef<Path>,
    doc_id: Option<&str>,
    config: &ConverterConfig,
    store: &S,
) -> Result<ConversionOutput, Fei2HtmlError> {
    let output = convert(input_str, doc_id, config, store).await?;
    let path = output_path.as_ref();

    write_atomic(path, output.html.as_bytes()).await?;
    let manifest_path = manifest_path_for(path);
    write_atomic(&manifest_path, output.manifest().to_json()?.as_bytes()).await?;

    info!(
        "Wrote {} and {}",
        path.display(),
        manifest_path.display()
    );
    Ok(output)
}

/// Synchronous wrapper around [`convert`] using the configured local asset store.
///
/// Creates a temporary tokio runtime internally.
pub fn convert_sync(
    input_str: impl AsRef<str>,
    doc_id: Option<&str>,
    config: &ConverterConfig,
) -> Result<ConversionOutput, Fei2HtmlError> {
    let store = config.local_store();
    tokio::runtime::Runtime::new()
        .map_err(|e| Fei2HtmlError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(convert(input_str, doc_id, config, &store))
}

// ── Internal helpers ─────────────────────────────────────────────────────

/// Save every asset under `<doc_id>/<name>` with at most `concurrency`
/// uploads in flight. Results keep extraction order; the first failure wins.
async fn store_assets<S: AssetStore>(
    extracted: &[ExtractedAsset],
    doc_id: &str,
    store: &S,
    concurrency: usize,
) -> Result<Vec<AssetItem>, Fei2HtmlError> {
    let mut results: Vec<(usize, Result<String, Fei2HtmlError>)> =
        stream::iter(extracted.iter().enumerate().map(|(idx, asset)| async move {
            let key = asset_key(doc_id, &asset.name);
            debug!("Storing asset {} as {}", asset.local_path.display(), key);
            (idx, store.save(&asset.local_path, &key).await)
        }))
        .buffer_unordered(concurrency.max(1))
        .collect()
        .await;

    results.sort_by_key(|(idx, _)| *idx);

    results
        .into_iter()
        .map(|(idx, url)| {
            url.map(|url| AssetItem {
                name: extracted[idx].name.clone(),
                url,
            })
        })
        .collect()
}
