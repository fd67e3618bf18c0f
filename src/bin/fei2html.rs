//! CLI binary for fei2html.
//!
//! A thin shim over the library crate that maps CLI flags
//! to `ConverterConfig` and prints results.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fei2html::{
    convert, convert_to_file, AssetStore, ConversionOutput, ConverterConfig, FileDocumentStore,
    HttpAssetStore, PublishRequest, Publisher,
};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use std::time::Duration;
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}
fn bold(s: &str) -> String {
    format!("\x1b[1m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Convert to stdout
  fei2html convert 手册.docx

  # Convert to a file (writes report.html and report.assets.json)
  fei2html convert report.docx -o out/report.html

  # Convert from URL with an explicit document id
  fei2html convert https://example.org/files/q3.docx --doc-id q3-report

  # Publish: convert, write preview + manifest, save the document record
  fei2html publish report.docx --title "Q3 Report" --css-version v2

  # Upload assets to an object store instead of public/assets
  fei2html --upload-endpoint https://blob.internal/put --assets-url https://cdn.example.org \
           publish report.docx

  # List and show published documents
  fei2html list
  fei2html show report

OUTPUT LAYOUT (publish):
  public/assets/<doc_id>/...          extracted images (local store)
  out/<doc_id>.assets.json            asset manifest {engine, assets}
  out/previews/<doc_id>/index.html    standalone preview page
  out/documents/<doc_id>.json         document record

ENVIRONMENT VARIABLES:
  FEI2HTML_ENGINE           Conversion engine executable (default: pandoc)
  FEI2HTML_TIMEOUT          Engine timeout in seconds (default: 180)
  FEI2HTML_ASSETS_DIR       Local asset directory (default: public/assets)
  FEI2HTML_ASSETS_URL       Public URL prefix for assets (default: /assets)
  FEI2HTML_OUT_DIR          Output root (default: out)
  FEI2HTML_UPLOAD_TOKEN     Bearer token for --upload-endpoint
  RUST_LOG                  Override log filter (e.g. fei2html=debug)

SETUP:
  Install Pandoc (https://pandoc.org/installing.html) or point --engine at
  any executable that accepts Pandoc's docx→html5 command line.
"#;

/// Convert word-processor documents to web-safe HTML.
#[derive(Parser, Debug)]
#[command(
    name = "fei2html",
    version,
    about = "Convert .docx documents to sanitized, structured HTML",
    long_about = "Convert .docx documents (local files or URLs) to web-safe HTML. The raw \
engine output is restructured (headings, lists, tables, images), image sources are pointed at \
durable storage, and the result is filtered through a strict element/attribute allow-list.",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Conversion engine executable.
    #[arg(long, global = true, env = "FEI2HTML_ENGINE", default_value = "pandoc")]
    engine: String,

    /// Engine timeout in seconds.
    #[arg(long, global = true, env = "FEI2HTML_TIMEOUT", default_value_t = 180)]
    timeout: u64,

    /// Do not ask the engine for MathJax math markup.
    #[arg(long, global = true, env = "FEI2HTML_NO_MATHJAX")]
    no_mathjax: bool,

    /// Directory extracted assets are written to.
    #[arg(long, global = true, env = "FEI2HTML_ASSETS_DIR", default_value = "public/assets")]
    assets_dir: PathBuf,

    /// Public URL prefix assets are served under.
    #[arg(long = "assets-url", global = true, env = "FEI2HTML_ASSETS_URL", default_value = "/assets")]
    assets_url: String,

    /// Upload assets with HTTP PUT to this endpoint instead of --assets-dir.
    #[arg(long, global = true, env = "FEI2HTML_UPLOAD_ENDPOINT")]
    upload_endpoint: Option<String>,

    /// Bearer token sent with asset uploads.
    #[arg(long, global = true, env = "FEI2HTML_UPLOAD_TOKEN", hide_env_values = true)]
    upload_token: Option<String>,

    /// Output root for previews, manifests and document records.
    #[arg(long, global = true, env = "FEI2HTML_OUT_DIR", default_value = "out")]
    out_dir: PathBuf,

    /// Stylesheet injected into preview pages.
    #[arg(long, global = true, env = "FEI2HTML_CSS")]
    css: Option<PathBuf>,

    /// Maximum concurrent asset uploads.
    #[arg(long, global = true, env = "FEI2HTML_UPLOAD_CONCURRENCY", default_value_t = 4)]
    upload_concurrency: usize,

    /// HTTP download timeout in seconds for URL inputs.
    #[arg(long, global = true, env = "FEI2HTML_DOWNLOAD_TIMEOUT", default_value_t = 120)]
    download_timeout: u64,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, global = true, env = "FEI2HTML_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, global = true, env = "FEI2HTML_QUIET")]
    quiet: bool,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Convert one document and print or write the HTML.
    Convert {
        /// Local .docx path or HTTP/HTTPS URL.
        input: String,

        /// Logical document id (default: input file stem).
        #[arg(long)]
        doc_id: Option<String>,

        /// Write HTML here (and the manifest next to it) instead of stdout.
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Print the full conversion result as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Convert a document and save preview, manifest and record.
    Publish {
        /// Local .docx path or HTTP/HTTPS URL.
        input: String,

        /// Logical document id (default: input file stem).
        #[arg(long)]
        doc_id: Option<String>,

        /// Document title shown in the preview.
        #[arg(long)]
        title: Option<String>,

        /// Stylesheet version recorded with the document.
        #[arg(long, default_value = "v1")]
        css_version: String,

        /// Keep previously stored assets of this document.
        #[arg(long)]
        no_overwrite: bool,
    },

    /// List published documents.
    List {
        /// Print as JSON.
        #[arg(long)]
        json: bool,
    },

    /// Print a published document record as JSON.
    Show {
        doc_id: String,
    },
}

impl Command {
    fn wants_json(&self) -> bool {
        match self {
            Command::Convert { json, .. } | Command::List { json } => *json,
            Command::Publish { .. } => false,
            Command::Show { .. } => true,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    // The spinner covers the conversion; INFO logs would tear through it.
    let show_progress = !cli.quiet && !cli.command.wants_json();
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || show_progress {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    let config = build_config(&cli)?;

    match &cli.upload_endpoint {
        Some(endpoint) => {
            let mut store = HttpAssetStore::new(endpoint, &cli.assets_url);
            if let Some(token) = &cli.upload_token {
                store = store.with_bearer_token(token);
            }
            run(&cli, config, store, show_progress).await
        }
        None => {
            let store = config.local_store();
            run(&cli, config, store, show_progress).await
        }
    }
}

/// Map CLI args to `ConverterConfig`.
fn build_config(cli: &Cli) -> Result<ConverterConfig> {
    let mut builder = ConverterConfig::builder()
        .engine(&cli.engine)
        .timeout_secs(cli.timeout)
        .mathjax(!cli.no_mathjax)
        .assets_dir(&cli.assets_dir)
        .assets_base_url(&cli.assets_url)
        .out_dir(&cli.out_dir)
        .upload_concurrency(cli.upload_concurrency)
        .download_timeout_secs(cli.download_timeout);

    if let Some(ref css) = cli.css {
        builder = builder.css_path(css);
    }

    builder.build().context("Invalid configuration")
}

async fn run<S: AssetStore>(cli: &Cli, config: ConverterConfig, store: S, show_progress: bool) -> Result<()> {
    match &cli.command {
        Command::Convert {
            input,
            doc_id,
            output,
            json,
        } => {
            let spinner = show_progress.then(|| new_spinner(format!("Converting {input}…")));
            let result = match output {
                Some(path) => convert_to_file(input, path, doc_id.as_deref(), &config, &store).await,
                None => convert(input, doc_id.as_deref(), &config, &store).await,
            };
            if let Some(bar) = &spinner {
                bar.finish_and_clear();
            }
            let result = result.context("Conversion failed")?;

            if *json {
                let json = serde_json::to_string_pretty(&result).context("Failed to serialise output")?;
                println!("{json}");
            } else if output.is_none() {
                let stdout = io::stdout();
                let mut handle = stdout.lock();
                handle
                    .write_all(result.html.as_bytes())
                    .context("Failed to write to stdout")?;
                handle.write_all(b"\n").ok();
            }

            if !cli.quiet && !*json {
                print_summary(&result, output.as_ref().map(|p| p.display().to_string()));
            }
        }

        Command::Publish {
            input,
            doc_id,
            title,
            css_version,
            no_overwrite,
        } => {
            let publisher = Publisher::new(config, store);
            let request = PublishRequest {
                doc_id: doc_id.clone(),
                title: title.clone(),
                css_version: Some(css_version.clone()),
                overwrite: !no_overwrite,
            };

            let spinner = show_progress.then(|| new_spinner(format!("Publishing {input}…")));
            let outcome = publisher.publish(input, &request).await;
            if let Some(bar) = &spinner {
                bar.finish_and_clear();
            }
            let outcome = outcome.context("Publish failed")?;

            if !cli.quiet {
                eprintln!(
                    "{}  {} '{}'  {} assets  {}ms",
                    green("✔"),
                    if outcome.created { "created" } else { "updated" },
                    bold(&outcome.record.doc_id),
                    outcome.record.asset_manifest.len(),
                    outcome.stats.total_duration_ms,
                );
                if let Some(preview) = &outcome.preview {
                    eprintln!("   preview   {}  {}", preview.path.display(), dim(&preview.url));
                }
                eprintln!("   manifest  {}", outcome.manifest_path.display());
                eprintln!("   sha256    {}", dim(&outcome.record.source_hash));
            }
        }

        Command::List { json } => {
            let documents = FileDocumentStore::new(config.documents_dir());
            let summaries = documents.list().await.context("Failed to list documents")?;
            if *json {
                println!(
                    "{}",
                    serde_json::to_string_pretty(&summaries).context("Failed to serialise list")?
                );
            } else if summaries.is_empty() {
                if !cli.quiet {
                    eprintln!("No documents published under {}", config.documents_dir().display());
                }
            } else {
                for s in &summaries {
                    println!(
                        "{:<32}  {:<8}  {}  {}",
                        s.doc_id,
                        s.engine,
                        &s.source_hash[..s.source_hash.len().min(12)],
                        s.title.as_deref().unwrap_or("")
                    );
                }
            }
        }

        Command::Show { doc_id } => {
            let documents = FileDocumentStore::new(config.documents_dir());
            let record = documents
                .get(doc_id)
                .await
                .context("Failed to read document")?
                .with_context(|| format!("Document '{doc_id}' not found"))?;
            println!(
                "{}",
                serde_json::to_string_pretty(&record).context("Failed to serialise record")?
            );
        }
    }

    Ok(())
}

fn new_spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    bar.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {prefix:.bold}  {msg}  {elapsed:.dim}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏", "⠿"]),
    );
    bar.set_prefix("fei2html");
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(80));
    bar
}

fn print_summary(output: &ConversionOutput, written_to: Option<String>) {
    let target = written_to.map(|p| format!("  →  {}", bold(&p))).unwrap_or_default();
    eprintln!(
        "{}  '{}'  {} assets  {}ms{}",
        green("✔"),
        output.doc_id,
        output.stats.asset_count,
        output.stats.total_duration_ms,
        target,
    );
    eprintln!(
        "   {}",
        dim(&format!(
            "engine {}ms  /  upload {}ms  /  postprocess {}ms",
            output.stats.engine_duration_ms,
            output.stats.upload_duration_ms,
            output.stats.postprocess_duration_ms
        )),
    );
}
