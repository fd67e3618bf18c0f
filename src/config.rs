//! Configuration types for document-to-HTML conversion.
//!
//! Every knob lives in [`ConverterConfig`], built via its
//! [`ConverterConfigBuilder`]. The allow-list policy and the storage root
//! are ordinary fields passed into each conversion rather than process-wide
//! state, so two configurations with different policies can run side by
//! side in the same process.
//!
//! # Design choice: validate at build time
//! The sanitizer is constructed inside [`ConverterConfigBuilder::build`]. A
//! policy that cannot be enforced fails there, before any document is
//! converted, instead of degrading to unsanitized output later.

use crate::error::Fei2HtmlError;
use crate::pipeline::engine::Engine;
use crate::pipeline::sanitize::{AllowListPolicy, Sanitizer};
use crate::storage::LocalAssetStore;
use std::path::{Path, PathBuf};

/// Configuration for a conversion.
///
/// Built via [`ConverterConfig::builder()`] or using
/// [`ConverterConfig::default()`].
///
/// # Example
/// ```rust
/// use fei2html::ConverterConfig;
///
/// let config = ConverterConfig::builder()
///     .timeout_secs(60)
///     .assets_dir("/srv/site/assets")
///     .assets_base_url("https://static.example.org/assets")
///     .build()
///     .unwrap();
/// assert_eq!(config.root_class(), "lark-article");
/// ```
#[derive(Debug, Clone)]
pub struct ConverterConfig {
    /// Conversion engine executable. Default: `pandoc`.
    pub engine: String,

    /// Engine run timeout in seconds. Default: 180.
    ///
    /// A timed-out run is killed and produces no output at all.
    pub timeout_secs: u64,

    /// Ask the engine to emit MathJax-compatible math markup. Default: true.
    pub mathjax: bool,

    /// Directory the local asset store writes into. Default: `public/assets`.
    pub assets_dir: PathBuf,

    /// URL prefix the asset directory is served under. Default: `/assets`.
    pub assets_base_url: String,

    /// Root for previews, manifests and document records. Default: `out`.
    pub out_dir: PathBuf,

    /// Stylesheet injected into preview pages. Default: none.
    pub css_path: Option<PathBuf>,

    /// Maximum concurrent asset uploads. Default: 4.
    pub upload_concurrency: usize,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    sanitizer: Sanitizer,
}

impl Default for ConverterConfig {
    fn default() -> Self {
        Self {
            engine: "pandoc".to_string(),
            timeout_secs: 180,
            mathjax: true,
            assets_dir: PathBuf::from("public/assets"),
            assets_base_url: "/assets".to_string(),
            out_dir: PathBuf::from("out"),
            css_path: None,
            upload_concurrency: 4,
            download_timeout_secs: 120,
            sanitizer: Sanitizer::default(),
        }
    }
}

impl ConverterConfig {
    /// Create a new builder for `ConverterConfig`.
    pub fn builder() -> ConverterConfigBuilder {
        let config = Self::default();
        ConverterConfigBuilder {
            policy: config.sanitizer.policy().clone(),
            root_class: config.sanitizer.root_class().to_string(),
            config,
        }
    }

    /// The validated sanitizer for this configuration.
    pub fn sanitizer(&self) -> &Sanitizer {
        &self.sanitizer
    }

    pub fn policy(&self) -> &AllowListPolicy {
        self.sanitizer.policy()
    }

    pub fn root_class(&self) -> &str {
        self.sanitizer.root_class()
    }

    /// Engine handle carrying this configuration's program, timeout and math flag.
    pub fn engine(&self) -> Engine {
        Engine::new(&self.engine, self.timeout_secs, self.mathjax)
    }

    /// Filesystem asset store rooted at `assets_dir`.
    pub fn local_store(&self) -> LocalAssetStore {
        LocalAssetStore::new(&self.assets_dir, &self.assets_base_url)
    }

    /// Directory holding `<doc_id>/index.html` preview pages.
    pub fn previews_dir(&self) -> PathBuf {
        self.out_dir.join("previews")
    }

    /// Directory holding persisted document records.
    pub fn documents_dir(&self) -> PathBuf {
        self.out_dir.join("documents")
    }

    /// Path of the asset manifest for `doc_id`.
    pub fn manifest_path(&self, doc_id: &str) -> PathBuf {
        self.out_dir.join(format!("{doc_id}.assets.json"))
    }
}

/// Builder for [`ConverterConfig`].
#[derive(Debug)]
pub struct ConverterConfigBuilder {
    config: ConverterConfig,
    policy: AllowListPolicy,
    root_class: String,
}

impl ConverterConfigBuilder {
    pub fn engine(mut self, program: impl Into<String>) -> Self {
        self.config.engine = program.into();
        self
    }

    pub fn timeout_secs(mut self, secs: u64) -> Self {
        self.config.timeout_secs = secs.max(1);
        self
    }

    pub fn mathjax(mut self, v: bool) -> Self {
        self.config.mathjax = v;
        self
    }

    pub fn assets_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.assets_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn assets_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.assets_base_url = url.into();
        self
    }

    pub fn out_dir(mut self, dir: impl AsRef<Path>) -> Self {
        self.config.out_dir = dir.as_ref().to_path_buf();
        self
    }

    pub fn css_path(mut self, path: impl AsRef<Path>) -> Self {
        self.config.css_path = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn upload_concurrency(mut self, n: usize) -> Self {
        self.config.upload_concurrency = n.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn root_class(mut self, class: impl Into<String>) -> Self {
        self.root_class = class.into();
        self
    }

    pub fn policy(mut self, policy: AllowListPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Build the configuration, validating constraints and the sanitizer policy.
    pub fn build(mut self) -> Result<ConverterConfig, Fei2HtmlError> {
        let c = &self.config;
        if c.engine.trim().is_empty() {
            return Err(Fei2HtmlError::InvalidConfig(
                "Engine program must not be empty".into(),
            ));
        }
        if c.assets_base_url.trim().is_empty() {
            return Err(Fei2HtmlError::InvalidConfig(
                "Asset base URL must not be empty".into(),
            ));
        }
        if c.upload_concurrency == 0 {
            return Err(Fei2HtmlError::InvalidConfig(
                "Upload concurrency must be ≥ 1".into(),
            ));
        }
        self.config.sanitizer = Sanitizer::new(self.policy, self.root_class)?;
        Ok(self.config)
    }
}
