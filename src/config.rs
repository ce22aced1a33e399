//! Runtime configuration for design-guard.
//!
//! Vendor selection, API keys, model and endpoints all live in one
//! [`AppConfig`], built once at process start and
//! passed by reference into each constructor. Nothing reads the environment
//! after that point, which keeps tests free to inject whatever they like.
//!
//! Use [`AppConfig::from_env`] in binaries and [`AppConfig::builder`] in
//! tests or library integrations.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

/// Default Gemini endpoint root.
pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com";
/// Default OpenAI endpoint root (includes the `/v1` prefix).
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
/// Default Dify API root.
pub const DEFAULT_DIFY_BASE_URL: &str = "https://api.dify.ai/v1";
/// Default number of passages requested from the knowledge base.
pub const DEFAULT_TOP_K: usize = 8;

/// Text-generation backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Vendor {
    /// Google Gemini (default).
    #[default]
    Google,
    /// OpenAI chat completions.
    OpenAi,
}

impl Vendor {
    /// Model used when `LLM_MODEL` is not set.
    pub fn default_model(self) -> &'static str {
        match self {
            Vendor::Google => "gemini-2.0-flash",
            Vendor::OpenAi => "gpt-4.1-nano",
        }
    }

    /// Environment variable holding this vendor's API key.
    pub fn api_key_var(self) -> &'static str {
        match self {
            Vendor::Google => "GEMINI_API_KEY",
            Vendor::OpenAi => "OPENAI_API_KEY",
        }
    }

    /// Provider name understood by `edgequake_llm::ProviderFactory`.
    pub fn provider_name(self) -> &'static str {
        match self {
            Vendor::Google => "gemini",
            Vendor::OpenAi => "openai",
        }
    }
}

impl fmt::Display for Vendor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Vendor::Google => f.write_str("google"),
            Vendor::OpenAi => f.write_str("openai"),
        }
    }
}

impl FromStr for Vendor {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "google" | "gemini" => Ok(Vendor::Google),
            "openai" => Ok(Vendor::OpenAi),
            _ => Err(ConfigError::UnsupportedVendor {
                value: s.to_string(),
            }),
        }
    }
}

/// Dify dataset retrieval settings.
#[derive(Clone)]
pub struct KnowledgeConfig {
    pub api_key: Option<String>,
    pub dataset_id: Option<String>,
    /// API root, e.g. `https://api.dify.ai/v1`.
    pub base_url: String,
    /// Passages requested per query. Default: 8.
    pub top_k: usize,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            dataset_id: None,
            base_url: DEFAULT_DIFY_BASE_URL.to_string(),
            top_k: DEFAULT_TOP_K,
        }
    }
}

impl fmt::Debug for KnowledgeConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("KnowledgeConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("dataset_id", &self.dataset_id)
            .field("base_url", &self.base_url)
            .field("top_k", &self.top_k)
            .finish()
    }
}

/// Process-wide configuration, constructed once.
#[derive(Clone)]
pub struct AppConfig {
    /// Backend used for all text generation.
    pub vendor: Vendor,

    pub gemini_api_key: Option<String>,
    pub openai_api_key: Option<String>,

    /// Model override. `None` means [`Vendor::default_model`].
    pub model: Option<String>,

    pub gemini_base_url: String,
    pub openai_base_url: String,

    pub knowledge: KnowledgeConfig,

    /// Executable used for formats without a native converter. Default: `markitdown`.
    pub markitdown_program: String,

    /// Directory or file of an existing pdfium library. `None` binds to the
    /// system library.
    pub pdfium_lib_path: Option<PathBuf>,

    /// Ask a vision model for a caption when converting images. Default: false.
    pub describe_images: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            vendor: Vendor::default(),
            gemini_api_key: None,
            openai_api_key: None,
            model: None,
            gemini_base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            openai_base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            knowledge: KnowledgeConfig::default(),
            markitdown_program: "markitdown".to_string(),
            pdfium_lib_path: None,
            describe_images: false,
        }
    }
}

impl fmt::Debug for AppConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AppConfig")
            .field("vendor", &self.vendor)
            .field("gemini_api_key", &self.gemini_api_key.as_ref().map(|_| "<redacted>"))
            .field("openai_api_key", &self.openai_api_key.as_ref().map(|_| "<redacted>"))
            .field("model", &self.model)
            .field("gemini_base_url", &self.gemini_base_url)
            .field("openai_base_url", &self.openai_base_url)
            .field("knowledge", &self.knowledge)
            .field("markitdown_program", &self.markitdown_program)
            .field("pdfium_lib_path", &self.pdfium_lib_path)
            .field("describe_images", &self.describe_images)
            .finish()
    }
}

impl AppConfig {
    /// Create a new builder for `AppConfig`.
    pub fn builder() -> AppConfigBuilder {
        AppConfigBuilder {
            config: Self::default(),
        }
    }

    /// Read the configuration from process environment variables.
    ///
    /// Call `dotenv` (or equivalent) first if a `.env` file should count.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build the configuration from an arbitrary key lookup.
    ///
    /// Empty values are treated as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let mut builder = Self::builder();

        if let Some(vendor) = get("AI_VENDOR") {
            builder = builder.vendor(vendor.parse()?);
        }
        if let Some(key) = get("GEMINI_API_KEY") {
            builder = builder.gemini_api_key(key);
        }
        if let Some(key) = get("OPENAI_API_KEY") {
            builder = builder.openai_api_key(key);
        }
        if let Some(model) = get("LLM_MODEL") {
            builder = builder.model(model);
        }
        if let Some(url) = get("GEMINI_BASE_URL") {
            builder = builder.gemini_base_url(url);
        }
        if let Some(url) = get("OPENAI_BASE_URL") {
            builder = builder.openai_base_url(url);
        }
        if let Some(key) = get("DIFY_API_KEY") {
            builder = builder.dify_api_key(key);
        }
        if let Some(id) = get("DIFY_DATASET_ID") {
            builder = builder.dify_dataset_id(id);
        }
        if let Some(url) = get("DIFY_API_URL") {
            builder = builder.dify_base_url(url);
        }
        if let Some(top_k) = get("DIFY_TOP_K") {
            let n = top_k.parse::<usize>().map_err(|_| {
                ConfigError::Invalid(format!("DIFY_TOP_K must be a positive integer, got '{top_k}'"))
            })?;
            builder = builder.top_k(n);
        }
        if let Some(program) = get("MARKITDOWN_BIN") {
            builder = builder.markitdown_program(program);
        }
        if let Some(path) = get("PDFIUM_LIB_PATH") {
            builder = builder.pdfium_lib_path(path);
        }

        builder.build()
    }

    /// Model identifier in effect for the selected vendor.
    pub fn effective_model(&self) -> &str {
        self.model
            .as_deref()
            .unwrap_or_else(|| self.vendor.default_model())
    }

    /// API key for the selected vendor, if configured.
    pub fn vendor_api_key(&self) -> Option<&str> {
        let key = match self.vendor {
            Vendor::Google => self.gemini_api_key.as_deref(),
            Vendor::OpenAi => self.openai_api_key.as_deref(),
        };
        key.filter(|k| !k.is_empty())
    }
}

/// Builder for [`AppConfig`].
#[derive(Debug)]
pub struct AppConfigBuilder {
    config: AppConfig,
}

impl AppConfigBuilder {
    pub fn vendor(mut self, vendor: Vendor) -> Self {
        self.config.vendor = vendor;
        self
    }

    pub fn gemini_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.gemini_api_key = Some(key.into());
        self
    }

    pub fn openai_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.openai_api_key = Some(key.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn gemini_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.gemini_base_url = url.into();
        self
    }

    pub fn openai_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.openai_base_url = url.into();
        self
    }

    pub fn dify_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.knowledge.api_key = Some(key.into());
        self
    }

    pub fn dify_dataset_id(mut self, id: impl Into<String>) -> Self {
        self.config.knowledge.dataset_id = Some(id.into());
        self
    }

    pub fn dify_base_url(mut self, url: impl Into<String>) -> Self {
        self.config.knowledge.base_url = url.into();
        self
    }

    pub fn top_k(mut self, n: usize) -> Self {
        self.config.knowledge.top_k = n;
        self
    }

    pub fn markitdown_program(mut self, program: impl Into<String>) -> Self {
        self.config.markitdown_program = program.into();
        self
    }

    pub fn pdfium_lib_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdfium_lib_path = Some(path.into());
        self
    }

    pub fn describe_images(mut self, v: bool) -> Self {
        self.config.describe_images = v;
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<AppConfig, ConfigError> {
        let c = &self.config;
        if c.knowledge.top_k == 0 {
            return Err(ConfigError::Invalid("top_k must be ≥ 1".into()));
        }
        if c.markitdown_program.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "markitdown program must not be empty".into(),
            ));
        }
        Ok(self.config)
    }
}
