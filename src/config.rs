//! Configuration for the fill pipeline.
//!
//! All behaviour is controlled through [`FillConfig`], built via its
//! [`FillConfigBuilder`]. The config is loaded once at process start,
//! immutable thereafter, and injected into each request — no stage reads
//! ambient global state (environment variables are consulted only inside
//! provider resolution, before the request's state machine starts).
//!
//! # Design choice: builder over constructor
//! A fifteen-field constructor is unreadable and breaks on every new field.
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest.

use crate::error::Scan2SheetError;
use crate::progress::ProgressCallback;
use crate::registry::TemplateRegistry;
use edgequake_llm::LLMProvider;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Configuration for one pipeline instance.
///
/// Built via [`FillConfig::builder()`] or [`FillConfig::default()`].
///
/// # Example
/// ```rust
/// use scan2sheet::FillConfig;
///
/// let config = FillConfig::builder()
///     .template_dir("formats")
///     .output_dir("outputs")
///     .model("gpt-4o")
///     .build()
///     .unwrap();
/// ```
#[derive(Clone)]
pub struct FillConfig {
    /// Directory holding the template workbooks. Default: `formats`.
    ///
    /// A template id names a file in this directory; a missing file is a
    /// client error, reported before any network call is made.
    pub template_dir: PathBuf,

    /// Directory filled copies are written to. Default: `outputs`.
    ///
    /// Created on demand. The template directory is never written to.
    pub output_dir: PathBuf,

    /// Persist the isolated JSON substring before parsing it. Default: true.
    ///
    /// The artifact lands in `<output_dir>/debug/` under a per-request
    /// name, so evidence of what the model actually said survives a later
    /// normalization failure and repeated requests never clobber each
    /// other.
    pub debug_artifacts: bool,

    /// 1-based row the column labels are written to. Default: 2.
    ///
    /// Row 1 is conventionally the template's merged title banner; the
    /// merged-cell skip rule protects it even if this is misconfigured.
    pub header_row: u32,

    /// 1-based row the first data record is written to. Default: 3.
    ///
    /// Must be greater than `header_row`; validated by `build()`.
    pub first_data_row: u32,

    /// Vision model identifier, e.g. "gpt-4o", "claude-sonnet-4-20250514".
    /// If None, uses the provider default.
    pub model: Option<String>,

    /// Provider name (e.g. "openai", "anthropic", "gemini").
    /// If None along with `provider`, the provider is auto-detected from
    /// the environment.
    pub provider_name: Option<String>,

    /// Pre-constructed provider. Takes precedence over `provider_name`.
    pub provider: Option<Arc<dyn LLMProvider>>,

    /// Sampling temperature for the vision call. Default: 0.0.
    ///
    /// Transcription wants the model deterministic and faithful to the
    /// page. Anything above zero trades accuracy for creativity, which is
    /// exactly wrong here.
    pub temperature: f32,

    /// Maximum tokens the model may generate. Default: 4096.
    ///
    /// A dense register page can run past 2 000 output tokens; setting
    /// this too low silently truncates the JSON array mid-record, which
    /// then fails normalization.
    pub max_tokens: usize,

    /// Timeout for the single vision call in seconds. Default: 120.
    ///
    /// The OCR call is the pipeline's only suspension point and is
    /// single-shot: on timeout the request fails, it is never retried
    /// internally.
    pub api_timeout_secs: u64,

    /// Download timeout for URL inputs in seconds. Default: 120.
    pub download_timeout_secs: u64,

    /// Custom prompt contract. If None, the registry's choice is used.
    pub prompt_override: Option<String>,

    /// Schema/prompt table consulted per request. Default: built-in table.
    pub registry: TemplateRegistry,

    /// Optional per-stage progress events.
    pub progress_callback: Option<ProgressCallback>,
}

impl Default for FillConfig {
    fn default() -> Self {
        Self {
            template_dir: PathBuf::from("formats"),
            output_dir: PathBuf::from("outputs"),
            debug_artifacts: true,
            header_row: 2,
            first_data_row: 3,
            model: None,
            provider_name: None,
            provider: None,
            temperature: 0.0,
            max_tokens: 4096,
            api_timeout_secs: 120,
            download_timeout_secs: 120,
            prompt_override: None,
            registry: TemplateRegistry::builtin(),
            progress_callback: None,
        }
    }
}

impl fmt::Debug for FillConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FillConfig")
            .field("template_dir", &self.template_dir)
            .field("output_dir", &self.output_dir)
            .field("debug_artifacts", &self.debug_artifacts)
            .field("header_row", &self.header_row)
            .field("first_data_row", &self.first_data_row)
            .field("model", &self.model)
            .field("provider_name", &self.provider_name)
            .field("provider", &self.provider.as_ref().map(|_| "<dyn LLMProvider>"))
            .field("temperature", &self.temperature)
            .field("max_tokens", &self.max_tokens)
            .field("api_timeout_secs", &self.api_timeout_secs)
            .field("prompt_override", &self.prompt_override.as_deref().map(|_| "<override>"))
            .finish()
    }
}

impl FillConfig {
    /// Create a new builder for `FillConfig`.
    pub fn builder() -> FillConfigBuilder {
        FillConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`FillConfig`].
#[derive(Debug)]
pub struct FillConfigBuilder {
    config: FillConfig,
}

impl FillConfigBuilder {
    pub fn template_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.template_dir = dir.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    pub fn debug_artifacts(mut self, v: bool) -> Self {
        self.config.debug_artifacts = v;
        self
    }

    pub fn header_row(mut self, row: u32) -> Self {
        self.config.header_row = row.max(1);
        self
    }

    pub fn first_data_row(mut self, row: u32) -> Self {
        self.config.first_data_row = row.max(1);
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = Some(model.into());
        self
    }

    pub fn provider_name(mut self, name: impl Into<String>) -> Self {
        self.config.provider_name = Some(name.into());
        self
    }

    pub fn provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.config.provider = Some(provider);
        self
    }

    pub fn temperature(mut self, t: f32) -> Self {
        self.config.temperature = t.clamp(0.0, 2.0);
        self
    }

    pub fn max_tokens(mut self, n: usize) -> Self {
        self.config.max_tokens = n;
        self
    }

    pub fn api_timeout_secs(mut self, secs: u64) -> Self {
        self.config.api_timeout_secs = secs.max(1);
        self
    }

    pub fn download_timeout_secs(mut self, secs: u64) -> Self {
        self.config.download_timeout_secs = secs.max(1);
        self
    }

    pub fn prompt_override(mut self, prompt: impl Into<String>) -> Self {
        self.config.prompt_override = Some(prompt.into());
        self
    }

    pub fn registry(mut self, registry: TemplateRegistry) -> Self {
        self.config.registry = registry;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<FillConfig, Scan2SheetError> {
        let c = &self.config;
        if c.first_data_row <= c.header_row {
            return Err(Scan2SheetError::InvalidConfig(format!(
                "first_data_row ({}) must be greater than header_row ({})",
                c.first_data_row, c.header_row
            )));
        }
        if c.max_tokens == 0 {
            return Err(Scan2SheetError::InvalidConfig(
                "max_tokens must be ≥ 1".into(),
            ));
        }
        Ok(self.config)
    }
}
