//! TOML configuration.
//!
//! Every section has defaults, so an empty file (or no file at all, see
//! [`load_config_or_default`]) yields a usable configuration that talks to
//! Cohere for chat, OpenAI for embeddings and Google Drive for documents.
//! Secrets are never read from the file; providers look them up in the
//! environment.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::embedding::backoff_delay;

#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub chunking: ChunkingConfig,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub llm: LlmConfig,
    #[serde(default)]
    pub source: SourceConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ChunkingConfig {
    #[serde(default = "default_max_chars")]
    pub max_chars: usize,
    #[serde(default = "default_overlap_chars")]
    pub overlap_chars: usize,
}

impl Default for ChunkingConfig {
    fn default() -> Self {
        Self {
            max_chars: default_max_chars(),
            overlap_chars: default_overlap_chars(),
        }
    }
}

fn default_max_chars() -> usize {
    1000
}
fn default_overlap_chars() -> usize {
    200
}

#[derive(Debug, Deserialize, Clone)]
pub struct RetrievalConfig {
    #[serde(default = "default_top_k")]
    pub top_k: usize,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: default_top_k(),
        }
    }
}

fn default_top_k() -> usize {
    4
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub dims: Option<usize>,
    /// Base URL override (Ollama, or an OpenAI-compatible gateway).
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default)]
    pub max_retries: u32,
    #[serde(default = "default_embedding_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            model: Some("text-embedding-3-small".to_string()),
            dims: Some(1536),
            url: None,
            batch_size: default_batch_size(),
            max_retries: 0,
            timeout_secs: default_embedding_timeout_secs(),
        }
    }
}

impl EmbeddingConfig {
    pub fn is_enabled(&self) -> bool {
        self.provider != "disabled"
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    /// Bound for one embedding call that may be retried: every attempt at
    /// the per-request timeout plus the backoff between them.
    pub fn retry_budget(&self) -> Duration {
        let backoff: Duration = (1..=self.max_retries).map(backoff_delay).sum();
        self.timeout() * (self.max_retries + 1) + backoff
    }
}

fn default_embedding_provider() -> String {
    "openai".to_string()
}
fn default_batch_size() -> usize {
    64
}
fn default_embedding_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default = "default_temperature")]
    pub temperature: f32,
    #[serde(default)]
    pub max_tokens: Option<u32>,
    #[serde(default = "default_llm_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default = "default_stream_idle_timeout_secs")]
    pub stream_idle_timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: None,
            url: None,
            temperature: default_temperature(),
            max_tokens: None,
            timeout_secs: default_llm_timeout_secs(),
            stream_idle_timeout_secs: default_stream_idle_timeout_secs(),
        }
    }
}

impl LlmConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_secs)
    }
}

fn default_llm_provider() -> String {
    "cohere".to_string()
}
fn default_temperature() -> f32 {
    0.3
}
fn default_llm_timeout_secs() -> u64 {
    120
}
fn default_stream_idle_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    #[serde(default = "default_source_provider")]
    pub provider: String,
    #[serde(default = "default_source_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub drive: DriveSourceConfig,
    #[serde(default)]
    pub filesystem: Option<FilesystemSourceConfig>,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            provider: default_source_provider(),
            timeout_secs: default_source_timeout_secs(),
            drive: DriveSourceConfig::default(),
            filesystem: None,
        }
    }
}

impl SourceConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

fn default_source_provider() -> String {
    "drive".to_string()
}
fn default_source_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct DriveSourceConfig {
    #[serde(default = "default_drive_api_base")]
    pub api_base: String,
    /// Environment variable holding an OAuth access token.
    #[serde(default = "default_drive_token_env")]
    pub token_env: String,
    /// Environment variable holding an API key (public folders only).
    #[serde(default = "default_drive_api_key_env")]
    pub api_key_env: String,
    /// Files larger than this are skipped instead of downloaded.
    #[serde(default = "default_max_file_bytes")]
    pub max_file_bytes: u64,
}

impl Default for DriveSourceConfig {
    fn default() -> Self {
        Self {
            api_base: default_drive_api_base(),
            token_env: default_drive_token_env(),
            api_key_env: default_drive_api_key_env(),
            max_file_bytes: default_max_file_bytes(),
        }
    }
}

fn default_drive_api_base() -> String {
    "https://www.googleapis.com/drive/v3".to_string()
}
fn default_drive_token_env() -> String {
    "GOOGLE_DRIVE_ACCESS_TOKEN".to_string()
}
fn default_drive_api_key_env() -> String {
    "GOOGLE_API_KEY".to_string()
}
fn default_max_file_bytes() -> u64 {
    50 * 1024 * 1024
}

#[derive(Debug, Deserialize, Clone)]
pub struct FilesystemSourceConfig {
    /// Directory whose sub-directories are addressed by folder id.
    pub root: PathBuf,
    #[serde(default = "default_include_globs")]
    pub include_globs: Vec<String>,
    #[serde(default)]
    pub exclude_globs: Vec<String>,
    #[serde(default)]
    pub follow_symlinks: bool,
}

fn default_include_globs() -> Vec<String> {
    vec![
        "**/*.md".to_string(),
        "**/*.txt".to_string(),
        "**/*.pdf".to_string(),
        "**/*.docx".to_string(),
        "**/*.pptx".to_string(),
        "**/*.xlsx".to_string(),
    ]
}

#[derive(Debug, Deserialize, Clone)]
pub struct SessionConfig {
    #[serde(default = "default_welcome")]
    pub welcome: String,
    #[serde(default = "default_generate_study_material")]
    pub generate_study_material: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            welcome: default_welcome(),
            generate_study_material: default_generate_study_material(),
        }
    }
}

fn default_welcome() -> String {
    "Hello! Share a folder link and ask me anything about your notes.".to_string()
}
fn default_generate_study_material() -> bool {
    true
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    parse_config(&content)
}

/// Like [`load_config`], but a missing file yields the built-in defaults.
pub fn load_config_or_default(path: &Path) -> Result<Config> {
    if !path.exists() {
        tracing::debug!(path = %path.display(), "config file not found, using defaults");
        let config = Config::default();
        validate(&config)?;
        return Ok(config);
    }
    load_config(path)
}

pub fn parse_config(content: &str) -> Result<Config> {
    let config: Config = toml::from_str(content).with_context(|| "Failed to parse config file")?;
    validate(&config)?;
    Ok(config)
}

fn validate(config: &Config) -> Result<()> {
    // Validate chunking
    if config.chunking.max_chars == 0 {
        bail!("chunking.max_chars must be > 0");
    }
    if config.chunking.overlap_chars >= config.chunking.max_chars {
        bail!("chunking.overlap_chars must be smaller than chunking.max_chars");
    }

    // Validate retrieval
    if config.retrieval.top_k < 1 {
        bail!("retrieval.top_k must be >= 1");
    }

    // Validate embedding
    match config.embedding.provider.as_str() {
        "disabled" | "openai" | "ollama" | "local" => {}
        other => bail!(
            "Unknown embedding provider: '{}'. Must be disabled, openai, ollama, or local.",
            other
        ),
    }
    if matches!(config.embedding.provider.as_str(), "openai" | "ollama") {
        if config.embedding.model.is_none() {
            bail!(
                "embedding.model must be specified when provider is '{}'",
                config.embedding.provider
            );
        }
        if config.embedding.dims.is_none() || config.embedding.dims == Some(0) {
            bail!(
                "embedding.dims must be > 0 when provider is '{}'",
                config.embedding.provider
            );
        }
    }
    if config.embedding.batch_size == 0 {
        bail!("embedding.batch_size must be > 0");
    }

    // Validate llm
    match config.llm.provider.as_str() {
        "cohere" | "openai" | "ollama" => {}
        other => bail!(
            "Unknown llm provider: '{}'. Must be cohere, openai, or ollama.",
            other
        ),
    }
    if config.llm.timeout_secs == 0 || config.llm.stream_idle_timeout_secs == 0 {
        bail!("llm timeouts must be > 0");
    }

    // Validate source
    match config.source.provider.as_str() {
        "drive" => {}
        "filesystem" => {
            if config.source.filesystem.is_none() {
                bail!("source.filesystem.root must be set when provider is 'filesystem'");
            }
        }
        other => bail!(
            "Unknown source provider: '{}'. Must be drive or filesystem.",
            other
        ),
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.chunking.max_chars, 1000);
        assert_eq!(config.chunking.overlap_chars, 200);
        assert_eq!(config.retrieval.top_k, 4);
        assert_eq!(config.llm.provider, "cohere");
        assert_eq!(config.embedding.max_retries, 0);
        assert_eq!(config.source.provider, "drive");
        assert!(config.session.generate_study_material);
    }

    #[test]
    fn overlap_must_be_smaller_than_window() {
        let err = parse_config("[chunking]\nmax_chars = 100\noverlap_chars = 100\n").unwrap_err();
        assert!(err.to_string().contains("overlap_chars"));
    }

    #[test]
    fn unknown_llm_provider_rejected() {
        let err = parse_config("[llm]\nprovider = \"gpt-local\"\n").unwrap_err();
        assert!(err.to_string().contains("Unknown llm provider"));
    }

    #[test]
    fn ollama_embedding_requires_model_and_dims() {
        let err = parse_config("[embedding]\nprovider = \"ollama\"\n").unwrap_err();
        assert!(err.to_string().contains("embedding.model"));

        let ok = parse_config(
            "[embedding]\nprovider = \"ollama\"\nmodel = \"nomic-embed-text\"\ndims = 768\n",
        )
        .unwrap();
        assert_eq!(ok.embedding.dims, Some(768));
    }

    #[test]
    fn filesystem_source_requires_root() {
        let err = parse_config("[source]\nprovider = \"filesystem\"\n").unwrap_err();
        assert!(err.to_string().contains("source.filesystem.root"));

        let ok = parse_config(
            "[source]\nprovider = \"filesystem\"\n\n[source.filesystem]\nroot = \"/tmp/notes\"\n",
        )
        .unwrap();
        let fs = ok.source.filesystem.unwrap();
        assert_eq!(fs.root, PathBuf::from("/tmp/notes"));
        assert!(fs.include_globs.iter().any(|g| g == "**/*.pdf"));
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let config = load_config_or_default(Path::new("/nonexistent/notes.toml")).unwrap();
        assert_eq!(config.retrieval.top_k, 4);
    }

    #[test]
    fn retry_budget_covers_every_attempt() {
        let mut embedding = EmbeddingConfig {
            timeout_secs: 10,
            ..EmbeddingConfig::default()
        };
        assert_eq!(embedding.retry_budget(), Duration::from_secs(10));

        // three attempts, then 1s and 2s of backoff
        embedding.max_retries = 2;
        assert_eq!(embedding.retry_budget(), Duration::from_secs(33));
    }
}
