//! TOML configuration.
//!
//! All recognized options live in one [`Config`] that is loaded and
//! validated once at startup by [`load_config`]. Two environment variables
//! are consulted:
//!
//! | Variable | Effect |
//! |----------|--------|
//! | `OPENAI_API_KEY` | used when `[provider].api_key` is not set |
//! | `PORT` | overrides `[server].bind` with `0.0.0.0:$PORT` |
//!
//! # Example
//!
//! ```toml
//! [[sources]]
//! path = "data/txn_refunds.csv"
//!
//! [[sources]]
//! path = "data/settlement_data.csv"
//! name = "settlements"
//!
//! [retrieval]
//! top_k = 5
//! ```

use anyhow::{bail, Context, Result};
use merchant_insights_core::embedding::DEFAULT_DIMS;
use serde::Deserialize;
use std::path::{Path, PathBuf};

pub const API_KEY_ENV: &str = "OPENAI_API_KEY";
pub const PORT_ENV: &str = "PORT";

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default)]
    pub sources: Vec<SourceConfig>,
    #[serde(default)]
    pub retrieval: RetrievalConfig,
    #[serde(default)]
    pub embedding: EmbeddingConfig,
    #[serde(default)]
    pub completion: CompletionConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ProviderConfig {
    /// Credential for embedding and completion calls.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default = "default_base_url")]
    pub base_url: String,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: default_base_url(),
        }
    }
}

fn default_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

#[derive(Debug, Deserialize, Clone)]
pub struct SourceConfig {
    pub path: PathBuf,
    /// Chunk prefix; defaults to `path` as written.
    #[serde(default)]
    pub name: Option<String>,
}

impl SourceConfig {
    pub fn display_name(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| self.path.display().to_string())
    }
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
    5
}

#[derive(Debug, Deserialize, Clone)]
pub struct EmbeddingConfig {
    #[serde(default = "default_embedding_model")]
    pub model: String,
    #[serde(default = "default_dims")]
    pub dims: usize,
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            model: default_embedding_model(),
            dims: default_dims(),
            batch_size: default_batch_size(),
            timeout_secs: default_timeout_secs(),
        }
    }
}

fn default_embedding_model() -> String {
    "text-embedding-ada-002".to_string()
}
fn default_dims() -> usize {
    DEFAULT_DIMS
}
fn default_batch_size() -> usize {
    1
}
fn default_timeout_secs() -> u64 {
    30
}

#[derive(Debug, Deserialize, Clone)]
pub struct CompletionConfig {
    #[serde(default = "default_completion_model")]
    pub model: String,
    #[serde(default = "default_completion_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for CompletionConfig {
    fn default() -> Self {
        Self {
            model: default_completion_model(),
            timeout_secs: default_completion_timeout_secs(),
        }
    }
}

fn default_completion_model() -> String {
    "gpt-3.5-turbo".to_string()
}
fn default_completion_timeout_secs() -> u64 {
    60
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
        }
    }
}

fn default_bind() -> String {
    "0.0.0.0:5000".to_string()
}

impl Config {
    /// The provider credential.
    ///
    /// Only commands that call the provider need this, so it is checked
    /// separately from [`Config::validate`].
    pub fn require_api_key(&self) -> Result<&str> {
        match self.provider.api_key.as_deref() {
            Some(key) if !key.trim().is_empty() => Ok(key),
            _ => bail!(
                "provider.api_key is not set and {} is not in the environment",
                API_KEY_ENV
            ),
        }
    }

    /// Fill unset options from the environment.
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if self.provider.api_key.is_none() {
            self.provider.api_key = lookup(API_KEY_ENV).filter(|k| !k.trim().is_empty());
        }
        if let Some(port) = lookup(PORT_ENV) {
            self.server.bind = format!("0.0.0.0:{}", port.trim());
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.sources.is_empty() {
            bail!("at least one [[sources]] entry is required");
        }
        for source in &self.sources {
            if source.path.as_os_str().is_empty() {
                bail!("sources.path must not be empty");
            }
        }

        if self.retrieval.top_k < 1 {
            bail!("retrieval.top_k must be >= 1");
        }

        if self.embedding.model.trim().is_empty() {
            bail!("embedding.model must not be empty");
        }
        if self.embedding.dims == 0 {
            bail!("embedding.dims must be > 0");
        }
        if self.embedding.batch_size == 0 {
            bail!("embedding.batch_size must be >= 1");
        }
        if self.embedding.timeout_secs == 0 {
            bail!("embedding.timeout_secs must be > 0");
        }

        if self.completion.model.trim().is_empty() {
            bail!("completion.model must not be empty");
        }
        if self.completion.timeout_secs == 0 {
            bail!("completion.timeout_secs must be > 0");
        }

        if self.server.bind.parse::<std::net::SocketAddr>().is_err() {
            bail!("server.bind is not a valid socket address: '{}'", self.server.bind);
        }

        Ok(())
    }
}

/// Parse TOML, apply environment overrides, and validate.
pub fn parse_config<F>(content: &str, lookup: F) -> Result<Config>
where
    F: Fn(&str) -> Option<String>,
{
    let mut config: Config =
        toml::from_str(content).with_context(|| "Failed to parse config file")?;
    config.apply_env(lookup);
    config.validate()?;
    Ok(config)
}

pub fn load_config(path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    parse_config(&content, |key| std::env::var(key).ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env(_: &str) -> Option<String> {
        None
    }

    const MINIMAL: &str = r#"
[[sources]]
path = "data/txn_refunds.csv"
"#;

    #[test]
    fn test_minimal_config_defaults() {
        let cfg = parse_config(MINIMAL, no_env).unwrap();
        assert_eq!(cfg.sources.len(), 1);
        assert_eq!(cfg.sources[0].display_name(), "data/txn_refunds.csv");
        assert_eq!(cfg.retrieval.top_k, 5);
        assert_eq!(cfg.embedding.model, "text-embedding-ada-002");
        assert_eq!(cfg.embedding.dims, 1536);
        assert_eq!(cfg.embedding.batch_size, 1);
        assert_eq!(cfg.completion.model, "gpt-3.5-turbo");
        assert_eq!(cfg.provider.base_url, "https://api.openai.com/v1");
        assert_eq!(cfg.server.bind, "0.0.0.0:5000");
        assert!(cfg.provider.api_key.is_none());
    }

    #[test]
    fn test_source_name_override() {
        let cfg = parse_config(
            r#"
[[sources]]
path = "data/settlement_data.csv"
name = "settlements"
"#,
            no_env,
        )
        .unwrap();
        assert_eq!(cfg.sources[0].display_name(), "settlements");
    }

    #[test]
    fn test_missing_sources_rejected() {
        let err = parse_config("[retrieval]\ntop_k = 3\n", no_env).unwrap_err();
        assert!(err.to_string().contains("sources"));
    }

    #[test]
    fn test_zero_top_k_rejected() {
        let content = format!("{}\n[retrieval]\ntop_k = 0\n", MINIMAL);
        let err = parse_config(&content, no_env).unwrap_err();
        assert!(err.to_string().contains("top_k"));
    }

    #[test]
    fn test_zero_dims_rejected() {
        let content = format!("{}\n[embedding]\ndims = 0\n", MINIMAL);
        assert!(parse_config(&content, no_env).is_err());
    }

    #[test]
    fn test_bad_bind_rejected() {
        let content = format!("{}\n[server]\nbind = \"not-an-address\"\n", MINIMAL);
        let err = parse_config(&content, no_env).unwrap_err();
        assert!(err.to_string().contains("server.bind"));
    }

    #[test]
    fn test_invalid_toml_rejected() {
        assert!(parse_config("[[sources]\npath=", no_env).is_err());
    }

    #[test]
    fn test_api_key_from_env() {
        let cfg = parse_config(MINIMAL, |key| {
            (key == API_KEY_ENV).then(|| "sk-test".to_string())
        })
        .unwrap();
        assert_eq!(cfg.require_api_key().unwrap(), "sk-test");
    }

    #[test]
    fn test_file_api_key_wins_over_env() {
        let content = format!("[provider]\napi_key = \"sk-file\"\n{}", MINIMAL);
        let cfg = parse_config(&content, |key| {
            (key == API_KEY_ENV).then(|| "sk-env".to_string())
        })
        .unwrap();
        assert_eq!(cfg.require_api_key().unwrap(), "sk-file");
    }

    #[test]
    fn test_missing_api_key_is_reported() {
        let cfg = parse_config(MINIMAL, no_env).unwrap();
        let err = cfg.require_api_key().unwrap_err();
        assert!(err.to_string().contains(API_KEY_ENV));
    }

    #[test]
    fn test_port_env_overrides_bind() {
        let cfg = parse_config(MINIMAL, |key| {
            (key == PORT_ENV).then(|| "8080".to_string())
        })
        .unwrap();
        assert_eq!(cfg.server.bind, "0.0.0.0:8080");
    }
}
