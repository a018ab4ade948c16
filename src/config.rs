//! Configuration management for ragserve
//!
//! TOML file at `~/.ragserve/config.toml`, created with defaults on first
//! load. Every section is optional; missing keys take their defaults.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::backends::{OllamaConfig, SearchConfig};
use crate::cache::CacheConfig;
use crate::errors::RagError;
use crate::rag::{ContextConfig, GenerationConfig, PipelineConfig, RagConfig, RetrievalConfig};
use crate::rag::types::{MAX_TOKENS_RANGE, TEMPERATURE_RANGE, TOP_K_RANGE};

/// Longest accepted cache lifetime (30 days)
pub const MAX_TTL_SECS: u64 = 30 * 24 * 3600;

/// Longest accepted phase timeout or request deadline (10 minutes)
pub const MAX_TIMEOUT_MS: u64 = 10 * 60 * 1000;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub cache: CacheConfig,
    pub retrieval: RetrievalConfig,
    pub context: ContextConfig,
    pub generation: GenerationConfig,
    pub pipeline: PipelineConfig,
    pub search: SearchConfig,
    pub ollama: OllamaConfig,
}

impl Config {
    /// Load configuration from `path`, or the default location
    ///
    /// A missing file is created with defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = match path {
            Some(path) => path.to_path_buf(),
            None => Self::config_path()?,
        };

        if !config_path.exists() {
            let config = Config::default();
            config.save_to(&config_path)?;
            return Ok(config);
        }

        let contents = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read config file {}", config_path.display()))?;

        let config: Config = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file {}", config_path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`
    pub fn save_to(&self, path: &Path) -> Result<()> {
        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).context("Failed to create config directory")?;
        }

        let toml_string = self.to_toml()?;
        fs::write(path, toml_string).context("Failed to write config file")?;

        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize config")
    }

    /// Get the default configuration file path
    pub fn config_path() -> Result<PathBuf> {
        let home = dirs::home_dir().context("Could not determine home directory")?;

        Ok(home.join(".ragserve").join("config.toml"))
    }

    /// Reject values the pipeline cannot run with
    pub fn validate(&self) -> std::result::Result<(), RagError> {
        fn bad(msg: impl Into<String>) -> RagError {
            RagError::ConfigError(msg.into())
        }

        if self.cache.capacity == 0 {
            return Err(bad("cache.capacity must be at least 1"));
        }
        for (name, secs) in [
            ("cache.retrieval_ttl_secs", self.cache.retrieval_ttl_secs),
            ("cache.response_ttl_secs", self.cache.response_ttl_secs),
            ("cache.no_results_ttl_secs", self.cache.no_results_ttl_secs),
        ] {
            if secs > MAX_TTL_SECS {
                return Err(bad(format!("{} must be at most {}", name, MAX_TTL_SECS)));
            }
        }
        for (name, ms) in [
            ("retrieval.timeout_ms", self.retrieval.timeout_ms),
            ("generation.timeout_ms", self.generation.timeout_ms),
            ("pipeline.request_deadline_ms", self.pipeline.request_deadline_ms),
        ] {
            if !(1..=MAX_TIMEOUT_MS).contains(&ms) {
                return Err(bad(format!(
                    "{} must be between 1 and {}",
                    name, MAX_TIMEOUT_MS
                )));
            }
        }

        let (k_min, k_max) = TOP_K_RANGE;
        if !(k_min..=k_max).contains(&self.retrieval.top_k) {
            return Err(bad(format!(
                "retrieval.top_k must be between {} and {}",
                k_min, k_max
            )));
        }
        if !(0.0..=1.0).contains(&self.retrieval.min_relevance) {
            return Err(bad("retrieval.min_relevance must be between 0.0 and 1.0"));
        }
        if !(0.0..=1.0).contains(&self.retrieval.weak_match_score) {
            return Err(bad("retrieval.weak_match_score must be between 0.0 and 1.0"));
        }
        if !self.retrieval.weak_match_strength.is_finite() {
            return Err(bad("retrieval.weak_match_strength must be finite"));
        }
        if self.retrieval.max_terms == 0 {
            return Err(bad("retrieval.max_terms must be at least 1"));
        }

        let (t_min, t_max) = TEMPERATURE_RANGE;
        if !(t_min..=t_max).contains(&self.generation.temperature) {
            return Err(bad(format!(
                "generation.temperature must be between {} and {}",
                t_min, t_max
            )));
        }
        let (m_min, m_max) = MAX_TOKENS_RANGE;
        if !(m_min..=m_max).contains(&self.generation.max_tokens) {
            return Err(bad(format!(
                "generation.max_tokens must be between {} and {}",
                m_min, m_max
            )));
        }

        if self.ollama.model.trim().is_empty() {
            return Err(bad("ollama.model must not be empty"));
        }

        Ok(())
    }

    /// Settings consumed by the pipeline
    pub fn rag_config(&self) -> RagConfig {
        RagConfig {
            cache: self.cache.clone(),
            retrieval: self.retrieval.clone(),
            context: self.context.clone(),
            generation: self.generation.clone(),
            pipeline: self.pipeline.clone(),
        }
    }
}
