//! Configuration file handling.
//!
//! This module handles loading and merging configuration from
//! `.qolhistory.toml` files.

use crate::llm::{ClientConfig, Provider};
use crate::regions::Region;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Name of the configuration file looked up in the working directory.
pub const CONFIG_FILE: &str = ".qolhistory.toml";

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,

    /// Model settings.
    #[serde(default)]
    pub model: ModelConfig,

    /// Sampling settings.
    #[serde(default)]
    pub sampling: SamplingConfig,

    /// Regions to estimate, used when no registry file is given.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub regions: Vec<Region>,
}

/// General application settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Aggregated CSV output path.
    #[serde(default = "default_output")]
    pub output: String,

    /// JSON region registry (list of `{region, countries}`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub regions_file: Option<String>,

    /// Enable verbose logging by default.
    #[serde(default)]
    pub verbose: bool,

    /// Number of regions sampled concurrently.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Keep going when a region ends with no usable samples.
    #[serde(default)]
    pub skip_failed_regions: bool,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output: default_output(),
            regions_file: None,
            verbose: false,
            concurrency: default_concurrency(),
            skip_failed_regions: false,
        }
    }
}

fn default_output() -> String {
    "stats.csv".to_string()
}

fn default_concurrency() -> usize {
    1
}

/// LLM model settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// Wire format of the service.
    #[serde(default)]
    pub provider: Provider,

    /// Model identifier.
    #[serde(default = "default_model")]
    pub name: String,

    /// Service base URL; defaults depend on the provider.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub base_url: Option<String>,

    /// Environment variable holding the API key.
    #[serde(default = "default_api_key_env")]
    pub api_key_env: String,

    /// Temperature for generation.
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Retries on transport failure. Malformed replies are never retried.
    #[serde(default)]
    pub retries: usize,

    /// Initial backoff between retries, doubled each attempt.
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            provider: Provider::default(),
            name: default_model(),
            base_url: None,
            api_key_env: default_api_key_env(),
            temperature: default_temperature(),
            timeout_seconds: default_timeout(),
            retries: 0,
            retry_backoff_ms: default_retry_backoff(),
        }
    }
}

fn default_model() -> String {
    "gpt-4.1-mini".to_string()
}

fn default_api_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_temperature() -> f32 {
    0.4
}

fn default_timeout() -> u64 {
    300
}

fn default_retry_backoff() -> u64 {
    2000
}

impl ModelConfig {
    /// Base URL, falling back to the provider's usual endpoint.
    pub fn effective_base_url(&self) -> String {
        self.base_url.clone().unwrap_or_else(|| match self.provider {
            Provider::Openai => "https://api.openai.com/v1".to_string(),
            Provider::Ollama => "http://localhost:11434".to_string(),
        })
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig {
            provider: self.provider,
            base_url: self.effective_base_url(),
            model_name: self.name.clone(),
            temperature: self.temperature,
            timeout_seconds: self.timeout_seconds,
            api_key_env: self.api_key_env.clone(),
        }
    }
}

/// Repeated-sampling settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SamplingConfig {
    /// Independent replies requested per region.
    #[serde(default = "default_repeats")]
    pub repeats: usize,
}

impl Default for SamplingConfig {
    fn default() -> Self {
        Self {
            repeats: default_repeats(),
        }
    }
}

fn default_repeats() -> usize {
    20
}

impl Config {
    /// Load configuration from a file path.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;

        Ok(config)
    }

    /// Try to load configuration from the default location.
    ///
    /// Returns `Ok(None)` if the file doesn't exist, `Err` if it exists but can't be parsed.
    pub fn load_default() -> Result<Option<Self>> {
        let default_path = Path::new(CONFIG_FILE);

        if default_path.exists() {
            Ok(Some(Self::load(default_path)?))
        } else {
            Ok(None)
        }
    }

    /// Merge this configuration with CLI arguments.
    ///
    /// CLI arguments take precedence over config file settings, but only
    /// when they were given explicitly.
    pub fn merge_with_args(&mut self, args: &crate::cli::Args) {
        if let Some(provider) = args.provider {
            self.model.provider = provider;
        }
        if let Some(ref model) = args.model {
            self.model.name = model.clone();
        }
        if let Some(ref base_url) = args.base_url {
            self.model.base_url = Some(base_url.clone());
        }
        if let Some(temperature) = args.temperature {
            self.model.temperature = temperature;
        }
        if let Some(timeout) = args.timeout {
            self.model.timeout_seconds = timeout;
        }
        if let Some(retries) = args.retries {
            self.model.retries = retries;
        }

        if let Some(repeats) = args.repeats {
            self.sampling.repeats = repeats;
        }

        if let Some(ref output) = args.output {
            self.general.output = output.display().to_string();
        }
        if let Some(ref regions_file) = args.regions_file {
            self.general.regions_file = Some(regions_file.display().to_string());
        }
        if let Some(concurrency) = args.concurrency {
            self.general.concurrency = concurrency;
        }

        // Flags always override
        if args.skip_failed_regions {
            self.general.skip_failed_regions = true;
        }
        if args.verbose {
            self.general.verbose = true;
        }
    }

    /// Log level after merging: `--quiet` wins, then `verbose` from either
    /// the flag or the file.
    pub fn log_level(&self, quiet: bool) -> tracing::Level {
        if quiet {
            tracing::Level::ERROR
        } else if self.general.verbose {
            tracing::Level::DEBUG
        } else {
            tracing::Level::INFO
        }
    }

    /// Generate a default configuration file content.
    pub fn default_toml() -> String {
        let config = Config::default();
        toml::to_string_pretty(&config).unwrap_or_else(|_| String::new())
    }
}
