//! Configuration management for variant index builds
//!
//! Supports loading configuration from:
//! - Default values
//! - Config file (variants.toml)
//! - Environment variables (VARIANTS__*)
//!
//! ## Example config file (variants.toml):
//! ```toml
//! [build]
//! workers = 8
//! timeout_secs = 600
//! cache_capacity = 20
//! error_policy = "fail-fast"
//!
//! [collect]
//! skip_dirs = ["data-plane", "examples"]
//! readme_name = "readme.md"
//!
//! [output]
//! format = "pretty"
//! ```

use config_crate::{Config, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::cache::DEFAULT_CACHE_CAPACITY;
use crate::error::Result;

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VariantConfig {
    /// Worker pool and deadline settings
    #[serde(default)]
    pub build: BuildConfig,

    /// Spec collection settings
    #[serde(default)]
    pub collect: CollectConfig,

    /// Output settings
    #[serde(default)]
    pub output: OutputConfig,
}

/// Build configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildConfig {
    /// Worker threads; unset means one per available processor
    #[serde(default)]
    pub workers: Option<usize>,

    /// Global deadline for the whole build
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// Number of parsed documents kept in memory
    #[serde(default = "default_cache_capacity")]
    pub cache_capacity: usize,

    /// What to do when a file or reference is broken
    #[serde(default)]
    pub error_policy: ErrorPolicy,
}

/// Handling of parse and reference failures inside workers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum ErrorPolicy {
    /// The first failure aborts the build and no index is produced
    #[default]
    FailFast,
    /// Failing schemas are skipped and reported alongside a partial index
    Collect,
}

/// Spec collection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CollectConfig {
    /// Directory names (case-insensitive) never descended into
    #[serde(default = "default_skip_dirs")]
    pub skip_dirs: Vec<String>,

    /// File name of the per-service configuration document
    #[serde(default = "default_readme_name")]
    pub readme_name: String,
}

/// Output configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output format for JSON
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    #[default]
    Pretty,
    Compact,
}

// Default value functions
fn default_timeout_secs() -> u64 {
    10 * 60
}

fn default_cache_capacity() -> usize {
    DEFAULT_CACHE_CAPACITY
}

fn default_skip_dirs() -> Vec<String> {
    vec!["data-plane".to_string(), "examples".to_string()]
}

fn default_readme_name() -> String {
    "readme.md".to_string()
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            workers: None,
            timeout_secs: default_timeout_secs(),
            cache_capacity: default_cache_capacity(),
            error_policy: ErrorPolicy::FailFast,
        }
    }
}

impl Default for CollectConfig {
    fn default() -> Self {
        Self {
            skip_dirs: default_skip_dirs(),
            readme_name: default_readme_name(),
        }
    }
}

impl BuildConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl VariantConfig {
    /// Load configuration from default locations
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration, layering a specific file over the defaults
    pub fn load_from(config_path: Option<&str>) -> Result<Self> {
        let mut builder = Config::builder();

        let config_locations = ["variants.toml", ".variants.toml", "config/variants.toml"];

        for location in config_locations {
            builder = builder.add_source(File::with_name(location).required(false));
        }

        // XDG config directory
        if let Some(config_dir) = directories::ProjectDirs::from("dev", "swagger", "variants") {
            let xdg_config = config_dir.config_dir().join("variants.toml");
            if xdg_config.exists() {
                builder = builder.add_source(File::from(xdg_config).required(false));
            }
        }

        if let Some(path) = config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // VARIANTS__BUILD__WORKERS=4 etc.
        builder = builder.add_source(
            Environment::with_prefix("VARIANTS")
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true),
        );

        let config = builder.build()?;
        Ok(config.try_deserialize()?)
    }

    /// Save configuration to a file
    pub fn save(&self, path: &str) -> std::io::Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, content)
    }
}
