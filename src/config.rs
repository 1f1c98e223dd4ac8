//! Configuration for briefwire.
//!
//! Configuration sources (highest priority first):
//! 1. Environment variables (BRIEFWIRE_HOME)
//! 2. Config file (.briefwire/config.yaml)
//! 3. Defaults (~/.briefwire)
//!
//! Config file discovery:
//! - Searches current directory and parents for .briefwire/config.yaml
//! - Paths in config file are relative to the config file's parent directory

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::adapters::Recipient;
use crate::core::BackoffPolicy;

/// Global cached configuration (stores Result to handle init errors)
static CONFIG: OnceLock<Result<ResolvedConfig, String>> = OnceLock::new();

/// Raw config file schema (matches YAML structure)
#[derive(Debug, Clone, Deserialize)]
pub struct ConfigFile {
    pub version: String,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub providers: BTreeMap<String, ProviderConfig>,
    #[serde(default)]
    pub fetch: Option<FetchConfig>,
    #[serde(default)]
    pub generator: Option<GeneratorConfig>,
    #[serde(default)]
    pub delivery: Option<DeliveryConfig>,
    #[serde(default)]
    pub alert: Option<AlertConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct PathsConfig {
    /// State directory (relative to config file)
    pub home: Option<String>,
}

/// One provider endpoint, keyed by provider id in the config file.
#[derive(Debug, Clone, Deserialize)]
pub struct ProviderConfig {
    pub url: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FetchConfig {
    pub max_attempts: Option<u32>,
    pub base_delay_ms: Option<u64>,
    pub max_delay_ms: Option<u64>,
    pub multiplier: Option<f64>,
    pub jitter_fraction: Option<f64>,
    pub call_timeout_seconds: Option<u64>,
    pub max_concurrency: Option<usize>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GeneratorConfig {
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub timeout_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DeliveryConfig {
    pub url: String,
    pub recipient: Recipient,
    pub test_recipient: Option<Recipient>,
    pub retry_cooldown_seconds: Option<u64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AlertConfig {
    pub url: String,
}

/// Resolved configuration with absolute paths and defaults applied
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// Absolute path to briefwire home (run state)
    pub home: PathBuf,
    /// Provider id to endpoint mapping
    pub providers: BTreeMap<String, ProviderConfig>,
    /// Retry and concurrency settings for provider calls
    pub fetch: FetchSettings,
    /// Generation subprocess settings
    pub generator: GeneratorSettings,
    /// Delivery endpoint and recipients
    pub delivery: Option<DeliverySettings>,
    /// Alert endpoint, None disables alerting
    pub alert_url: Option<String>,
    /// Path to config file (if found)
    pub config_file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub backoff: BackoffPolicy,
    pub call_timeout: Duration,
    pub max_concurrency: usize,
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            backoff: BackoffPolicy::default(),
            call_timeout: Duration::from_secs(20),
            max_concurrency: 4,
        }
    }
}

#[derive(Debug, Clone)]
pub struct GeneratorSettings {
    pub command: String,
    pub args: Vec<String>,
    pub timeout: Duration,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self {
            command: "briefwire-generate".to_string(),
            args: Vec::new(),
            timeout: Duration::from_secs(120),
        }
    }
}

#[derive(Debug, Clone)]
pub struct DeliverySettings {
    pub url: String,
    pub recipient: Recipient,
    pub test_recipient: Recipient,
    pub retry_cooldown: Duration,
}

impl ResolvedConfig {
    /// Run ledger path ($BRIEFWIRE_HOME/ledger.json)
    pub fn ledger_path(&self) -> PathBuf {
        self.home.join("ledger.json")
    }

    /// Optional pipeline definition override ($BRIEFWIRE_HOME/pipeline.yaml)
    pub fn pipeline_path(&self) -> PathBuf {
        self.home.join("pipeline.yaml")
    }
}

/// Find config file by searching current directory and parents
fn find_config_file() -> Option<PathBuf> {
    let mut current = std::env::current_dir().ok()?;

    loop {
        let config_path = current.join(".briefwire").join("config.yaml");
        if config_path.exists() {
            return Some(config_path);
        }

        if !current.pop() {
            break;
        }
    }

    None
}

/// Load and parse config file
fn load_config_file(path: &Path) -> Result<ConfigFile> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;

    serde_yaml::from_str(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

/// Resolve a path that may be relative to the config file's parent
fn resolve_path(base: &Path, path_str: &str) -> PathBuf {
    let path = PathBuf::from(path_str);
    if path.is_absolute() {
        path
    } else {
        base.join(path)
            .canonicalize()
            .unwrap_or_else(|_| base.join(path_str))
    }
}

fn fetch_settings(config: Option<&FetchConfig>) -> FetchSettings {
    let defaults = FetchSettings::default();
    let Some(config) = config else {
        return defaults;
    };

    FetchSettings {
        backoff: BackoffPolicy {
            max_attempts: config.max_attempts.unwrap_or(defaults.backoff.max_attempts),
            base_delay_ms: config
                .base_delay_ms
                .unwrap_or(defaults.backoff.base_delay_ms),
            max_delay_ms: config.max_delay_ms.unwrap_or(defaults.backoff.max_delay_ms),
            multiplier: config.multiplier.unwrap_or(defaults.backoff.multiplier),
            jitter_fraction: config
                .jitter_fraction
                .unwrap_or(defaults.backoff.jitter_fraction),
        },
        call_timeout: config
            .call_timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(defaults.call_timeout),
        max_concurrency: config.max_concurrency.unwrap_or(defaults.max_concurrency),
    }
}

fn generator_settings(config: Option<&GeneratorConfig>) -> GeneratorSettings {
    let defaults = GeneratorSettings::default();
    let Some(config) = config else {
        return defaults;
    };

    GeneratorSettings {
        command: config.command.clone(),
        args: config.args.clone(),
        timeout: config
            .timeout_seconds
            .map(Duration::from_secs)
            .unwrap_or(defaults.timeout),
    }
}

fn delivery_settings(config: Option<&DeliveryConfig>) -> Option<DeliverySettings> {
    let config = config?;

    Some(DeliverySettings {
        url: config.url.clone(),
        recipient: config.recipient.clone(),
        test_recipient: config
            .test_recipient
            .clone()
            .unwrap_or_else(|| config.recipient.clone()),
        retry_cooldown: Duration::from_secs(config.retry_cooldown_seconds.unwrap_or(30)),
    })
}

/// Load configuration from all sources
fn load_config() -> Result<ResolvedConfig> {
    // Default home directory
    let default_home = dirs::home_dir()
        .context("Failed to determine home directory")?
        .join(".briefwire");

    // Check for config file
    let config_file = find_config_file();

    if let Some(ref config_path) = config_file {
        let config = load_config_file(config_path)?;

        // home is relative to the .briefwire/ directory
        let home = if let Ok(env_home) = std::env::var("BRIEFWIRE_HOME") {
            PathBuf::from(env_home)
        } else if let Some(ref home_path) = config.paths.home {
            let briefwire_dir = config_path.parent().unwrap_or(Path::new("."));
            resolve_path(briefwire_dir, home_path)
        } else {
            default_home
        };

        Ok(ResolvedConfig {
            home,
            providers: config.providers.clone(),
            fetch: fetch_settings(config.fetch.as_ref()),
            generator: generator_settings(config.generator.as_ref()),
            delivery: delivery_settings(config.delivery.as_ref()),
            alert_url: config.alert.map(|a| a.url),
            config_file,
        })
    } else {
        // No config file: env var or default home, everything else default
        let home = std::env::var("BRIEFWIRE_HOME")
            .map(PathBuf::from)
            .unwrap_or(default_home);

        Ok(ResolvedConfig {
            home,
            providers: BTreeMap::new(),
            fetch: FetchSettings::default(),
            generator: GeneratorSettings::default(),
            delivery: None,
            alert_url: None,
            config_file: None,
        })
    }
}

/// Get the global configuration (loads once, then cached)
pub fn config() -> Result<&'static ResolvedConfig> {
    let result = CONFIG.get_or_init(|| load_config().map_err(|e| e.to_string()));

    match result {
        Ok(config) => Ok(config),
        Err(e) => anyhow::bail!("{}", e),
    }
}

/// Force reload configuration (useful for testing)
pub fn reload_config() -> Result<ResolvedConfig> {
    load_config()
}
