//! Monitor configuration
//!
//! Loaded once at startup from a YAML file (`MONITOR_CONFIG`, default
//! `monitor-config.yaml`) with a handful of environment overrides.

use crate::adapters::inbound::{DEFAULT_JOB_HASH_ENV, DEFAULT_NAMESPACE_PREFIX};
use crate::application::DEFAULT_INTERNAL_PREFIX;
use crate::domain::entities::MonitorRange;
use crate::infrastructure::ScanConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_CONFIG_PATH: &str = "monitor-config.yaml";
pub const CONFIG_PATH_ENV: &str = "MONITOR_CONFIG";
pub const DEFAULT_BASE_DOMAIN: &str = "vmc-ci.devcluster.openshift.com";

/// Startup configuration failure.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read monitor config {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unable to parse monitor config: {0}")]
    Parse(#[from] serde_yaml::Error),
    #[error("invalid monitor config: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
struct ConfigFile {
    #[serde(rename = "monitor-config", default)]
    monitor_config: MonitorConfig,
}

#[derive(Debug, Deserialize, Clone, PartialEq)]
#[serde(rename_all = "kebab-case", default)]
pub struct MonitorConfig {
    // Routing
    pub base_domain: String,
    pub haproxy_header: String,
    pub output_path: String,
    pub monitor_ranges: Vec<MonitorRange>,

    // Probing
    /// Probe timeout in milliseconds
    pub check_timeout: u64,
    pub per_range_concurrency: usize,
    pub range_concurrency: usize,

    // Discovery
    /// Hostname lookup timeout in milliseconds
    pub resolve_timeout: u64,
    /// Seconds between reconciliation passes
    pub reconcile_interval: u64,
    pub internal_prefix: String,
    pub namespace_prefix: String,
    pub job_hash_env: String,

    #[serde(skip)]
    pub debug: bool,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        let scan = ScanConfig::default();
        Self {
            base_domain: DEFAULT_BASE_DOMAIN.to_string(),
            haproxy_header: String::new(),
            output_path: "haproxy.cfg".to_string(),
            monitor_ranges: Vec::new(),
            check_timeout: 2000,
            per_range_concurrency: scan.per_range_concurrency,
            range_concurrency: scan.range_concurrency,
            resolve_timeout: 5000,
            reconcile_interval: 30,
            internal_prefix: DEFAULT_INTERNAL_PREFIX.to_string(),
            namespace_prefix: DEFAULT_NAMESPACE_PREFIX.to_string(),
            job_hash_env: DEFAULT_JOB_HASH_ENV.to_string(),
            debug: false,
        }
    }
}

impl MonitorConfig {
    pub fn check_timeout(&self) -> Duration {
        Duration::from_millis(self.check_timeout)
    }

    pub fn resolve_timeout(&self) -> Duration {
        Duration::from_millis(self.resolve_timeout)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval)
    }

    pub fn scan_config(&self) -> ScanConfig {
        ScanConfig {
            per_range_concurrency: self.per_range_concurrency,
            range_concurrency: self.range_concurrency,
        }
    }

    /// Apply overrides from the process environment.
    pub fn apply_env_overrides(&mut self) {
        self.apply_overrides(|key| std::env::var(key).ok());
    }

    /// Apply overrides from `lookup`. Unparseable numbers keep the file value.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        self.debug = lookup("DEBUG").is_some();

        if let Some(base_domain) = lookup("HAPROXY_DYNA_BASE_DOMAIN") {
            self.base_domain = base_domain;
        }

        if let Some(timeout) = lookup("HAPROXY_DYNA_CHECK_TIMEOUT_MS") {
            self.check_timeout = timeout.parse().unwrap_or(self.check_timeout);
        }

        if let Some(output_path) = lookup("HAPROXY_DYNA_OUTPUT_PATH") {
            self.output_path = output_path;
        }
    }

    /// Reject values the daemon cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.base_domain.trim().is_empty() {
            return Err(ConfigError::Invalid("base-domain is empty".to_string()));
        }
        if self.check_timeout == 0 {
            return Err(ConfigError::Invalid("check-timeout must be positive".to_string()));
        }
        if self.resolve_timeout == 0 {
            return Err(ConfigError::Invalid("resolve-timeout must be positive".to_string()));
        }
        if self.reconcile_interval == 0 {
            return Err(ConfigError::Invalid(
                "reconcile-interval must be positive".to_string(),
            ));
        }
        if self.per_range_concurrency == 0 || self.range_concurrency == 0 {
            return Err(ConfigError::Invalid("concurrency must be positive".to_string()));
        }

        for range in &self.monitor_ranges {
            range
                .address_range()
                .map_err(|e| ConfigError::Invalid(e.to_string()))?;
            if range.monitor_ports.iter().any(|p| p.port == 0) {
                return Err(ConfigError::Invalid(format!(
                    "port 0 in range {}-{}",
                    range.ip_address_start, range.ip_address_end
                )));
            }
        }
        Ok(())
    }
}

/// Config file location: `MONITOR_CONFIG` if set, else the default.
pub fn config_path() -> PathBuf {
    std::env::var(CONFIG_PATH_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from(DEFAULT_CONFIG_PATH))
}

/// Parse YAML text. An empty or absent base domain falls back to the default.
pub fn parse_config(raw: &str) -> Result<MonitorConfig, ConfigError> {
    let file: ConfigFile = serde_yaml::from_str(raw)?;
    let mut cfg = file.monitor_config;
    if cfg.base_domain.is_empty() {
        cfg.base_domain = DEFAULT_BASE_DOMAIN.to_string();
    }
    Ok(cfg)
}

/// Read and parse a config file without environment overrides.
pub fn load_config_from(path: &Path) -> Result<MonitorConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.display().to_string(),
        source,
    })?;
    parse_config(&raw)
}

/// Load, override from the environment and validate.
pub fn load_config() -> Result<MonitorConfig, ConfigError> {
    let mut cfg = load_config_from(&config_path())?;
    cfg.apply_env_overrides();
    cfg.validate()?;
    Ok(cfg)
}
