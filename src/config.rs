// src/config.rs

//! Runtime settings: built-in defaults, then an optional TOML file, then
//! `RECONWEB_*` environment variables.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, info};

use crate::core::scanner::host_intel::DEFAULT_SHODAN_URL;
use crate::core::scanner::whois_scanner::{DEFAULT_WHOIS_SERVER, WHOIS_PORT};
use crate::logging::get_data_dir;

const ENV_PREFIX: &str = "RECONWEB_";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid value `{value}` for {key}")]
    InvalidValue { key: String, value: String },

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    File,
    Memory,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerSettings {
    pub bind: SocketAddr,
}

impl Default for ServerSettings {
    fn default() -> Self {
        Self { bind: SocketAddr::from(([127, 0, 0, 1], 5000)) }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ScannerSettings {
    pub nmap_path: String,
    /// 0 disables the limit.
    pub timeout_secs: u64,
}

impl Default for ScannerSettings {
    fn default() -> Self {
        Self { nmap_path: "nmap".to_string(), timeout_secs: 900 }
    }
}

impl ScannerSettings {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LookupSettings {
    pub whois_server: String,
    pub whois_port: u16,
    pub shodan_url: String,
    pub shodan_api_key: Option<String>,
    pub timeout_secs: u64,
}

impl Default for LookupSettings {
    fn default() -> Self {
        Self {
            whois_server: DEFAULT_WHOIS_SERVER.to_string(),
            whois_port: WHOIS_PORT,
            shodan_url: DEFAULT_SHODAN_URL.to_string(),
            shodan_api_key: None,
            timeout_secs: 30,
        }
    }
}

impl LookupSettings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct WorkerSettings {
    pub count: usize,
    pub queue_capacity: usize,
}

impl Default for WorkerSettings {
    fn default() -> Self {
        Self { count: 4, queue_capacity: 64 }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    pub backend: StorageBackend,
    /// Defaults to `<data dir>/results`.
    pub results_dir: Option<PathBuf>,
    /// Unset keeps results forever.
    pub ttl_secs: Option<u64>,
    pub sweep_interval_secs: u64,
}

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            backend: StorageBackend::File,
            results_dir: None,
            ttl_secs: None,
            sweep_interval_secs: 300,
        }
    }
}

impl StorageSettings {
    pub fn results_dir(&self) -> PathBuf {
        self.results_dir.clone().unwrap_or_else(|| get_data_dir().join("results"))
    }

    pub fn ttl(&self) -> Option<Duration> {
        self.ttl_secs.map(Duration::from_secs)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_secs(self.sweep_interval_secs.max(1))
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub server: ServerSettings,
    pub scanner: ScannerSettings,
    pub lookups: LookupSettings,
    pub workers: WorkerSettings,
    pub storage: StorageSettings,
}

impl Settings {
    /// Loads settings from the config file (if any) and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        let explicit = std::env::var(format!("{ENV_PREFIX}CONFIG")).ok().map(PathBuf::from);
        let path = explicit.clone().unwrap_or_else(|| get_data_dir().join("config.toml"));

        let settings = if explicit.is_some() || path.exists() {
            info!(path = %path.display(), "Loading config file.");
            Self::from_file(&path)?
        } else {
            debug!("No config file, using defaults.");
            Self::default()
        };

        let settings = settings.merge_env_from(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Read { path: path.to_path_buf(), source })?;
        Self::from_toml(&content).map_err(|source| ConfigError::Parse { path: path.to_path_buf(), source })
    }

    pub fn from_toml(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Applies `RECONWEB_*` overrides read through `lookup`.
    pub fn merge_env_from<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |name: &str| lookup(&format!("{ENV_PREFIX}{name}"));

        if let Some(v) = var("BIND") {
            self.server.bind = parse_value("BIND", &v)?;
        }
        if let Some(v) = var("NMAP_PATH") {
            self.scanner.nmap_path = v;
        }
        if let Some(v) = var("SCAN_TIMEOUT_SECS") {
            self.scanner.timeout_secs = parse_value("SCAN_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("WORKERS") {
            self.workers.count = parse_value("WORKERS", &v)?;
        }
        if let Some(v) = var("QUEUE_CAPACITY") {
            self.workers.queue_capacity = parse_value("QUEUE_CAPACITY", &v)?;
        }
        if let Some(v) = var("SHODAN_API_KEY").or_else(|| lookup("SHODAN_API_KEY")) {
            self.lookups.shodan_api_key = Some(v);
        }
        if let Some(v) = var("SHODAN_URL") {
            self.lookups.shodan_url = v;
        }
        if let Some(v) = var("WHOIS_SERVER") {
            self.lookups.whois_server = v;
        }
        if let Some(v) = var("LOOKUP_TIMEOUT_SECS") {
            self.lookups.timeout_secs = parse_value("LOOKUP_TIMEOUT_SECS", &v)?;
        }
        if let Some(v) = var("RESULTS_DIR") {
            self.storage.results_dir = Some(PathBuf::from(v));
        }
        if let Some(v) = var("RESULT_TTL_SECS") {
            self.storage.ttl_secs = Some(parse_value("RESULT_TTL_SECS", &v)?);
        }
        if let Some(v) = var("STORAGE") {
            self.storage.backend = match v.to_ascii_lowercase().as_str() {
                "file" => StorageBackend::File,
                "memory" => StorageBackend::Memory,
                _ => return Err(invalid("STORAGE", &v)),
            };
        }

        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers.count == 0 {
            return Err(ConfigError::Invalid("workers.count must be at least 1".into()));
        }
        if self.workers.queue_capacity == 0 {
            return Err(ConfigError::Invalid("workers.queue_capacity must be at least 1".into()));
        }
        if self.scanner.nmap_path.trim().is_empty() {
            return Err(ConfigError::Invalid("scanner.nmap_path must not be empty".into()));
        }
        if self.lookups.timeout_secs == 0 {
            return Err(ConfigError::Invalid("lookups.timeout_secs must be at least 1".into()));
        }
        Ok(())
    }
}

fn invalid(name: &str, value: &str) -> ConfigError {
    ConfigError::InvalidValue { key: format!("{ENV_PREFIX}{name}"), value: value.to_string() }
}

fn parse_value<T: std::str::FromStr>(name: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| invalid(name, value))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> =
            pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_are_valid() {
        let settings = Settings::default();
        settings.validate().unwrap();
        assert_eq!(settings.scanner.nmap_path, "nmap");
        assert_eq!(settings.scanner.timeout(), Some(Duration::from_secs(900)));
        assert_eq!(settings.workers.count, 4);
        assert_eq!(settings.storage.backend, StorageBackend::File);
        assert_eq!(settings.storage.ttl(), None);
    }

    #[test]
    fn toml_overrides_only_what_it_names() {
        let settings = Settings::from_toml(
            r#"
            [server]
            bind = "0.0.0.0:8080"

            [scanner]
            timeout_secs = 0

            [storage]
            backend = "memory"
            ttl_secs = 86400
            "#,
        )
        .unwrap();

        assert_eq!(settings.server.bind.port(), 8080);
        assert_eq!(settings.scanner.timeout(), None);
        assert_eq!(settings.scanner.nmap_path, "nmap");
        assert_eq!(settings.storage.backend, StorageBackend::Memory);
        assert_eq!(settings.storage.ttl(), Some(Duration::from_secs(86400)));
        assert_eq!(settings.workers.queue_capacity, 64);
    }

    #[test]
    fn env_overrides_win() {
        let settings = Settings::default()
            .merge_env_from(env(&[
                ("RECONWEB_BIND", "0.0.0.0:9000"),
                ("RECONWEB_WORKERS", "8"),
                ("RECONWEB_NMAP_PATH", "/usr/local/bin/nmap"),
                ("RECONWEB_STORAGE", "Memory"),
                ("RECONWEB_RESULTS_DIR", "/tmp/results"),
            ]))
            .unwrap();

        assert_eq!(settings.server.bind.port(), 9000);
        assert_eq!(settings.workers.count, 8);
        assert_eq!(settings.scanner.nmap_path, "/usr/local/bin/nmap");
        assert_eq!(settings.storage.backend, StorageBackend::Memory);
        assert_eq!(settings.storage.results_dir(), PathBuf::from("/tmp/results"));
    }

    #[test]
    fn shodan_key_falls_back_to_unprefixed_variable() {
        let settings = Settings::default()
            .merge_env_from(env(&[("SHODAN_API_KEY", "plain")]))
            .unwrap();
        assert_eq!(settings.lookups.shodan_api_key.as_deref(), Some("plain"));

        let settings = Settings::default()
            .merge_env_from(env(&[("SHODAN_API_KEY", "plain"), ("RECONWEB_SHODAN_API_KEY", "prefixed")]))
            .unwrap();
        assert_eq!(settings.lookups.shodan_api_key.as_deref(), Some("prefixed"));
    }

    #[test]
    fn bad_values_are_reported() {
        let err = Settings::default()
            .merge_env_from(env(&[("RECONWEB_WORKERS", "many")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { ref key, .. } if key == "RECONWEB_WORKERS"));

        let mut settings = Settings::default();
        settings.workers.count = 0;
        assert!(settings.validate().is_err());
    }
}
