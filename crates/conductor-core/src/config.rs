//! Configuration and data directory management.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::types::Mode;

/// Paths to Conductor data directories.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataPaths {
    /// Root data directory (e.g., `data/`).
    pub root: PathBuf,
    /// Job database directory (`data/jobs/`).
    pub jobs_db: PathBuf,
}

impl DataPaths {
    /// Create data paths from a root directory. Creates directories if needed.
    pub fn new(root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().to_path_buf();
        let paths = Self {
            jobs_db: root.join("jobs"),
            root,
        };
        std::fs::create_dir_all(&paths.jobs_db)?;
        Ok(paths)
    }
}

/// Which job store implementation backs the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Memory,
    Sqlite,
}

impl FromStr for StoreBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" => Ok(Self::Memory),
            "sqlite" => Ok(Self::Sqlite),
            other => Err(Error::Config(format!("unknown store backend '{}'", other))),
        }
    }
}

/// Top-level Conductor configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConductorConfig {
    /// HTTP server port.
    pub port: u16,
    /// Data directory paths (`None` for the memory store).
    pub data_paths: Option<DataPaths>,
    pub store_backend: StoreBackend,
    /// Promoter deadline before a request is answered with `accepted`.
    pub sync_deadline_ms: u64,
    /// Backend chosen for `auto` when no routing rule matches.
    pub default_mode: Mode,
    /// Base URL that flow webhook paths are appended to.
    pub flow_webhook_base: String,
    pub flow_timeout_secs: u64,
    pub callback_timeout_secs: u64,
    pub callback_max_attempts: u32,
    /// First retry delay; doubled on each further attempt.
    pub callback_backoff_ms: u64,
    /// Enables callback signing when set.
    pub hmac_secret: Option<String>,
    pub hmac_header: String,
    /// Terminal jobs older than this are purged. 0 keeps them forever.
    pub job_retention_hours: u64,
}

impl Default for ConductorConfig {
    fn default() -> Self {
        Self {
            port: 8080,
            data_paths: None,
            store_backend: StoreBackend::Memory,
            sync_deadline_ms: 8_000,
            default_mode: Mode::Flow,
            flow_webhook_base: "http://n8n:5678/webhook".to_string(),
            flow_timeout_secs: 120,
            callback_timeout_secs: 15,
            callback_max_attempts: 3,
            callback_backoff_ms: 500,
            hmac_secret: None,
            hmac_header: "X-Signature".to_string(),
            job_retention_hours: 24,
        }
    }
}

impl ConductorConfig {
    /// Create configuration from environment and defaults.
    pub fn from_env(data_dir: impl AsRef<Path>) -> Result<Self> {
        Self::from_lookup(data_dir, |key| std::env::var(key).ok())
    }

    /// Like [`ConductorConfig::from_env`], reading variables through `var`.
    pub fn from_lookup<F>(data_dir: impl AsRef<Path>, var: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let store_backend = match var("CONDUCTOR_STORE") {
            Some(v) => v.parse()?,
            None => StoreBackend::Sqlite,
        };
        let data_paths = match store_backend {
            StoreBackend::Sqlite => Some(DataPaths::new(data_dir)?),
            StoreBackend::Memory => None,
        };

        let default_mode = match var("DEFAULT_MODE") {
            Some(v) => Mode::parse(v.trim())
                .ok_or_else(|| Error::Config(format!("DEFAULT_MODE: unknown mode '{}'", v)))?,
            None => defaults.default_mode,
        };

        let hmac_secret = var("HMAC_SECRET").filter(|s| !s.is_empty());
        let parse = |key: &str, default: u64| parse_var(key, var(key), default);

        Ok(Self {
            port: parse_var("PORT", var("PORT"), defaults.port)?,
            data_paths,
            store_backend,
            sync_deadline_ms: parse("SYNC_DEADLINE_MS", defaults.sync_deadline_ms)?,
            default_mode,
            flow_webhook_base: var("N8N_WEBHOOK_BASE").unwrap_or(defaults.flow_webhook_base),
            flow_timeout_secs: parse("FLOW_TIMEOUT_SECS", defaults.flow_timeout_secs)?,
            callback_timeout_secs: parse("CALLBACK_TIMEOUT_SECS", defaults.callback_timeout_secs)?,
            callback_max_attempts: parse_var(
                "CALLBACK_MAX_ATTEMPTS",
                var("CALLBACK_MAX_ATTEMPTS"),
                defaults.callback_max_attempts,
            )?,
            callback_backoff_ms: parse("CALLBACK_BACKOFF_MS", defaults.callback_backoff_ms)?,
            hmac_secret,
            hmac_header: var("HMAC_HEADER").unwrap_or(defaults.hmac_header),
            job_retention_hours: parse("JOB_RETENTION_HOURS", defaults.job_retention_hours)?,
        })
    }

    pub fn sync_deadline(&self) -> Duration {
        Duration::from_millis(self.sync_deadline_ms)
    }

    pub fn flow_timeout(&self) -> Duration {
        Duration::from_secs(self.flow_timeout_secs)
    }

    pub fn callback_timeout(&self) -> Duration {
        Duration::from_secs(self.callback_timeout_secs)
    }

    pub fn callback_backoff(&self) -> Duration {
        Duration::from_millis(self.callback_backoff_ms)
    }

    /// Retention window, or `None` when purging is disabled.
    pub fn job_retention(&self) -> Option<Duration> {
        (self.job_retention_hours > 0)
            .then(|| Duration::from_secs(self.job_retention_hours * 3600))
    }
}

fn parse_var<T: FromStr>(key: &str, raw: Option<String>, default: T) -> Result<T> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|_| Error::Config(format!("{}: invalid value '{}'", key, raw))),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = ConductorConfig::default();
        assert_eq!(config.sync_deadline(), Duration::from_secs(8));
        assert_eq!(config.default_mode, Mode::Flow);
        assert_eq!(config.callback_max_attempts, 3);
        assert_eq!(config.job_retention(), Some(Duration::from_secs(24 * 3600)));
    }

    #[test]
    fn test_retention_disabled() {
        let config = ConductorConfig {
            job_retention_hours: 0,
            ..Default::default()
        };
        assert!(config.job_retention().is_none());
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("SQLite".parse::<StoreBackend>().unwrap(), StoreBackend::Sqlite);
        assert_eq!(" memory ".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert!(matches!(
            "redis".parse::<StoreBackend>(),
            Err(Error::Config(_))
        ));
    }

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: std::collections::HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_from_lookup_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let config = ConductorConfig::from_lookup(
            dir.path(),
            lookup(&[
                ("SYNC_DEADLINE_MS", " 250 "),
                ("DEFAULT_MODE", "agent"),
                ("HMAC_SECRET", ""),
                ("CALLBACK_MAX_ATTEMPTS", "5"),
            ]),
        )
        .unwrap();
        assert_eq!(config.sync_deadline(), Duration::from_millis(250));
        assert_eq!(config.default_mode, Mode::Agent);
        assert_eq!(config.callback_max_attempts, 5);
        assert!(config.hmac_secret.is_none());
        assert_eq!(config.store_backend, StoreBackend::Sqlite);
        assert!(config.data_paths.unwrap().jobs_db.is_dir());
    }

    #[test]
    fn test_from_lookup_rejects_malformed_values() {
        let dir = tempfile::tempdir().unwrap();
        let cases = [
            ("SYNC_DEADLINE_MS", "soon"),
            ("PORT", "99999"),
            ("CALLBACK_MAX_ATTEMPTS", "-1"),
            ("DEFAULT_MODE", "carrier-pigeon"),
            ("CONDUCTOR_STORE", "redis"),
        ];
        for (key, value) in cases {
            let err = ConductorConfig::from_lookup(dir.path(), lookup(&[(key, value)])).unwrap_err();
            match err {
                Error::Config(msg) => assert!(msg.contains(value), "{}: {}", key, msg),
                other => panic!("{}: expected config error, got {:?}", key, other),
            }
        }
    }

    #[test]
    fn test_data_paths_created() {
        let dir = tempfile::tempdir().unwrap();
        let paths = DataPaths::new(dir.path().join("data")).unwrap();
        assert!(paths.jobs_db.is_dir());
    }
}
