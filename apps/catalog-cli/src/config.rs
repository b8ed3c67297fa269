//! Centralized configuration for catalog-cli.
//!
//! All environment variables are loaded and validated at startup so a typo
//! in `STORAGE_PROVIDER` fails before any record is touched.

use std::env;
use std::fmt;
use std::path::PathBuf;

use domain::Role;

/// Storage backend provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StorageProvider {
    /// In-memory storage (data lost on exit)
    Memory,
    /// SQLite file-based storage
    Sqlite,
}

impl StorageProvider {
    fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("sqlite") {
            Some(Self::Sqlite)
        } else if s.eq_ignore_ascii_case("memory") {
            Some(Self::Memory)
        } else {
            None
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogFormat {
    Pretty,
    Json,
}

impl LogFormat {
    fn parse(s: &str) -> Option<Self> {
        if s.eq_ignore_ascii_case("json") {
            Some(Self::Json)
        } else if s.eq_ignore_ascii_case("pretty") {
            Some(Self::Pretty)
        } else {
            None
        }
    }
}

/// Configuration error.
#[derive(Debug)]
pub struct ConfigError {
    pub field: &'static str,
    pub message: String,
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Configuration error for {}: {}", self.field, self.message)
    }
}

impl std::error::Error for ConfigError {}

/// CLI configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub storage_provider: StorageProvider,
    /// SQLite database path (default `./data/catalog.db`)
    pub db_path: PathBuf,
    pub log_format: LogFormat,
    /// Default acting user name
    pub user: String,
    /// Default acting role
    pub role: Role,
    /// Instructor names known to the `memory` storage mode
    pub instructors: Vec<String>,
}

impl Config {
    /// Load and validate configuration from environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    fn from_lookup<F>(get: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let raw = get("STORAGE_PROVIDER").unwrap_or_else(|| "sqlite".into());
        let storage_provider = StorageProvider::parse(&raw).ok_or_else(|| ConfigError {
            field: "STORAGE_PROVIDER",
            message: format!("expected 'memory' or 'sqlite', got '{raw}'"),
        })?;

        let db_path = get("DB_PATH")
            .filter(|s| !s.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("./data/catalog.db"));

        let raw = get("LOG_FORMAT").unwrap_or_else(|| "pretty".into());
        let log_format = LogFormat::parse(&raw).ok_or_else(|| ConfigError {
            field: "LOG_FORMAT",
            message: format!("expected 'pretty' or 'json', got '{raw}'"),
        })?;

        let user = get("CATALOG_USER")
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "admin".into());

        let raw = get("CATALOG_ROLE").unwrap_or_else(|| "Admin".into());
        let role = Role::parse(&raw).ok_or_else(|| ConfigError {
            field: "CATALOG_ROLE",
            message: format!("unknown role '{raw}'"),
        })?;

        let instructors = get("CATALOG_INSTRUCTORS")
            .map(|s| {
                s.split(';')
                    .map(str::trim)
                    .filter(|n| !n.is_empty())
                    .map(String::from)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            storage_provider,
            db_path,
            log_format,
            user,
            role,
            instructors,
        })
    }

    /// Log warnings about configuration that silently discards data.
    pub fn warn_if_ephemeral(&self) {
        if self.storage_provider == StorageProvider::Memory {
            tracing::warn!("STORAGE_PROVIDER=memory: changes are discarded when the command exits");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn storage_provider_parsing() {
        assert_eq!(StorageProvider::parse("memory"), Some(StorageProvider::Memory));
        assert_eq!(StorageProvider::parse("sqlite"), Some(StorageProvider::Sqlite));
        assert_eq!(StorageProvider::parse("SQLITE"), Some(StorageProvider::Sqlite));
        assert_eq!(StorageProvider::parse("dynamo"), None);
    }

    #[test]
    fn log_format_parsing() {
        assert_eq!(LogFormat::parse("pretty"), Some(LogFormat::Pretty));
        assert_eq!(LogFormat::parse("JSON"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("yaml"), None);
    }

    #[test]
    fn defaults() {
        let cfg = load(&[]).unwrap();
        assert_eq!(cfg.storage_provider, StorageProvider::Sqlite);
        assert_eq!(cfg.db_path, PathBuf::from("./data/catalog.db"));
        assert_eq!(cfg.log_format, LogFormat::Pretty);
        assert_eq!(cfg.user, "admin");
        assert_eq!(cfg.role, Role::Admin);
        assert!(cfg.instructors.is_empty());
    }

    #[test]
    fn overrides() {
        let cfg = load(&[
            ("STORAGE_PROVIDER", "memory"),
            ("DB_PATH", "/tmp/x.db"),
            ("LOG_FORMAT", "json"),
            ("CATALOG_USER", " sara "),
            ("CATALOG_ROLE", "instructor"),
            ("CATALOG_INSTRUCTORS", "Dr. Sara Ahmadi; Dr. Li Wei ;"),
        ])
        .unwrap();
        assert_eq!(cfg.storage_provider, StorageProvider::Memory);
        assert_eq!(cfg.db_path, PathBuf::from("/tmp/x.db"));
        assert_eq!(cfg.log_format, LogFormat::Json);
        assert_eq!(cfg.user, "sara");
        assert_eq!(cfg.role, Role::Instructor);
        assert_eq!(cfg.instructors, vec!["Dr. Sara Ahmadi", "Dr. Li Wei"]);
    }

    #[test]
    fn invalid_values_name_the_field() {
        let err = load(&[("STORAGE_PROVIDER", "dynamo")]).unwrap_err();
        assert_eq!(err.field, "STORAGE_PROVIDER");
        let err = load(&[("CATALOG_ROLE", "janitor")]).unwrap_err();
        assert_eq!(err.field, "CATALOG_ROLE");
        assert!(err.to_string().contains("janitor"));
    }
}
