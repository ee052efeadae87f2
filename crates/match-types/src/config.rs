//! Configuration loading for the match index.
//!
//! Layered config: defaults -> config file -> env vars -> CLI flags.
//! The default config file lives at ~/.config/match-index/config.toml.

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::ConfigError;

/// Main application settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Embedding dimension every stored vector must have
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Canonical snapshot file for the vector index
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,

    /// JSON-lines export of the source-of-truth records, one
    /// `{"id": .., "vector": [..]}` per line. Used only for rebuilds.
    #[serde(default)]
    pub records_path: Option<String>,

    /// Whether snapshot writes are fsynced before the rename
    #[serde(default = "default_true")]
    pub fsync: bool,

    /// Result count used when a search does not ask for one
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,

    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

fn default_dimension() -> usize {
    384 // all-MiniLM-L6-v2
}

fn default_snapshot_path() -> String {
    ProjectDirs::from("", "", "match-index")
        .map(|p| p.data_local_dir().join("vectors.index"))
        .unwrap_or_else(|| PathBuf::from("./vectors.index"))
        .to_string_lossy()
        .to_string()
}

fn default_true() -> bool {
    true
}

fn default_top_k() -> usize {
    10
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            snapshot_path: default_snapshot_path(),
            records_path: None,
            fsync: default_true(),
            default_top_k: default_top_k(),
            log_level: default_log_level(),
        }
    }
}

impl Settings {
    /// Load settings with layered precedence:
    /// 1. Built-in defaults
    /// 2. Config file (~/.config/match-index/config.toml)
    /// 3. CLI-specified config file (optional)
    /// 4. Environment variables (MATCH_*, nested keys split on `__`)
    ///
    /// CLI flags should be applied by the caller after this returns.
    pub fn load(cli_config_path: Option<&str>) -> Result<Self, ConfigError> {
        let config_dir = ProjectDirs::from("", "", "match-index")
            .map(|p| p.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("."));

        let default_config_path = config_dir.join("config");

        let mut builder = Config::builder()
            .set_default("dimension", default_dimension() as i64)?
            .set_default("snapshot_path", default_snapshot_path())?
            .set_default("fsync", default_true())?
            .set_default("default_top_k", default_top_k() as i64)?
            .set_default("log_level", default_log_level())?
            .add_source(File::with_name(&default_config_path.to_string_lossy()).required(false));

        if let Some(path) = cli_config_path {
            builder = builder.add_source(File::with_name(path).required(true));
        }

        // MATCH_SNAPSHOT_PATH, MATCH_DIMENSION, MATCH_LOG_LEVEL, ...
        builder = builder.add_source(
            Environment::with_prefix("MATCH")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let settings: Settings = builder.build()?.try_deserialize()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Reject values the index cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.dimension == 0 {
            return Err(ConfigError::Invalid {
                field: "dimension",
                reason: "must be > 0".to_string(),
            });
        }
        if self.default_top_k == 0 {
            return Err(ConfigError::Invalid {
                field: "default_top_k",
                reason: "must be > 0".to_string(),
            });
        }
        Ok(())
    }

    /// Expand ~ in snapshot_path to the home directory
    pub fn expanded_snapshot_path(&self) -> PathBuf {
        expand_home(&self.snapshot_path)
    }

    /// Expand ~ in records_path to the home directory
    pub fn expanded_records_path(&self) -> Option<PathBuf> {
        self.records_path.as_deref().map(expand_home)
    }
}

fn expand_home(path: &str) -> PathBuf {
    if let Some(rest) = path.strip_prefix("~/") {
        if let Some(home) = directories::BaseDirs::new().map(|d| d.home_dir().to_path_buf()) {
            return home.join(rest);
        }
    }
    PathBuf::from(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_default_settings() {
        let settings = Settings::default();
        assert_eq!(settings.dimension, 384);
        assert_eq!(settings.default_top_k, 10);
        assert!(settings.fsync);
        assert!(settings.records_path.is_none());
        assert!(settings.snapshot_path.ends_with("vectors.index"));
    }

    #[test]
    fn test_load_with_config_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(
            file,
            "dimension = 4\nsnapshot_path = \"/tmp/match/test.index\"\nrecords_path = \"/tmp/match/records.jsonl\""
        )
        .unwrap();

        let settings = Settings::load(Some(&file.path().to_string_lossy())).unwrap();
        assert_eq!(settings.dimension, 4);
        assert_eq!(settings.snapshot_path, "/tmp/match/test.index");
        assert_eq!(
            settings.records_path.as_deref(),
            Some("/tmp/match/records.jsonl")
        );
        assert_eq!(settings.default_top_k, 10);
    }

    #[test]
    fn test_load_missing_cli_file_fails() {
        let result = Settings::load(Some("/nonexistent/match-index/config.toml"));
        assert!(matches!(result, Err(ConfigError::Load(_))));
    }

    #[test]
    fn test_validate_rejects_zero_dimension() {
        let settings = Settings {
            dimension: 0,
            ..Default::default()
        };
        assert!(matches!(
            settings.validate(),
            Err(ConfigError::Invalid {
                field: "dimension",
                ..
            })
        ));
    }

    #[test]
    fn test_validate_rejects_zero_top_k() {
        let settings = Settings {
            default_top_k: 0,
            ..Default::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_expanded_paths() {
        let settings = Settings {
            snapshot_path: "/var/lib/match/vectors.index".to_string(),
            records_path: Some("~/exports/records.jsonl".to_string()),
            ..Default::default()
        };
        assert_eq!(
            settings.expanded_snapshot_path(),
            PathBuf::from("/var/lib/match/vectors.index")
        );
        let records = settings.expanded_records_path().unwrap();
        assert!(records.ends_with("exports/records.jsonl"));
        assert!(!records.to_string_lossy().starts_with('~'));
    }
}
