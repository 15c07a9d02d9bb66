use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

pub const CONFIG_FILE_NAME: &str = "juno.toml";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verbosity {
    /// Roundup and verdict only.
    Quiet,
    /// One glyph per test.
    #[default]
    Dots,
    /// One line per test with progress counters.
    Verbose,
}

/// Static reporter settings, read once before a run starts.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ReporterConfig {
    pub rerun_log: PathBuf,
    pub failure_log: PathBuf,
    pub junit_path: Option<PathBuf>,
    pub junit_suite_name: String,
    pub immediately_show_fails: bool,
    pub slow_test_count: usize,
    pub verbosity: Verbosity,
    pub color: bool,
    pub descriptions: bool,
}

impl Default for ReporterConfig {
    fn default() -> Self {
        Self {
            rerun_log: PathBuf::from("test_rerun.txt"),
            failure_log: PathBuf::from("test_failures.txt"),
            junit_path: None,
            junit_suite_name: "juno".into(),
            immediately_show_fails: true,
            slow_test_count: 0,
            verbosity: Verbosity::default(),
            color: true,
            descriptions: true,
        }
    }
}

impl ReporterConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Loads `juno.toml` from `dir`, or returns the defaults when it is absent.
    pub fn discover(dir: &Path) -> Result<Self, ConfigError> {
        let path = dir.join(CONFIG_FILE_NAME);
        if path.is_file() {
            log::debug!("loading reporter config from {}", path.display());
            Self::load(&path)
        } else {
            log::debug!("no {CONFIG_FILE_NAME} in {}, using defaults", dir.display());
            Ok(Self::default())
        }
    }
}
