use serde::{Deserialize, Serialize};
use std::fs;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    #[serde(default = "default_listen")]
    pub listen: String,
    #[serde(default = "default_sample_window_ms")]
    pub sample_window_ms: u64,
    #[serde(default = "default_disk_path")]
    pub disk_path: PathBuf,
    /// Browser reload interval for the dashboard pages; 0 disables it.
    #[serde(default)]
    pub refresh_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            sample_window_ms: default_sample_window_ms(),
            disk_path: default_disk_path(),
            refresh_secs: 0,
        }
    }
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse YAML in {path}: {source}")]
    Parse {
        path: String,
        source: serde_yaml::Error,
    },
    #[error("invalid configuration: {0}")]
    Validation(String),
}

impl Config {
    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path_ref = path.as_ref();
        let path_display = path_ref.display().to_string();
        let text = fs::read_to_string(path_ref).map_err(|source| ConfigError::Read {
            path: path_display.clone(),
            source,
        })?;

        let cfg = Self::from_yaml(&text).map_err(|source| ConfigError::Parse {
            path: path_display,
            source,
        })?;

        cfg.validate()?;
        Ok(cfg)
    }

    fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        // An empty file deserializes to unit, not to a map of defaults.
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.listen.trim().is_empty() {
            return Err(ConfigError::Validation("listen is required".to_string()));
        }
        if SocketAddr::from_str(&self.listen).is_err() {
            return Err(ConfigError::Validation(
                "listen must be a valid host:port socket address".to_string(),
            ));
        }
        if self.sample_window_ms < 1 {
            return Err(ConfigError::Validation(
                "sample_window_ms must be >= 1".to_string(),
            ));
        }
        if self.disk_path.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "disk_path must not be empty".to_string(),
            ));
        }
        Ok(())
    }

    pub fn sample_window(&self) -> Duration {
        Duration::from_millis(self.sample_window_ms)
    }

    pub fn example_yaml() -> &'static str {
        include_str!("../config.yaml.example")
    }
}

fn default_listen() -> String {
    "127.0.0.1:5000".to_string()
}

const fn default_sample_window_ms() -> u64 {
    1000
}

fn default_disk_path() -> PathBuf {
    if cfg!(windows) {
        PathBuf::from("C:\\")
    } else {
        PathBuf::from("/")
    }
}
