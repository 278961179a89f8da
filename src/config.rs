use std::path::PathBuf;
use std::time::Duration;

use crate::repo::json::DEFAULT_DATA_FILE;
use crate::storage::{DEFAULT_CAPTURE_TIMEOUT, DEFAULT_IMAGE_DIR};

/// Runtime settings derived from the environment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Config {
    pub data_file: PathBuf,
    pub image_dir: PathBuf,
    pub capture_command: Option<String>,
    pub capture_timeout: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_file: PathBuf::from(DEFAULT_DATA_FILE),
            image_dir: PathBuf::from(DEFAULT_IMAGE_DIR),
            capture_command: None,
            capture_timeout: DEFAULT_CAPTURE_TIMEOUT,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        fn path_env(name: &str, default: &str) -> PathBuf {
            std::env::var(name).ok().filter(|v| !v.trim().is_empty()).map(PathBuf::from).unwrap_or_else(|| PathBuf::from(default))
        }
        fn dur_env(name: &str, default: Duration) -> Duration {
            std::env::var(name).ok().and_then(|v| v.trim().parse().ok()).map(Duration::from_secs).unwrap_or(default)
        }
        Self {
            data_file: path_env("LOSTFOUND_DATA_FILE", DEFAULT_DATA_FILE),
            image_dir: path_env("LOSTFOUND_IMAGE_DIR", DEFAULT_IMAGE_DIR),
            capture_command: std::env::var("LOSTFOUND_CAPTURE_CMD").ok().filter(|v| !v.trim().is_empty()),
            capture_timeout: dur_env("LOSTFOUND_CAPTURE_TIMEOUT_SECS", DEFAULT_CAPTURE_TIMEOUT),
        }
    }
}
