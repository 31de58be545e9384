use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::app_dirs::AppDirs;

pub const DEFAULT_DURATION_SECS: u64 = 60;

/// Longest accepted session, one day
pub const MAX_DURATION_SECS: u64 = 24 * 60 * 60;

/// Durations offered by the duration picker
pub const DURATION_CHOICES: [u64; 4] = [15, 30, 60, 120];

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub duration_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            duration_secs: DEFAULT_DURATION_SECS,
        }
    }
}

impl Config {
    /// Replace anything unusable with defaults
    pub fn validated(mut self) -> Self {
        if !is_valid_duration(self.duration_secs) {
            self.duration_secs = DEFAULT_DURATION_SECS;
        }
        self
    }
}

pub fn is_valid_duration(secs: u64) -> bool {
    (1..=MAX_DURATION_SECS).contains(&secs)
}

/// Parse a user supplied duration in whole seconds ("45" or "45s").
/// Zero, negative, fractional, non-numeric and overlong values are rejected.
pub fn parse_duration(raw: &str) -> Option<u64> {
    let raw = raw.trim();
    let digits = raw.strip_suffix('s').unwrap_or(raw).trim();
    digits
        .parse::<u64>()
        .ok()
        .filter(|&secs| is_valid_duration(secs))
}

/// `raw` if it parses, otherwise the last valid duration
pub fn resolve_duration(raw: &str, last_valid: u64) -> u64 {
    parse_duration(raw).unwrap_or(last_valid)
}

/// Next entry of [`DURATION_CHOICES`] after `current`, wrapping around
pub fn next_choice(current: u64) -> u64 {
    DURATION_CHOICES
        .iter()
        .copied()
        .find(|&c| c > current)
        .unwrap_or(DURATION_CHOICES[0])
}

/// Previous entry of [`DURATION_CHOICES`] before `current`, wrapping around
pub fn prev_choice(current: u64) -> u64 {
    DURATION_CHOICES
        .iter()
        .rev()
        .copied()
        .find(|&c| c < current)
        .unwrap_or(DURATION_CHOICES[DURATION_CHOICES.len() - 1])
}

pub trait ConfigStore {
    fn load(&self) -> Config;
    fn save(&self, cfg: &Config) -> std::io::Result<()>;
}

#[derive(Debug, Clone)]
pub struct FileConfigStore {
    path: PathBuf,
}

impl FileConfigStore {
    #[allow(clippy::new_without_default)]
    pub fn new() -> Self {
        let path = AppDirs::config_path().unwrap_or_else(|| PathBuf::from("copycat_config.json"));
        Self { path }
    }

    pub fn with_path<P: AsRef<Path>>(p: P) -> Self {
        Self {
            path: p.as_ref().to_path_buf(),
        }
    }
}

impl Default for FileConfigStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigStore for FileConfigStore {
    fn load(&self) -> Config {
        if let Ok(bytes) = fs::read(&self.path) {
            if let Ok(cfg) = serde_json::from_slice::<Config>(&bytes) {
                return cfg.validated();
            }
        }
        Config::default()
    }

    fn save(&self, cfg: &Config) -> std::io::Result<()> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent)?;
        }
        let data = serde_json::to_vec_pretty(cfg).map_err(std::io::Error::other)?;
        fs::write(&self.path, data)
    }
}
