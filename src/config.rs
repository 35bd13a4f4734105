//! Application configuration.
//!
//! Read from `<config_dir>/learn-sync/config.toml` when present, then
//! overridden from the environment:
//!
//! | Variable           | Overrides                          |
//! |--------------------|------------------------------------|
//! | `LEARN_SYNC_DIR`   | `sync.download_dir`                |
//! | `LEARN_SYNC_TOKEN` | session token (never read from disk) |

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Environment variable overriding the download directory.
pub const DIR_ENV: &str = "LEARN_SYNC_DIR";
/// Environment variable holding the session token.
pub const TOKEN_ENV: &str = "LEARN_SYNC_TOKEN";

/// Where and what to sync.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncConfig {
    /// Directory course folders are created under.
    pub download_dir: PathBuf,
    /// Courses to sync when none are named on the command line. Empty means all.
    pub courses: Vec<String>,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            download_dir: dirs::download_dir()
                .map_or_else(|| PathBuf::from("."), |dir| dir.join("learn-sync")),
            courses: Vec::new(),
        }
    }
}

impl SyncConfig {
    #[must_use]
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.download_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_courses(mut self, courses: Vec<String>) -> Self {
        self.courses = courses;
        self
    }
}

/// How to reach the learning platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Base URL predownload references are relative to.
    pub base_url: String,
    /// Name of the cookie carrying the session token.
    pub session_cookie: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://ntulearn.ntu.edu.sg".to_string(),
            session_cookie: "s_session_id".to_string(),
            timeout_secs: 30,
            user_agent: concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

impl RemoteConfig {
    #[must_use]
    pub const fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    #[must_use]
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    #[must_use]
    pub fn with_session_cookie(mut self, name: impl Into<String>) -> Self {
        self.session_cookie = name.into();
        self
    }

    #[must_use]
    pub const fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }
}

/// Complete application configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub sync: SyncConfig,
    pub remote: RemoteConfig,
    /// Session token, only ever taken from the environment.
    #[serde(skip)]
    pub token: Option<String>,
}

impl AppConfig {
    /// Default location of the config file.
    #[must_use]
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("learn-sync")
            .join("config.toml")
    }

    /// Loads the config file and applies environment overrides.
    ///
    /// Without an explicit `path`, a missing default file yields defaults.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if an explicit file is missing or any file
    /// fails to parse.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => {
                let path = Self::default_path();
                if path.exists() {
                    Self::from_file(&path)?
                } else {
                    log::debug!("No config file at {}, using defaults", path.display());
                    Self::default()
                }
            }
        };
        config.apply_overrides(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Parses a config file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        toml::from_str(&contents)
            .map_err(|e| Error::Config(format!("cannot parse {}: {e}", path.display())))
    }

    /// Applies overrides from a variable lookup (normally the environment).
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(dir) = lookup(DIR_ENV).filter(|v| !v.is_empty()) {
            self.sync.download_dir = PathBuf::from(dir);
        }
        if let Some(token) = lookup(TOKEN_ENV).filter(|v| !v.is_empty()) {
            self.token = Some(token);
        }
    }

    #[must_use]
    pub fn with_download_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.sync.download_dir = dir.into();
        self
    }

    #[must_use]
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }
}
