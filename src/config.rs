//! # Configuration Module
//!
//! This module handles configuration management and data directory setup for Gimme.
//! It provides platform-appropriate storage locations and the runtime settings
//! shared by every command.
//!
//! ## Data Storage
//!
//! Gimme stores its per-user state files in the platform-standard data directory:
//! - Linux: `~/.local/share/gimme/`
//! - macOS: `~/Library/Application Support/gimme/`
//! - Windows: `%APPDATA%\gimme\`
//!
//! ## Configuration File
//!
//! An optional `config.json` in the platform config directory
//! (`~/.config/gimme/config.json` on Linux) may set any field of
//! [`RuntimeConfig`]. Command-line flags and environment variables win over
//! the file; the file wins over built-in defaults.
//!
//! ```json
//! {
//!   "user": "my-spotify-id",
//!   "cutoff": 0.75,
//!   "catalog": { "client_id": "...", "client_secret": "...", "refresh_token": "..." }
//! }
//! ```

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::recommend::{Cutoff, DEFAULT_CUTOFF};

/// Returns the platform-appropriate data directory for Gimme.
///
/// Creates the `gimme` subdirectory if it doesn't exist yet.
///
/// # Errors
///
/// This function will return an error if:
/// - The system data directory cannot be determined
/// - The gimme subdirectory cannot be created due to permissions
///
/// # Examples
///
/// ```no_run
/// use gimme::config::get_data_dir;
///
/// let dir = get_data_dir()?;
/// println!("State lives in {}", dir.display());
/// # Ok::<(), anyhow::Error>(())
/// ```
pub fn get_data_dir() -> Result<PathBuf> {
    let data_dir = dirs::data_dir().ok_or_else(|| {
        anyhow::anyhow!(
            "Could not determine system data directory. Please pass --state-dir explicitly."
        )
    })?;

    let gimme_dir = data_dir.join("gimme");
    fs::create_dir_all(&gimme_dir).with_context(|| {
        format!(
            "Failed to create Gimme data directory at {}. Please check file permissions.",
            gimme_dir.display()
        )
    })?;

    Ok(gimme_dir)
}

/// Returns the default location of the optional configuration file.
///
/// Unlike [`get_data_dir`], nothing is created; a missing file simply means defaults.
pub fn get_config_path() -> Result<PathBuf> {
    let config_dir = dirs::config_dir().ok_or_else(|| {
        anyhow::anyhow!("Could not determine system config directory. Please pass --config explicitly.")
    })?;
    Ok(config_dir.join("gimme").join("config.json"))
}

/// Connection settings for the music catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub api_base: String,
    pub token_url: String,
    /// Bearer token used directly if present.
    pub access_token: Option<String>,
    /// With `client_id` and `client_secret`, used to mint new access tokens.
    pub refresh_token: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub timeout_secs: u64,
    /// Attempts per request beyond the first.
    pub max_retries: u32,
    /// Base delay for exponential back-off between attempts.
    pub retry_backoff_ms: u64,
}

impl Default for CatalogConfig {
    fn default() -> Self {
        Self {
            api_base: "https://api.spotify.com/v1".to_string(),
            token_url: "https://accounts.spotify.com/api/token".to_string(),
            access_token: None,
            refresh_token: None,
            client_id: None,
            client_secret: None,
            timeout_secs: 20,
            max_retries: 10,
            retry_backoff_ms: 500,
        }
    }
}

impl CatalogConfig {
    /// Whether a refresh-token grant can be attempted.
    #[must_use]
    pub fn can_refresh(&self) -> bool {
        self.refresh_token.is_some() && self.client_id.is_some() && self.client_secret.is_some()
    }
}

/// Configuration for runtime behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Catalog user whose playlists are scanned.
    pub user: Option<String>,
    /// Directory holding the state files; platform data dir when unset.
    pub state_dir: Option<PathBuf>,
    /// Coverage above which an album counts as heard.
    pub cutoff: f64,
    pub catalog: CatalogConfig,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            user: None,
            state_dir: None,
            cutoff: DEFAULT_CUTOFF,
            catalog: CatalogConfig::default(),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            log::debug!("No config file at {}, using defaults", path.display());
            return Ok(Self::default());
        }
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        log::debug!("Loaded config from {}", path.display());
        Ok(config)
    }

    /// The validated coverage cutoff.
    pub fn cutoff(&self) -> Result<Cutoff> {
        Ok(Cutoff::new(self.cutoff)?)
    }

    /// The user to operate on.
    pub fn user(&self) -> Result<&str> {
        self.user
            .as_deref()
            .filter(|u| !u.trim().is_empty())
            .ok_or_else(|| anyhow::anyhow!("No user given. Pass --user, set GIMME_USER, or add \"user\" to the config file."))
    }

    /// The directory holding state files, created if necessary.
    pub fn state_dir(&self) -> Result<PathBuf> {
        match &self.state_dir {
            Some(dir) => {
                fs::create_dir_all(dir)
                    .with_context(|| format!("Failed to create state directory {}", dir.display()))?;
                Ok(dir.clone())
            }
            None => get_data_dir(),
        }
    }
}
