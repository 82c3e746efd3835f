//! User settings persistence via TOML.
//!
//! Settings are stored at `<config_dir>/duet/settings.toml`.
//! Missing or corrupted config files return sensible defaults.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use duet_session::SessionConfig;
use serde::{Deserialize, Serialize};

const SETTINGS_FILE: &str = "settings.toml";

/// User-configurable settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Display name sent to peers in the handshake.
    pub display_name: String,
    /// Where received files are saved.
    pub download_dir: PathBuf,
    /// Pause between chunk sends, in milliseconds.
    pub chunk_delay_ms: u64,
    /// Grace period between saying goodbye to a peer and closing the link.
    pub teardown_grace_ms: u64,
    /// Require both peers to prove their signing keys.
    pub mutual_auth: bool,
}

impl Default for Settings {
    fn default() -> Self {
        let download_dir = directories::ProjectDirs::from("", "", "duet")
            .map(|d| d.data_dir().join("downloads"))
            .unwrap_or_else(|| PathBuf::from("duet-downloads"));
        let session = SessionConfig::default();

        Self {
            display_name: "user".to_string(),
            download_dir,
            chunk_delay_ms: session.chunk_delay.as_millis() as u64,
            teardown_grace_ms: session.teardown_grace.as_millis() as u64,
            mutual_auth: session.mutual_auth,
        }
    }
}

impl Settings {
    /// Load settings from the default config path.
    ///
    /// Returns defaults if the file doesn't exist or is corrupted.
    pub fn load() -> Self {
        Self::load_from_dir(Self::config_dir())
    }

    /// Save settings to the default config path.
    pub fn save(&self) -> Result<PathBuf> {
        self.save_to_dir(Self::config_dir())
    }

    /// Load settings from a specific config directory.
    pub fn load_from_dir(config_dir: PathBuf) -> Self {
        let path = config_dir.join(SETTINGS_FILE);
        match std::fs::read_to_string(&path) {
            Ok(contents) => match toml::from_str(&contents) {
                Ok(settings) => {
                    tracing::info!(path = %path.display(), "settings loaded");
                    settings
                }
                Err(e) => {
                    tracing::warn!(
                        path = %path.display(),
                        error = %e,
                        "corrupted settings file, using defaults"
                    );
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::info!(path = %path.display(), "settings file not found, using defaults");
                Self::default()
            }
            Err(e) => {
                tracing::warn!(
                    path = %path.display(),
                    error = %e,
                    "failed to read settings file, using defaults"
                );
                Self::default()
            }
        }
    }

    /// Save settings to a specific config directory, returning the file path.
    pub fn save_to_dir(&self, config_dir: PathBuf) -> Result<PathBuf> {
        std::fs::create_dir_all(&config_dir).with_context(|| {
            format!("failed to create config directory: {}", config_dir.display())
        })?;

        let path = config_dir.join(SETTINGS_FILE);
        std::fs::write(&path, self.to_toml()?)
            .with_context(|| format!("failed to write settings file: {}", path.display()))?;

        tracing::info!(path = %path.display(), "settings saved");
        Ok(path)
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).context("failed to serialize settings")
    }

    /// Session tunables derived from these settings.
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            display_name: self.display_name.clone(),
            chunk_delay: Duration::from_millis(self.chunk_delay_ms),
            teardown_grace: Duration::from_millis(self.teardown_grace_ms),
            mutual_auth: self.mutual_auth,
        }
    }

    /// Get the default config directory.
    pub fn config_dir() -> PathBuf {
        directories::ProjectDirs::from("", "", "duet")
            .map(|d| d.config_dir().to_path_buf())
            .unwrap_or_else(|| PathBuf::from("duet-config"))
    }
}
