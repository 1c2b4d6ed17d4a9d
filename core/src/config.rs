// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::path::{Path, PathBuf};

use errands_caldav::CalDavConfig;

use crate::error::ConfigError;

/// The name of the application, used for default directories.
pub const APP_NAME: &str = "errands-sync";

const STATE_FILE_NAME: &str = ".sync-state.json";

/// Sync configuration.
#[derive(Debug, Clone, serde::Deserialize)]
pub struct Config {
    /// Server to synchronize with.
    pub server: CalDavConfig,

    /// Directory holding one `.ics` file per list.
    ///
    /// Defaults to `$XDG_DATA_HOME/errands-sync`.
    #[serde(default)]
    pub data_dir: PathBuf,

    /// Where calendar tags are remembered between sessions.
    ///
    /// Defaults to `<data_dir>/.sync-state.json`.
    #[serde(default)]
    pub state_file: Option<PathBuf>,
}

impl Config {
    /// Parses a TOML document and normalizes its paths.
    ///
    /// # Errors
    ///
    /// Returns an error for invalid TOML or paths that cannot be expanded.
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let mut config: Self = toml::from_str(text)?;
        config.normalize()?;
        Ok(config)
    }

    /// Reads and parses a configuration file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub async fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ConfigError::Read {
                path: path.to_path_buf(),
                source,
            })?;
        Self::from_toml(&text)
    }

    /// Expand `~` and environment prefixes and fill in default paths.
    ///
    /// # Errors
    ///
    /// Returns an error if a home or data directory is needed but unknown.
    pub fn normalize(&mut self) -> Result<(), ConfigError> {
        self.data_dir = if self.data_dir.as_os_str().is_empty() {
            get_data_dir()?.join(APP_NAME)
        } else {
            expand_path(&self.data_dir)?
        };

        if let Some(state_file) = &self.state_file {
            self.state_file = Some(expand_path(state_file)?);
        }
        Ok(())
    }

    /// Effective sync state path.
    #[must_use]
    pub fn state_file(&self) -> PathBuf {
        self.state_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join(STATE_FILE_NAME))
    }
}

/// Handle tilde (~) and environment variables in the path
///
/// # Errors
///
/// Returns an error for non UTF-8 paths or an unknown home directory.
pub fn expand_path(path: &Path) -> Result<PathBuf, ConfigError> {
    if path.is_absolute() {
        return Ok(path.to_owned());
    }

    let raw = path
        .to_str()
        .ok_or_else(|| ConfigError::Path(path.display().to_string(), "not valid UTF-8"))?;

    // Handle tilde and home directory
    let home_prefixes: &[&str] = if cfg!(unix) {
        &["~/", "$HOME/", "${HOME}/"]
    } else {
        &[r"~\", "~/", r"%UserProfile%\", r"%UserProfile%/"]
    };
    for prefix in home_prefixes {
        if let Some(stripped) = raw.strip_prefix(prefix) {
            return Ok(get_home_dir(raw)?.join(stripped));
        }
    }

    // Handle config directories
    let config_prefixes: &[&str] = if cfg!(unix) {
        &["$XDG_CONFIG_HOME/", "${XDG_CONFIG_HOME}/"]
    } else {
        &[r"%LOCALAPPDATA%\", "%LOCALAPPDATA%/"]
    };
    for prefix in config_prefixes {
        if let Some(stripped) = raw.strip_prefix(prefix) {
            return Ok(get_config_dir()?.join(stripped));
        }
    }

    Ok(path.to_owned())
}

fn get_home_dir(raw: &str) -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or_else(|| ConfigError::Path(raw.to_string(), "home directory not found"))
}

fn get_config_dir() -> Result<PathBuf, ConfigError> {
    #[cfg(unix)]
    let config_dir = xdg::BaseDirectories::new().get_config_home();
    #[cfg(windows)]
    let config_dir = dirs::config_dir();
    config_dir.ok_or_else(|| ConfigError::Path("$XDG_CONFIG_HOME".to_string(), "not found"))
}

fn get_data_dir() -> Result<PathBuf, ConfigError> {
    #[cfg(unix)]
    let data_dir = xdg::BaseDirectories::new().get_data_home();
    #[cfg(windows)]
    let data_dir = dirs::data_dir();
    data_dir.ok_or_else(|| ConfigError::Path("$XDG_DATA_HOME".to_string(), "not found"))
}
