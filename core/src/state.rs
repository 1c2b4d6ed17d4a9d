// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::io::ErrorKind;
use std::path::Path;

use errands_caldav::Calendar;
use serde::{Deserialize, Serialize};
use tokio::fs;

use crate::error::StoreError;

const STATE_VERSION: u32 = 1;

/// Calendars and events remembered between sessions.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncState {
    #[serde(default = "current_version")]
    version: u32,
    /// Calendars with their tags and events as of the last session.
    #[serde(default)]
    pub calendars: Vec<Calendar>,
}

const fn current_version() -> u32 {
    STATE_VERSION
}

impl SyncState {
    /// Wraps the calendars of a finished session.
    #[must_use]
    pub const fn new(calendars: Vec<Calendar>) -> Self {
        Self {
            version: STATE_VERSION,
            calendars,
        }
    }

    /// Loads the state; a missing file or an unknown version gives an empty
    /// state, forcing a full pull.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or decoded.
    #[tracing::instrument]
    pub async fn load(path: &Path) -> Result<Self, StoreError> {
        let text = match fs::read_to_string(path).await {
            Ok(text) => text,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("no sync state yet");
                return Ok(Self::default());
            }
            Err(source) => {
                return Err(StoreError::Io {
                    path: path.to_path_buf(),
                    source,
                });
            }
        };

        let state: Self = serde_json::from_str(&text)?;
        if state.version != STATE_VERSION {
            tracing::warn!(version = state.version, "discarding sync state of another version");
            return Ok(Self::default());
        }
        Ok(state)
    }

    /// Writes the state through a temporary file.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding or writing fails.
    #[tracing::instrument(skip(self))]
    pub async fn save(&self, path: &Path) -> Result<(), StoreError> {
        let io_err = |source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        };
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let json = serde_json::to_string(self)?;
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, json).await.map_err(io_err)?;
        fs::rename(&tmp, path).await.map_err(io_err)?;
        Ok(())
    }
}
