// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Temporary directory management for integration tests.

use std::path::PathBuf;

use errands_core::Config;
use errands_core::caldav::{AuthMethod, CalDavConfig};
use tempfile::TempDir;

/// Temporary data directory and state file, removed on drop.
#[derive(Debug)]
pub struct TempDirs {
    base: TempDir,
    /// List directory for .ics files.
    pub data_dir: PathBuf,
    /// Sync state file.
    pub state_file: PathBuf,
}

impl TempDirs {
    /// Creates new temporary directories for testing.
    pub fn new() -> std::io::Result<Self> {
        let base = tempfile::tempdir()?;
        let data_dir = base.path().join("lists");
        let state_file = base.path().join("state").join("sync.json");
        Ok(Self {
            base,
            data_dir,
            state_file,
        })
    }

    /// Configuration pointing at a mock server.
    #[must_use]
    pub fn config(&self, server_uri: &str) -> Config {
        Config {
            server: CalDavConfig {
                base_url: format!("{server_uri}/dav/"),
                auth: AuthMethod::Basic {
                    username: "user".to_string(),
                    password: "secret".to_string(),
                },
                timeout_secs: 5,
                ..Default::default()
            },
            data_dir: self.data_dir.clone(),
            state_file: Some(self.state_file.clone()),
        }
    }

    /// Path of the file holding list `uid`.
    #[must_use]
    pub fn list_file(&self, uid: &str) -> PathBuf {
        self.data_dir.join(format!("{uid}.ics"))
    }
}

/// Sets up temporary directories for integration tests.
pub fn setup_temp_dirs() -> TempDirs {
    TempDirs::new().expect("temporary directory")
}
