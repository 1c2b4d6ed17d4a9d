// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Common test utilities for integration tests.
//!
//! - A mock `CalDAV` server with one `work` calendar
//! - Temporary data directories with auto-cleanup

#![allow(dead_code)]

mod server;
mod temp_dir;

pub use server::*;
pub use temp_dir::{TempDirs, setup_temp_dirs};
