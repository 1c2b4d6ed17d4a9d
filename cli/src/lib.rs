// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Command-line front end for `errands-sync`.

mod arg;
mod cli;
mod cmd_calendar;
mod cmd_discover;
mod cmd_events;
mod cmd_generate_completion;
mod cmd_sync;
mod config;
mod table;
mod util;

pub use crate::cli::{Cli, Commands, run};
pub use crate::config::parse_config;
