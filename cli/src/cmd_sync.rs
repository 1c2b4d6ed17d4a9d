// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{error::Error, io};

use clap::{ArgMatches, Command};
use colored::Colorize;
use errands_core::caldav::CancellationToken;
use errands_core::{Config, SyncReport, SyncSession};

use crate::arg::CommonArgs;
use crate::util::OutputFormat;

/// Synchronize the local lists with the server.
#[derive(Debug, Clone)]
pub struct CmdSync {
    pub output_format: OutputFormat,
}

impl Default for CmdSync {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Table,
        }
    }
}

impl CmdSync {
    pub const NAME: &str = "sync";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .about("Pull remote changes into the local lists and push local edits back")
            .arg(CommonArgs::output_format())
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            output_format: CommonArgs::get_output_format(matches),
        }
    }

    #[tracing::instrument(skip_all)]
    pub async fn run(self, config: Config) -> Result<(), Box<dyn Error>> {
        let cancel = CancellationToken::new();
        let interrupt = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("interrupted, cancelling sync...");
                interrupt.cancel();
            }
        });

        let session = SyncSession::connect(&config, cancel.clone()).await?;
        tracing::debug!(data_dir = %config.data_dir.display(), "connected");

        let (_session, result) = session.spawn().join().await?;
        let report = result?;
        self.write(&report, &mut io::stdout())
    }

    fn write(&self, report: &SyncReport, w: &mut impl io::Write) -> Result<(), Box<dyn Error>> {
        match self.output_format {
            OutputFormat::Json => writeln!(w, "{}", serde_json::to_string_pretty(report)?)?,
            OutputFormat::Table => {
                let r = &report.reconciled;
                writeln!(
                    w,
                    "{} {} calendars, {} pulled",
                    "Synced".green(),
                    report.calendars,
                    report.pulled
                )?;
                writeln!(
                    w,
                    "  lists: {} added, {} updated, {} deleted",
                    r.lists_added, r.lists_updated, r.lists_deleted
                )?;
                writeln!(
                    w,
                    "  tasks: {} added, {} updated, {} removed",
                    r.tasks_added, r.tasks_updated, r.tasks_removed
                )?;
                writeln!(
                    w,
                    "  pushed: {} calendars created, {} uploaded, {} deleted",
                    report.calendars_created, report.uploaded, report.deleted
                )?;
                for failure in &report.failures {
                    writeln!(w, "{} {}", "Warning:".yellow(), failure)?;
                }
            }
        }
        Ok(())
    }
}
