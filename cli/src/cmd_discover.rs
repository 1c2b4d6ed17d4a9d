// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{error::Error, io};

use clap::{ArgMatches, Command};
use colored::Colorize;
use errands_core::caldav::Client;

use crate::arg::CommonArgs;
use crate::util::OutputFormat;

/// Show where the server keeps the user's calendars.
#[derive(Debug, Clone)]
pub struct CmdDiscover {
    pub output_format: OutputFormat,
}

impl CmdDiscover {
    pub const NAME: &str = "discover";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .about("Resolve the principal and calendar home of the configured server")
            .arg(CommonArgs::output_format())
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            output_format: CommonArgs::get_output_format(matches),
        }
    }

    #[tracing::instrument(skip(client))]
    pub async fn run(self, client: &mut Client) -> Result<(), Box<dyn Error>> {
        let mut out = io::stdout();
        self.write(client, &mut out)
    }

    fn write(&self, client: &Client, w: &mut impl io::Write) -> Result<(), Box<dyn Error>> {
        match self.output_format {
            OutputFormat::Json => {
                let value = serde_json::json!({
                    "base_url": client.base_url().as_str(),
                    "principal_url": client.principal_url().as_str(),
                    "home_set_url": client.home_set_url().as_str(),
                });
                writeln!(w, "{}", serde_json::to_string_pretty(&value)?)?;
            }
            OutputFormat::Table => {
                writeln!(w, "{} {}", "Server:   ".bold(), client.base_url())?;
                writeln!(w, "{} {}", "Principal:".bold(), client.principal_url())?;
                writeln!(w, "{} {}", "Home set: ".bold(), client.home_set_url())?;
            }
        }
        Ok(())
    }
}
