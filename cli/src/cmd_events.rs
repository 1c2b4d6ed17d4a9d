// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{error::Error, io, io::Write};

use clap::{ArgMatches, Command};
use colored::{Color, Colorize};
use errands_core::caldav::Client;

use crate::arg::CommonArgs;
use crate::table::{Column, Table};
use crate::util::{OutputFormat, describe_ical};

/// One calendar object as shown to the user.
#[derive(Debug, Clone, serde::Serialize)]
struct EventRow {
    kind: String,
    uid: String,
    summary: String,
    etag: String,
    href: String,
}

#[derive(Debug, Clone)]
pub struct CmdEvents {
    pub uid: String,
    pub output_format: OutputFormat,
}

impl CmdEvents {
    pub const NAME: &str = "events";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .about("List the items of a calendar")
            .arg(CommonArgs::calendar_uid())
            .arg(CommonArgs::output_format())
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            uid: CommonArgs::get_calendar_uid(matches),
            output_format: CommonArgs::get_output_format(matches),
        }
    }

    #[tracing::instrument(skip(client))]
    pub async fn run(self, client: &mut Client) -> Result<(), Box<dyn Error>> {
        client.pull_calendars().await?;
        let href = client
            .calendar_by_uid(&self.uid)
            .filter(|c| !c.is_deleted())
            .map(|c| c.href().clone())
            .ok_or_else(|| format!("Calendar not found: {}", self.uid))?;
        client.pull_events(&href).await?;

        let mut rows: Vec<EventRow> = client
            .calendar(&href)
            .map(|c| c.events())
            .unwrap_or_default()
            .iter()
            .filter(|e| !e.is_deleted())
            .map(|e| {
                let (kind, uid, summary) = e.ical().and_then(describe_ical).unwrap_or_default();
                EventRow {
                    kind,
                    uid,
                    summary,
                    etag: e.etag().to_string(),
                    href: e.href().to_string(),
                }
            })
            .collect();
        rows.sort_by(|a, b| a.summary.cmp(&b.summary));

        let mut out = io::stdout();
        match self.output_format {
            OutputFormat::Json => writeln!(out, "{}", serde_json::to_string_pretty(&rows)?)?,
            OutputFormat::Table if rows.is_empty() => {
                writeln!(out, "{}", "No items found".italic())?;
            }
            OutputFormat::Table => {
                let columns = vec![
                    EventColumn::Kind,
                    EventColumn::Uid,
                    EventColumn::Summary,
                    EventColumn::ETag,
                ];
                Table::new(columns, &rows).write_to(&mut out)?;
            }
        }
        Ok(())
    }
}

enum EventColumn {
    Kind,
    Uid,
    Summary,
    ETag,
}

impl Column<EventRow> for EventColumn {
    fn format(&self, data: &EventRow) -> String {
        match self {
            Self::Kind => data.kind.clone(),
            Self::Uid => data.uid.clone(),
            Self::Summary => data.summary.clone(),
            Self::ETag => data.etag.clone(),
        }
    }

    fn get_color(&self, data: &EventRow) -> Option<Color> {
        match self {
            Self::Kind if data.kind == "VTODO" => Some(Color::Cyan),
            Self::Kind => Some(Color::Magenta),
            Self::Uid | Self::ETag => Some(Color::BrightBlack),
            Self::Summary => None,
        }
    }
}
