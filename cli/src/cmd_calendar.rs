// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::{error::Error, io};

use clap::{ArgAction, ArgMatches, Command, arg};
use colored::{Color, Colorize};
use errands_core::caldav::{Calendar, Client, ComponentSet};
use errands_core::new_uid;

use crate::arg::CommonArgs;
use crate::table::{Column, Table};
use crate::util::OutputFormat;

/// List the calendars in the calendar home.
#[derive(Debug, Clone)]
pub struct CmdCalendarList {
    pub output_format: OutputFormat,
}

impl CmdCalendarList {
    pub const NAME: &str = "calendars";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .alias("ls")
            .about("List calendars on the server")
            .arg(CommonArgs::output_format())
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            output_format: CommonArgs::get_output_format(matches),
        }
    }

    #[tracing::instrument(skip(client))]
    pub async fn run(self, client: &mut Client) -> Result<(), Box<dyn Error>> {
        client.pull_calendars().await?;

        let mut calendars: Vec<&Calendar> =
            client.calendars().iter().filter(|c| !c.is_deleted()).collect();
        calendars.sort_by(|a, b| a.uid().cmp(b.uid()));
        write_calendars(&calendars, self.output_format, &mut io::stdout())
    }
}

fn write_calendars(
    calendars: &[&Calendar],
    format: OutputFormat,
    w: &mut impl io::Write,
) -> Result<(), Box<dyn Error>> {
    match format {
        OutputFormat::Json => {
            let values: Vec<_> = calendars
                .iter()
                .map(|c| {
                    serde_json::json!({
                        "uid": c.uid(),
                        "name": c.display_name(),
                        "description": c.description(),
                        "color": c.color(),
                        "components": c.components().names().collect::<Vec<_>>(),
                        "href": c.href().as_str(),
                    })
                })
                .collect();
            writeln!(w, "{}", serde_json::to_string_pretty(&values)?)?;
        }
        OutputFormat::Table if calendars.is_empty() => {
            writeln!(w, "{}", "No calendars found".italic())?;
        }
        OutputFormat::Table => {
            let columns = vec![
                CalendarColumn::Uid,
                CalendarColumn::Name,
                CalendarColumn::Components,
                CalendarColumn::Color,
            ];
            Table::new(columns, calendars).write_to(w)?;
        }
    }
    Ok(())
}

enum CalendarColumn {
    Uid,
    Name,
    Components,
    Color,
}

impl Column<&Calendar> for CalendarColumn {
    fn format(&self, data: &&Calendar) -> String {
        match self {
            Self::Uid => data.uid().to_string(),
            Self::Name => data.display_name().unwrap_or_default().to_string(),
            Self::Components => data.components().to_string(),
            Self::Color => data.color().unwrap_or_default().to_string(),
        }
    }

    fn get_color(&self, data: &&Calendar) -> Option<Color> {
        match self {
            Self::Uid => Some(Color::BrightBlack),
            Self::Color => data.color().and_then(parse_hex_color),
            _ => None,
        }
    }
}

/// `#rrggbb` or `#rrggbbaa`, alpha ignored.
fn parse_hex_color(raw: &str) -> Option<Color> {
    let hex = raw.strip_prefix('#')?;
    if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
        return None;
    }
    let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).ok();
    Some(Color::TrueColor {
        r: channel(0)?,
        g: channel(2)?,
        b: channel(4)?,
    })
}

/// Create a calendar collection in the calendar home.
#[derive(Debug, Clone)]
pub struct CmdCalendarCreate {
    pub name: String,
    pub uid: String,
    pub description: Option<String>,
    pub color: Option<String>,
    pub components: ComponentSet,
}

impl CmdCalendarCreate {
    pub const NAME: &str = "create-calendar";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .about("Create a calendar on the server")
            .arg(arg!(name: <NAME> "Display name of the calendar"))
            .arg(arg!(--uid <UID> "Last URL segment of the calendar, random if omitted"))
            .arg(arg!(-d --description <DESCRIPTION> "Description of the calendar"))
            .arg(arg!(--color <COLOR> "Color of the calendar, e.g. #ff7800"))
            .arg(
                arg!(--component <COMPONENT> "Component type the calendar accepts")
                    .action(ArgAction::Append)
                    .default_value("VTODO"),
            )
    }

    pub fn from(matches: &ArgMatches) -> Result<Self, Box<dyn Error>> {
        let mut components = ComponentSet::EMPTY;
        for name in matches.get_many::<String>("component").into_iter().flatten() {
            components |= ComponentSet::from_name(name)
                .ok_or_else(|| format!("Unknown component type: {name}"))?;
        }

        Ok(Self {
            name: matches.get_one::<String>("name").cloned().unwrap_or_default(),
            uid: matches.get_one::<String>("uid").cloned().unwrap_or_else(new_uid),
            description: matches.get_one("description").cloned(),
            color: matches.get_one("color").cloned(),
            components,
        })
    }

    #[tracing::instrument(skip(client))]
    pub async fn run(self, client: &mut Client) -> Result<(), Box<dyn Error>> {
        let href = client
            .create_calendar(
                &self.uid,
                &self.name,
                self.description.as_deref(),
                self.color.as_deref(),
                self.components,
            )
            .await?;
        println!("{} {} ({})", "Created".green(), self.name, href);
        Ok(())
    }
}

/// Delete a calendar collection and everything in it.
#[derive(Debug, Clone)]
pub struct CmdCalendarDelete {
    pub uid: String,
}

impl CmdCalendarDelete {
    pub const NAME: &str = "delete-calendar";

    pub fn command() -> Command {
        Command::new(Self::NAME)
            .about("Delete a calendar and all of its items from the server")
            .arg(CommonArgs::calendar_uid())
    }

    pub fn from(matches: &ArgMatches) -> Self {
        Self {
            uid: CommonArgs::get_calendar_uid(matches),
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

        client.delete_calendar(&href).await?;
        println!("{} {}", "Deleted".green(), href);
        Ok(())
    }
}
