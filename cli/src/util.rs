// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use errands_core::icalendar::{CalendarComponent, Component};
use errands_core::parse_calendar;
use tracing_subscriber::EnvFilter;

/// The output format for commands
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
}

/// Install the log subscriber. `RUST_LOG` wins over `verbose`.
pub fn init_tracing(verbose: bool) {
    let default = if verbose { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Kind, uid and summary of the first task or event in a calendar object.
pub fn describe_ical(text: &str) -> Option<(String, String, String)> {
    let calendar = parse_calendar(text).ok()?;
    calendar.components.iter().find_map(|component| {
        let (kind, uid, summary) = match component {
            CalendarComponent::Todo(todo) => ("VTODO", todo.get_uid(), todo.get_summary()),
            CalendarComponent::Event(event) => ("VEVENT", event.get_uid(), event.get_summary()),
            _ => return None,
        };
        let text = |value: Option<&str>| value.unwrap_or_default().to_string();
        Some((kind.to_string(), text(uid), text(summary)))
    })
}
