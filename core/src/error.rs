// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::io;
use std::path::PathBuf;

use errands_caldav::{CalDavError, Href};

/// Local store errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Reading or writing a list file failed.
    #[error("cannot access {}: {source}", path.display())]
    Io {
        /// File or directory involved.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// The text is not valid iCalendar.
    #[error("invalid iCalendar: {0}")]
    Ical(String),

    /// The iCalendar text has no component of the expected type.
    #[error("no {0} component found")]
    MissingComponent(&'static str),

    /// Sync state could not be encoded or decoded.
    #[error("invalid sync state: {0}")]
    State(#[from] serde_json::Error),
}

/// Configuration errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("failed to read config file at {}: {source}", path.display())]
    Read {
        /// Config file path.
        path: PathBuf,
        /// Underlying error.
        source: io::Error,
    },

    /// The configuration file is not valid TOML or misses fields.
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A path could not be expanded.
    #[error("invalid path {0}: {1}")]
    Path(String, &'static str),
}

/// The step of a sync session that failed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncPhase {
    /// Principal or home-set discovery.
    Discovery,
    /// Listing calendars under the home set.
    CalendarList,
    /// Pulling the events of one calendar.
    EventList {
        /// Calendar href.
        calendar: Href,
    },
    /// Uploading local changes of one list.
    Push {
        /// Calendar href, or list uid if the calendar does not exist yet.
        calendar: Href,
    },
    /// Reading or writing the local store or the sync state.
    LocalStore,
    /// The background task panicked or was aborted.
    Worker,
}

impl fmt::Display for SyncPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Discovery => f.write_str("discovery"),
            Self::CalendarList => f.write_str("calendar list"),
            Self::EventList { calendar } => write!(f, "event list of {calendar}"),
            Self::Push { calendar } => write!(f, "upload to {calendar}"),
            Self::LocalStore => f.write_str("local store"),
            Self::Worker => f.write_str("sync worker"),
        }
    }
}

/// Cause of a [`SyncError`].
#[derive(Debug, thiserror::Error)]
pub enum SyncErrorSource {
    /// Server communication failed.
    #[error(transparent)]
    CalDav(#[from] CalDavError),

    /// The local store failed.
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The worker task failed.
    #[error("{0}")]
    Worker(String),
}

/// A sync failure scoped to the phase it happened in.
#[derive(Debug, thiserror::Error)]
#[error("{phase} failed: {source}")]
pub struct SyncError {
    /// Failed phase.
    pub phase: SyncPhase,
    /// What went wrong.
    #[source]
    pub source: SyncErrorSource,
}

impl SyncError {
    /// Creates an error for `phase`.
    pub fn new(phase: SyncPhase, source: impl Into<SyncErrorSource>) -> Self {
        Self {
            phase,
            source: source.into(),
        }
    }

    /// Whether the session was cancelled rather than failing.
    #[must_use]
    pub const fn is_cancelled(&self) -> bool {
        matches!(self.source, SyncErrorSource::CalDav(CalDavError::Cancelled))
    }
}
