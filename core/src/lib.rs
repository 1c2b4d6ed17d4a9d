// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Local task lists kept in sync with a `CalDAV` server.
//!
//! Lists live as iCalendar files in a directory; a [`SyncSession`] pulls
//! remote calendars into them and pushes local edits back.

#![warn(
    trivial_casts,
    trivial_numeric_casts,
    missing_debug_implementations,
    missing_docs,
    unsafe_code,
    unused_import_braces,
    unused_qualifications,
    clippy::dbg_macro,
    clippy::pedantic
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]

mod config;
mod error;
mod property;
mod reconcile;
mod session;
mod state;
mod store;

pub use errands_caldav as caldav;
pub use icalendar;

pub use crate::config::{APP_NAME, Config, expand_path};
pub use crate::error::{ConfigError, StoreError, SyncError, SyncErrorSource, SyncPhase};
pub use crate::property::{
    ListProp, PropKind, PropValue, Properties, PropertyKey, TaskProp, format_timestamp,
    parse_timestamp,
};
pub use crate::reconcile::{ReconcileSummary, reconcile};
pub use crate::session::{SyncHandle, SyncReport, SyncSession};
pub use crate::state::SyncState;
pub use crate::store::{Store, Task, TaskList, new_uid, parse_calendar};
