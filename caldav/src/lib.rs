// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! `CalDAV` synchronization client (RFC 4791).
//!
//! Discovers the principal and calendar home set of a server, keeps a
//! directory of calendars and events up to date with `CTag`/`ETag` change
//! detection, and creates, updates and deletes calendars and events.

#![warn(
    trivial_casts,
    trivial_numeric_casts,
    missing_copy_implementations,
    missing_debug_implementations,
    missing_docs,
    unsafe_code,
    unstable_features,
    unused_import_braces,
    unused_qualifications,
    clippy::dbg_macro,
    clippy::indexing_slicing,
    clippy::pedantic
)]
// Allow certain clippy lints that are too restrictive for this crate
#![allow(
    clippy::option_option,
    clippy::similar_names,
    clippy::single_match_else,
    clippy::match_bool,
    clippy::module_name_repetitions
)]

mod client;
mod config;
mod discovery;
mod error;
mod http;
mod mutation;
mod request;
mod response;
mod types;
pub mod xml;

pub use tokio_util::sync::CancellationToken;

pub use crate::client::Client;
pub use crate::config::{AuthMethod, CalDavConfig};
pub use crate::error::CalDavError;
pub use crate::http::{DavRequest, HttpClient, HttpResponse};
pub use crate::request::{
    CALENDAR_PROPS, CalendarMultiGetRequest, CalendarPatch, CalendarQueryRequest, MkColRequest,
    Prop, PropFindRequest,
};
pub use crate::response::{MultiStatusResponse, PropStat, Properties, ResponseItem, status_code};
pub use crate::types::{CTag, Calendar, ComponentSet, ETag, Event, Href, uid_from_href};
