// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use crate::types::Href;
use crate::xml::ParseError;

/// `CalDAV` client errors.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum CalDavError {
    /// Connection, TLS or timeout failure. Always worth retrying.
    #[error("transport error: {0}")]
    Transport(String),

    /// No principal or calendar home set could be found.
    #[error("cannot reach CalDAV server: {0}")]
    Discovery(String),

    /// The server answered, but not with what the protocol requires.
    #[error("protocol error: {0}")]
    Protocol(String),

    /// Malformed XML in a response body.
    #[error("XML error: {0}")]
    Parse(#[from] ParseError),

    /// Invalid configuration or URL.
    #[error("configuration error: {0}")]
    Config(String),

    /// The calendar or event is not known to the client.
    #[error("resource not found: {0}")]
    NotFound(Href),

    /// The session was cancelled before the next request.
    #[error("operation cancelled")]
    Cancelled,
}

impl CalDavError {
    /// Whether retrying the same call may succeed.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}

impl From<reqwest::Error> for CalDavError {
    fn from(e: reqwest::Error) -> Self {
        // A request that cannot be built fails the same way on every retry.
        if e.is_builder() {
            Self::Config(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

impl From<url::ParseError> for CalDavError {
    fn from(e: url::ParseError) -> Self {
        Self::Config(format!("invalid URL: {e}"))
    }
}
