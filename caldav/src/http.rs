// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! HTTP transport with authentication, depth headers and cancellation.

use std::time::Duration;

use reqwest::header::CONTENT_TYPE;
use reqwest::{Client, Method, StatusCode, redirect};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::config::{AuthMethod, CalDavConfig};
use crate::error::CalDavError;

const XML_CONTENT_TYPE: &str = "application/xml; charset=utf-8";
const ICAL_CONTENT_TYPE: &str = "text/calendar; charset=utf-8";

/// A single WebDAV request.
#[derive(Debug, Clone)]
pub struct DavRequest {
    method: Method,
    url: Url,
    depth: Option<u8>,
    body: Option<(&'static str, String)>,
    follow_redirects: bool,
}

impl DavRequest {
    /// Creates a request without body or `Depth` header.
    #[must_use]
    pub const fn new(method: Method, url: Url) -> Self {
        Self {
            method,
            url,
            depth: None,
            body: None,
            follow_redirects: false,
        }
    }

    /// `PROPFIND` request.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the method name is a valid token.
    pub fn propfind(url: Url) -> Result<Self, CalDavError> {
        Ok(Self::new(dav_method("PROPFIND")?, url))
    }

    /// `REPORT` request.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the method name is a valid token.
    pub fn report(url: Url) -> Result<Self, CalDavError> {
        Ok(Self::new(dav_method("REPORT")?, url))
    }

    /// `PROPPATCH` request.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the method name is a valid token.
    pub fn proppatch(url: Url) -> Result<Self, CalDavError> {
        Ok(Self::new(dav_method("PROPPATCH")?, url))
    }

    /// `MKCOL` request.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the method name is a valid token.
    pub fn mkcol(url: Url) -> Result<Self, CalDavError> {
        Ok(Self::new(dav_method("MKCOL")?, url))
    }

    /// Sets the `Depth` header.
    #[must_use]
    pub const fn depth(mut self, depth: u8) -> Self {
        self.depth = Some(depth);
        self
    }

    /// Attaches an XML body.
    #[must_use]
    pub fn xml(mut self, body: String) -> Self {
        self.body = Some((XML_CONTENT_TYPE, body));
        self
    }

    /// Attaches an iCalendar body.
    #[must_use]
    pub fn calendar(mut self, body: String) -> Self {
        self.body = Some((ICAL_CONTENT_TYPE, body));
        self
    }

    /// Follows redirects. Only discovery requests do this.
    #[must_use]
    pub const fn follow_redirects(mut self) -> Self {
        self.follow_redirects = true;
        self
    }
}

/// Status, effective URL and body of a response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    /// HTTP status.
    pub status: StatusCode,
    /// URL after redirects, if any were followed.
    pub url: Url,
    /// Response body.
    pub body: String,
}

impl HttpResponse {
    /// Whether the status is one a `CalDAV` operation treats as success.
    #[must_use]
    pub fn is_success(&self) -> bool {
        matches!(
            self.status,
            StatusCode::OK | StatusCode::CREATED | StatusCode::NO_CONTENT | StatusCode::MULTI_STATUS
        )
    }

    /// Turns a non-success status into a protocol error.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::Protocol`] carrying the status and URL.
    pub fn error_for_status(self) -> Result<Self, CalDavError> {
        if self.is_success() {
            Ok(self)
        } else {
            tracing::warn!(status = %self.status, url = %self.url, body = %self.body, "unexpected response status");
            Err(CalDavError::Protocol(format!(
                "{} returned {}",
                self.url, self.status
            )))
        }
    }
}

/// HTTP client for `CalDAV` operations.
#[derive(Debug, Clone)]
pub struct HttpClient {
    client: Client,
    discovery: Client,
    auth: AuthMethod,
    cancel: CancellationToken,
}

impl HttpClient {
    /// Creates a new HTTP client.
    ///
    /// # Errors
    ///
    /// Returns an error if HTTP client creation fails.
    pub fn new(config: &CalDavConfig, cancel: CancellationToken) -> Result<Self, CalDavError> {
        let timeout = Duration::from_secs(config.timeout_secs);
        let build = |policy| {
            Client::builder()
                .timeout(timeout)
                .user_agent(&config.user_agent)
                .redirect(policy)
                .build()
                .map_err(|e| CalDavError::Config(format!("cannot build HTTP client: {e}")))
        };
        Ok(Self {
            client: build(redirect::Policy::none())?,
            discovery: build(redirect::Policy::limited(10))?,
            auth: config.auth.clone(),
            cancel,
        })
    }

    /// Token checked before every request.
    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Sends a request and reads the whole body.
    ///
    /// Any status is returned as-is; use [`HttpResponse::error_for_status`]
    /// when only success is acceptable.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::Cancelled`] if the session was cancelled and
    /// [`CalDavError::Transport`] for connection, TLS or timeout failures.
    pub async fn send(&self, request: DavRequest) -> Result<HttpResponse, CalDavError> {
        if self.cancel.is_cancelled() {
            return Err(CalDavError::Cancelled);
        }

        let client = if request.follow_redirects {
            &self.discovery
        } else {
            &self.client
        };
        let mut req = client.request(request.method.clone(), request.url.clone());
        if let AuthMethod::Basic { username, password } = &self.auth {
            req = req.basic_auth(username, Some(password));
        }
        if let Some(depth) = request.depth {
            req = req.header("Depth", depth.to_string());
        }
        if let Some((content_type, body)) = request.body {
            req = req.header(CONTENT_TYPE, content_type).body(body);
        }

        let resp = req.send().await?;
        let status = resp.status();
        let url = resp.url().clone();
        let body = resp.text().await?;
        tracing::debug!(method = %request.method, url = %request.url, depth = ?request.depth, %status, "request finished");

        Ok(HttpResponse { status, url, body })
    }
}

fn dav_method(name: &'static str) -> Result<Method, CalDavError> {
    Method::from_bytes(name.as_bytes())
        .map_err(|e| CalDavError::Config(format!("invalid method {name}: {e}")))
}
