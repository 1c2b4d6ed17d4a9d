// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Principal and calendar-home-set discovery (RFC 5397, RFC 6764).

use reqwest::Method;
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::client::Client;
use crate::config::CalDavConfig;
use crate::error::CalDavError;
use crate::http::{DavRequest, HttpClient};
use crate::request::{Prop, PropFindRequest};
use crate::response::MultiStatusResponse;

const WELL_KNOWN_PATH: &str = "/.well-known/caldav";

impl Client {
    /// Discovers the principal and calendar home set behind `config.base_url`.
    ///
    /// The base URL is tried as given; without a scheme, `https://` and then
    /// `http://` are tried. If none answers `current-user-principal`, the
    /// `/.well-known/caldav` redirect is followed (HTTPS first) and the
    /// redirect target is probed instead.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::Discovery`] when the fallback chain is exhausted
    /// or the home set cannot be read, [`CalDavError::Cancelled`] if `cancel`
    /// fires, and [`CalDavError::Config`] for an unusable URL.
    #[tracing::instrument(skip(config, cancel), fields(base_url = %config.base_url))]
    pub async fn discover(config: CalDavConfig, cancel: CancellationToken) -> Result<Self, CalDavError> {
        let http = HttpClient::new(&config, cancel)?;
        let candidates = candidate_urls(&config.base_url)?;

        let mut found = None;
        for url in &candidates {
            if let Some(principal) = try_principal(&http, url).await? {
                found = Some((url.clone(), principal));
                break;
            }
        }

        if found.is_none() {
            tracing::info!("direct principal discovery failed, trying {WELL_KNOWN_PATH}");
            found = well_known_principal(&http, &candidates).await?;
        }

        let Some((base, principal_url)) = found else {
            return Err(CalDavError::Discovery(format!(
                "no current-user-principal found for {}",
                config.base_url
            )));
        };

        let base_url = origin(&base)?;
        let home_href = find_home_set(&http, &principal_url).await?;
        let home_set_url = base_url.join(&home_href)?;
        tracing::info!(%base_url, %principal_url, %home_set_url, "discovered CalDAV endpoints");

        Ok(Self {
            http,
            base_url,
            principal_url,
            home_set_url,
            calendars: Vec::new(),
        })
    }
}

/// URLs to try for direct principal discovery, in order.
fn candidate_urls(base_url: &str) -> Result<Vec<Url>, CalDavError> {
    let base_url = base_url.trim();
    if base_url.is_empty() {
        return Err(CalDavError::Config("base URL is empty".to_string()));
    }

    if base_url.contains("://") {
        return Ok(vec![Url::parse(base_url)?]);
    }
    let urls: Vec<Url> = ["https", "http"]
        .into_iter()
        .filter_map(|scheme| Url::parse(&format!("{scheme}://{base_url}")).ok())
        .collect();
    if urls.is_empty() {
        return Err(CalDavError::Config(format!("invalid base URL: {base_url}")));
    }
    Ok(urls)
}

/// Scheme, host and port of `url`, with an empty path.
fn origin(url: &Url) -> Result<Url, CalDavError> {
    let mut origin = url.clone();
    origin.set_path("/");
    origin.set_query(None);
    origin.set_fragment(None);
    origin
        .set_username("")
        .and_then(|()| origin.set_password(None))
        .map_err(|()| CalDavError::Config(format!("URL cannot carry credentials: {url}")))?;
    Ok(origin)
}

/// Probes one URL for the principal; any failure other than cancellation
/// counts as "no usable href".
async fn try_principal(http: &HttpClient, url: &Url) -> Result<Option<Url>, CalDavError> {
    match find_principal(http, url).await {
        Ok(Some(principal)) => Ok(Some(principal)),
        Ok(None) => {
            tracing::debug!(%url, "no current-user-principal in response");
            Ok(None)
        }
        Err(CalDavError::Cancelled) => Err(CalDavError::Cancelled),
        Err(e) => {
            tracing::debug!(%url, error = %e, "principal discovery failed");
            Ok(None)
        }
    }
}

async fn find_principal(http: &HttpClient, url: &Url) -> Result<Option<Url>, CalDavError> {
    let body = [Prop::CurrentUserPrincipal]
        .into_iter()
        .collect::<PropFindRequest>()
        .build();
    let resp = http
        .send(
            DavRequest::propfind(url.clone())?
                .depth(0)
                .xml(body)
                .follow_redirects(),
        )
        .await?
        .error_for_status()?;

    let href = MultiStatusResponse::from_xml(&resp.body)?
        .responses
        .iter()
        .find_map(|r| r.ok_props()?.current_user_principal.clone());
    href.map(|href| resp.url.join(&href))
        .transpose()
        .map_err(CalDavError::from)
}

async fn well_known_principal(
    http: &HttpClient,
    candidates: &[Url],
) -> Result<Option<(Url, Url)>, CalDavError> {
    let Some(authority) = candidates.first().and_then(authority) else {
        return Ok(None);
    };

    for scheme in ["https", "http"] {
        let well_known = Url::parse(&format!("{scheme}://{authority}{WELL_KNOWN_PATH}"))?;
        let resp = match http
            .send(DavRequest::new(Method::GET, well_known.clone()).follow_redirects())
            .await
        {
            Ok(resp) => resp,
            Err(CalDavError::Cancelled) => return Err(CalDavError::Cancelled),
            Err(e) => {
                tracing::debug!(url = %well_known, error = %e, "well-known request failed");
                continue;
            }
        };

        if resp.url == well_known && !resp.is_success() {
            tracing::debug!(url = %well_known, status = %resp.status, "well-known did not redirect");
            continue;
        }
        tracing::info!(target = %resp.url, "following well-known redirect");
        if let Some(principal) = try_principal(http, &resp.url).await? {
            return Ok(Some((resp.url, principal)));
        }
    }
    Ok(None)
}

fn authority(url: &Url) -> Option<String> {
    let host = url.host_str()?;
    Some(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

async fn find_home_set(http: &HttpClient, principal: &Url) -> Result<String, CalDavError> {
    let discovery_error = |e: CalDavError| match e {
        CalDavError::Cancelled => CalDavError::Cancelled,
        e => CalDavError::Discovery(format!("cannot read calendar-home-set of {principal}: {e}")),
    };

    let body = [Prop::CalendarHomeSet]
        .into_iter()
        .collect::<PropFindRequest>()
        .build();
    let resp = http
        .send(
            DavRequest::propfind(principal.clone())
                .map_err(discovery_error)?
                .depth(0)
                .xml(body)
                .follow_redirects(),
        )
        .await
        .and_then(crate::http::HttpResponse::error_for_status)
        .map_err(discovery_error)?;

    MultiStatusResponse::from_xml(&resp.body)
        .map_err(discovery_error)?
        .responses
        .iter()
        .find_map(|r| r.ok_props()?.calendar_home_set.clone())
        .map(|href| href.to_string())
        .ok_or_else(|| {
            CalDavError::Discovery(format!("{principal} has no calendar-home-set href"))
        })
}
