// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Create, update and delete operations on calendars and events.
//!
//! Every operation is a single request (plus an optional re-read). Local
//! state is only touched after the server confirmed the change.

use reqwest::{Method, StatusCode};
use url::Url;

use crate::client::Client;
use crate::error::CalDavError;
use crate::http::{DavRequest, HttpResponse};
use crate::request::{CALENDAR_PROPS, CalendarPatch, MkColRequest, PropFindRequest};
use crate::response::MultiStatusResponse;
use crate::types::{ComponentSet, Href};

impl Client {
    /// Creates a calendar collection `{home-set}{uid}/` with an extended MKCOL.
    ///
    /// The calendar is not added locally; the next
    /// [`pull_calendars`](Client::pull_calendars) discovers it.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the server rejects it.
    #[tracing::instrument(skip(self, description, color))]
    pub async fn create_calendar(
        &self,
        uid: &str,
        display_name: &str,
        description: Option<&str>,
        color: Option<&str>,
        components: ComponentSet,
    ) -> Result<Href, CalDavError> {
        let url = member_url(&self.home_set_url, &[uid, ""])?;
        let body = MkColRequest {
            display_name,
            description,
            color,
            components,
        }
        .build();

        self.http
            .send(DavRequest::mkcol(url.clone())?.xml(body))
            .await?
            .error_for_status()?;
        tracing::info!(%url, "calendar created");
        Ok(Href::new(url.to_string()))
    }

    /// Changes name, description or color of a calendar.
    ///
    /// On success the properties are read back from the server and stored,
    /// so the local copy reflects what the server actually kept.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::NotFound`] for an unknown calendar,
    /// [`CalDavError::Protocol`] if the server refused any property, and
    /// transport or parse errors of either request.
    #[tracing::instrument(skip(self, patch))]
    pub async fn update_calendar(
        &mut self,
        calendar: &Href,
        patch: &CalendarPatch,
    ) -> Result<(), CalDavError> {
        let index = self.calendar_index(calendar)?;
        if patch.is_empty() {
            return Ok(());
        }
        let url = Url::parse(calendar)?;

        let resp = self
            .http
            .send(DavRequest::proppatch(url.clone())?.xml(patch.build()))
            .await?
            .error_for_status()?;
        if resp.status == StatusCode::MULTI_STATUS {
            let refused: Vec<String> = MultiStatusResponse::from_xml(&resp.body)?
                .responses
                .iter()
                .flat_map(|r| r.prop_stats.iter())
                .filter(|p| !p.is_ok())
                .map(|p| p.status.clone())
                .collect();
            if !refused.is_empty() {
                return Err(CalDavError::Protocol(format!(
                    "PROPPATCH on {url} refused: {}",
                    refused.join(", ")
                )));
            }
        }

        let body = CALENDAR_PROPS.into_iter().collect::<PropFindRequest>().build();
        let resp = self
            .http
            .send(DavRequest::propfind(url.clone())?.depth(0).xml(body))
            .await?
            .error_for_status()?;
        let props = MultiStatusResponse::from_xml(&resp.body)?
            .responses
            .iter()
            .find_map(|r| r.ok_props().cloned())
            .ok_or_else(|| {
                CalDavError::Protocol(format!("no properties returned for {url}"))
            })?;

        if let Some(calendar) = self.calendars.get_mut(index) {
            calendar.apply(props);
        }
        Ok(())
    }

    /// Deletes a calendar and marks it deleted locally.
    ///
    /// A calendar already gone on the server counts as deleted.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::NotFound`] for an unknown calendar and any
    /// transport or status error of the request.
    #[tracing::instrument(skip(self))]
    pub async fn delete_calendar(&mut self, calendar: &Href) -> Result<(), CalDavError> {
        let index = self.calendar_index(calendar)?;
        self.delete(Url::parse(calendar)?).await?;
        if let Some(calendar) = self.calendars.get_mut(index) {
            calendar.deleted = true;
        }
        Ok(())
    }

    /// Uploads a new resource `{calendar}{uid}.ics`, returning its href.
    ///
    /// The event is not added locally; the next
    /// [`pull_events`](Client::pull_events) fetches it with its server `ETag`.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::NotFound`] for an unknown calendar and any
    /// transport or status error of the request.
    #[tracing::instrument(skip(self, ical))]
    pub async fn create_event(
        &self,
        calendar: &Href,
        uid: &str,
        ical: &str,
    ) -> Result<Href, CalDavError> {
        self.calendar_index(calendar)?;
        let url = member_url(&Url::parse(calendar)?, &[&format!("{uid}.ics")])?;
        self.put(url.clone(), ical).await?;
        tracing::info!(%url, "event created");
        Ok(Href::new(url.path().to_string()))
    }

    /// Replaces the body of an event, then re-reads its `ETag` and data.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::NotFound`] for an unknown calendar or event,
    /// [`CalDavError::Protocol`] if the re-read returns no data, and any
    /// transport or status error of either request.
    #[tracing::instrument(skip(self, ical))]
    pub async fn update_event(
        &mut self,
        calendar: &Href,
        event: &Href,
        ical: &str,
    ) -> Result<(), CalDavError> {
        let index = self.calendar_index(calendar)?;
        if self.calendars.get(index).and_then(|c| c.event(event)).is_none() {
            return Err(CalDavError::NotFound(event.clone()));
        }
        self.put(self.resolve(event)?, ical).await?;

        let url = Url::parse(calendar)?;
        let fetched = self.multiget(&url, std::slice::from_ref(event), true).await?;
        let (etag, data) = fetched
            .responses
            .into_iter()
            .filter(|r| r.href == *event)
            .find_map(|r| {
                let props = r.ok_props()?;
                Some((props.etag.clone()?, props.calendar_data.clone()?))
            })
            .ok_or_else(|| CalDavError::Protocol(format!("cannot re-read {event} after update")))?;

        if let Some(event) = self.calendars.get_mut(index).and_then(|c| c.event_mut(event)) {
            event.refresh(etag, data);
        }
        Ok(())
    }

    /// Deletes an event and marks it deleted locally.
    ///
    /// An event already gone on the server counts as deleted.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::NotFound`] for an unknown calendar or event and
    /// any transport or status error of the request.
    #[tracing::instrument(skip(self))]
    pub async fn delete_event(&mut self, calendar: &Href, event: &Href) -> Result<(), CalDavError> {
        let index = self.calendar_index(calendar)?;
        if self.calendars.get(index).and_then(|c| c.event(event)).is_none() {
            return Err(CalDavError::NotFound(event.clone()));
        }
        self.delete(self.resolve(event)?).await?;
        if let Some(event) = self.calendars.get_mut(index).and_then(|c| c.event_mut(event)) {
            event.deleted = true;
        }
        Ok(())
    }

    async fn put(&self, url: Url, ical: &str) -> Result<HttpResponse, CalDavError> {
        self.http
            .send(DavRequest::new(Method::PUT, url).calendar(ical.to_string()))
            .await?
            .error_for_status()
    }

    async fn delete(&self, url: Url) -> Result<(), CalDavError> {
        let resp = self.http.send(DavRequest::new(Method::DELETE, url)).await?;
        if resp.status == StatusCode::NOT_FOUND {
            tracing::debug!(url = %resp.url, "already deleted on server");
            return Ok(());
        }
        resp.error_for_status().map(|_| ())
    }
}

/// `url` with a trailing slash, so joining appends instead of replacing.
/// Appends path segments to a collection URL, percent-encoding each one.
///
/// A uid is never parsed as a relative reference, so `urn:uuid:...` stays
/// inside the collection.
fn member_url(collection: &Url, segments: &[&str]) -> Result<Url, CalDavError> {
    let mut url = collection.clone();
    url.path_segments_mut()
        .map_err(|()| CalDavError::Config(format!("{collection} cannot hold members")))?
        .pop_if_empty()
        .extend(segments);
    Ok(url)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn member_url_stays_in_collection() {
        let home = Url::parse("https://dav.example.com/calendars/user").unwrap();
        let work = member_url(&home, &["work", ""]).unwrap();
        assert_eq!(work.as_str(), "https://dav.example.com/calendars/user/work/");
        assert_eq!(member_url(&work, &["t1.ics"]).unwrap().path(), "/calendars/user/work/t1.ics");

        let urn = member_url(&work, &["urn:uuid:1234.ics"]).unwrap();
        assert_eq!(urn.path(), "/calendars/user/work/urn:uuid:1234.ics");
        let odd = member_url(&work, &["a/b?c#d.ics"]).unwrap();
        assert_eq!(odd.path(), "/calendars/user/work/a%2Fb%3Fc%23d.ics");
        assert_eq!(odd.query(), None);

        let mailto = Url::parse("mailto:user@example.com").unwrap();
        assert!(matches!(member_url(&mailto, &["x"]), Err(CalDavError::Config(_))));
    }
}
