// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! `CalDAV` client: calendar and event directories.

use std::collections::HashSet;

use tokio_util::sync::CancellationToken;
use url::Url;

use crate::error::CalDavError;
use crate::http::{DavRequest, HttpClient};
use crate::request::{CALENDAR_PROPS, CalendarMultiGetRequest, CalendarQueryRequest, PropFindRequest};
use crate::response::{MultiStatusResponse, Properties};
use crate::types::{Calendar, ETag, Event, Href};

/// `CalDAV` client for one sync session.
///
/// Created by [`Client::discover`]. The client exclusively owns the
/// calendars it has seen, and each calendar owns its events; pulls and
/// mutations are the only way they change.
///
/// # Example
///
/// ```ignore
/// use errands_caldav::{CalDavConfig, CancellationToken, Client};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = CalDavConfig::basic("dav.example.com", "user", "pass");
/// let mut client = Client::discover(config, CancellationToken::new()).await?;
/// client.pull_calendars().await?;
/// for href in client.changed_calendars() {
///     client.pull_events(&href).await?;
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct Client {
    pub(crate) http: HttpClient,
    pub(crate) base_url: Url,
    pub(crate) principal_url: Url,
    pub(crate) home_set_url: Url,
    pub(crate) calendars: Vec<Calendar>,
}

impl Client {
    /// Scheme, host and port of the server that answered discovery.
    #[must_use]
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Discovered current-user-principal URL.
    #[must_use]
    pub const fn principal_url(&self) -> &Url {
        &self.principal_url
    }

    /// Discovered calendar-home-set URL.
    #[must_use]
    pub const fn home_set_url(&self) -> &Url {
        &self.home_set_url
    }

    /// Token checked before every request of this client.
    #[must_use]
    pub const fn cancellation_token(&self) -> &CancellationToken {
        self.http.cancellation_token()
    }

    /// Known calendars, in no particular order. Index by href or uid.
    #[must_use]
    pub fn calendars(&self) -> &[Calendar] {
        &self.calendars
    }

    /// Looks up a calendar by href.
    #[must_use]
    pub fn calendar(&self, href: &str) -> Option<&Calendar> {
        self.calendars.iter().find(|c| c.href.as_str() == href)
    }

    /// Looks up a calendar by uid.
    #[must_use]
    pub fn calendar_by_uid(&self, uid: &str) -> Option<&Calendar> {
        self.calendars.iter().find(|c| c.uid == uid)
    }

    /// Hrefs of live calendars whose events changed in the last pull.
    #[must_use]
    pub fn changed_calendars(&self) -> Vec<Href> {
        self.calendars
            .iter()
            .filter(|c| c.events_changed && !c.deleted)
            .map(|c| c.href.clone())
            .collect()
    }

    /// Replaces the calendar list with state saved from an earlier session.
    ///
    /// Calendars with duplicate hrefs are dropped, keeping the first.
    pub fn restore_calendars(&mut self, calendars: Vec<Calendar>) {
        let mut seen = HashSet::new();
        self.calendars = calendars
            .into_iter()
            .filter(|c| seen.insert(c.href.clone()))
            .collect();
    }

    /// Forgets the `CTag` of a calendar so the next pull flags its events
    /// as changed again.
    pub fn invalidate_calendar(&mut self, href: &str) {
        if let Some(calendar) = self.calendars.iter_mut().find(|c| c.href.as_str() == href) {
            calendar.ctag = None;
        }
    }

    /// Consumes the client, returning its calendars.
    #[must_use]
    pub fn into_calendars(self) -> Vec<Calendar> {
        self.calendars
    }

    /// Lists calendars under the home set and reconciles them with the known ones.
    ///
    /// Calendars marked deleted by the previous pull are dropped first.
    /// New calendars get `events_changed`; calendars no longer listed are
    /// marked deleted. Nothing changes if the request or parsing fails.
    ///
    /// # Errors
    ///
    /// Returns an error on transport failure, non-success status or
    /// malformed response.
    #[tracing::instrument(skip(self), fields(home = %self.home_set_url))]
    pub async fn pull_calendars(&mut self) -> Result<(), CalDavError> {
        let body = CALENDAR_PROPS.into_iter().collect::<PropFindRequest>().build();
        let resp = self
            .http
            .send(
                DavRequest::propfind(self.home_set_url.clone())?
                    .depth(1)
                    .xml(body),
            )
            .await?
            .error_for_status()?;
        let multistatus = MultiStatusResponse::from_xml(&resp.body)?;

        let mut observed = Vec::new();
        for response in &multistatus.responses {
            let Some(props) = response.ok_props() else {
                tracing::debug!(href = %response.href, "skipping response without 200 propstat");
                continue;
            };
            if !props.is_calendar {
                continue;
            }
            let href = Href::new(self.base_url.join(&response.href)?.to_string());
            observed.push((href, props.clone()));
        }

        self.calendars.retain(|c| !c.deleted);
        for calendar in &mut self.calendars {
            calendar.properties_changed = false;
            calendar.events_changed = false;
        }

        let mut seen = HashSet::new();
        for (href, props) in observed {
            if !seen.insert(href.clone()) {
                continue;
            }
            match self.calendars.iter_mut().find(|c| c.href == href) {
                Some(calendar) => calendar.apply(props),
                None => {
                    tracing::info!(%href, "new calendar");
                    let mut calendar = Calendar::new(href);
                    calendar.apply(props);
                    calendar.properties_changed = false;
                    calendar.events_changed = true;
                    self.calendars.push(calendar);
                }
            }
        }

        for calendar in &mut self.calendars {
            if !seen.contains(&calendar.href) {
                tracing::info!(href = %calendar.href, "calendar removed on server");
                calendar.deleted = true;
            }
        }
        Ok(())
    }

    /// Synchronizes the events of one calendar.
    ///
    /// Events marked deleted by the previous call are dropped, the cheap
    /// `ETag` listing decides which bodies to fetch, and a multiget over all
    /// known hrefs marks the ones answering 404 as deleted. Changes are only
    /// committed once every step succeeded.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::NotFound`] for an unknown calendar and any
    /// transport, protocol or parse error of the three requests.
    #[tracing::instrument(skip(self))]
    pub async fn pull_events(&mut self, calendar: &Href) -> Result<(), CalDavError> {
        let index = self.calendar_index(calendar)?;
        let url = Url::parse(calendar)?;
        let mut events: Vec<Event> = self
            .calendars
            .get(index)
            .map(|c| c.events.iter().filter(|e| !e.deleted).cloned().collect())
            .unwrap_or_default();

        let changed = self.list_etags(&url, &mut events).await?;
        let filled = if changed.is_empty() {
            0
        } else {
            self.fetch_bodies(&url, &changed, &mut events).await?
        };
        self.detect_deletions(&url, &mut events).await?;

        // Bodies may all be gone if the events were deleted after the listing.
        if !changed.is_empty() && filled == 0 {
            let missing = events
                .iter()
                .filter(|e| !e.deleted && e.ical.is_none() && changed.contains(&e.href))
                .count();
            if missing > 0 {
                return Err(CalDavError::Protocol(format!(
                    "calendar-multiget for {} returned no calendar data",
                    changed.len()
                )));
            }
        }

        if let Some(calendar) = self.calendars.get_mut(index) {
            calendar.events = events;
        }
        Ok(())
    }

    /// Pulls events of every calendar flagged `events_changed`.
    ///
    /// A failing calendar does not stop the others; failures are returned
    /// per calendar href.
    pub async fn pull_changed_events(&mut self) -> Vec<(Href, CalDavError)> {
        let mut failures = Vec::new();
        for href in self.changed_calendars() {
            if let Err(e) = self.pull_events(&href).await {
                tracing::warn!(%href, error = %e, "failed to pull events");
                failures.push((href, e));
            }
        }
        failures
    }

    async fn list_etags(&self, url: &Url, events: &mut Vec<Event>) -> Result<Vec<Href>, CalDavError> {
        let resp = self
            .http
            .send(
                DavRequest::report(url.clone())?
                    .depth(1)
                    .xml(CalendarQueryRequest::new().build()),
            )
            .await?
            .error_for_status()?;
        let multistatus = MultiStatusResponse::from_xml(&resp.body)?;

        let mut changed = Vec::new();
        for response in multistatus.responses {
            let Some(etag) = response.ok_props().and_then(|p| p.etag.clone()) else {
                continue;
            };
            match events.iter_mut().find(|e| e.href == response.href) {
                Some(event) if event.etag != etag || event.ical.is_none() => {
                    event.etag = etag;
                    changed.push(response.href);
                }
                Some(_) => {}
                None => {
                    events.push(Event::new(response.href.clone(), etag));
                    changed.push(response.href);
                }
            }
        }
        tracing::debug!(changed = changed.len(), "listed event etags");
        Ok(changed)
    }

    async fn fetch_bodies(
        &self,
        url: &Url,
        hrefs: &[Href],
        events: &mut [Event],
    ) -> Result<usize, CalDavError> {
        let fetched = self.multiget(url, hrefs, true).await?;
        let mut filled = 0_usize;
        for response in fetched.responses {
            let Some(props) = response.ok_props() else {
                continue;
            };
            let Some(data) = &props.calendar_data else {
                continue;
            };
            if let Some(event) = events.iter_mut().find(|e| e.href == response.href) {
                event.ical = Some(data.clone());
                if let Some(etag) = &props.etag {
                    event.etag = etag.clone();
                }
                filled += 1;
            }
        }
        Ok(filled)
    }

    async fn detect_deletions(&self, url: &Url, events: &mut [Event]) -> Result<(), CalDavError> {
        if events.is_empty() {
            return Ok(());
        }
        let hrefs: Vec<Href> = events.iter().map(|e| e.href.clone()).collect();
        let checked = self.multiget(url, &hrefs, false).await?;
        for response in checked.responses.iter().filter(|r| r.is_not_found()) {
            if let Some(event) = events.iter_mut().find(|e| e.href == response.href) {
                tracing::info!(href = %event.href, "event removed on server");
                event.deleted = true;
            }
        }
        Ok(())
    }

    pub(crate) async fn multiget(
        &self,
        url: &Url,
        hrefs: &[Href],
        with_data: bool,
    ) -> Result<MultiStatusResponse, CalDavError> {
        let mut request = CalendarMultiGetRequest::new();
        if with_data {
            request = request.with_data();
        }
        for href in hrefs {
            request.add_href(href);
        }

        let resp = self
            .http
            .send(DavRequest::report(url.clone())?.depth(1).xml(request.build()))
            .await?
            .error_for_status()?;
        MultiStatusResponse::from_xml(&resp.body)
    }

    pub(crate) fn calendar_index(&self, href: &str) -> Result<usize, CalDavError> {
        self.calendars
            .iter()
            .position(|c| c.href.as_str() == href)
            .ok_or_else(|| CalDavError::NotFound(Href::from(href)))
    }

    pub(crate) fn resolve(&self, href: &str) -> Result<Url, CalDavError> {
        Ok(self.base_url.join(href)?)
    }
}

impl Calendar {
    /// Copies listed properties, raising the change flags on differences.
    pub(crate) fn apply(&mut self, props: Properties) {
        let Properties {
            display_name,
            calendar_description,
            calendar_color,
            ctag,
            components,
            ..
        } = props;

        if self.display_name != display_name
            || self.description != calendar_description
            || self.color != calendar_color
        {
            self.display_name = display_name;
            self.description = calendar_description;
            self.color = calendar_color;
            self.properties_changed = true;
        }
        if self.ctag != ctag {
            self.ctag = ctag;
            self.events_changed = true;
        }
        if let Some(components) = components {
            self.components = components;
        }
    }
}

impl Event {
    pub(crate) fn refresh(&mut self, etag: ETag, ical: String) {
        self.etag = etag;
        self.ical = Some(ical);
    }
}
