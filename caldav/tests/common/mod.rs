// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Mock `CalDAV` server fixtures shared by the integration tests.

#![allow(dead_code)]

use errands_caldav::{AuthMethod, CalDavConfig, CancellationToken, Client, Href};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const PRINCIPAL: &str = "/principals/user/";
pub const HOME: &str = "/calendars/user/";
pub const WORK: &str = "/calendars/user/work/";

pub fn config(base_url: impl Into<String>) -> CalDavConfig {
    CalDavConfig {
        base_url: base_url.into(),
        auth: AuthMethod::Basic {
            username: "user".to_string(),
            password: "secret".to_string(),
        },
        timeout_secs: 5,
        ..Default::default()
    }
}

pub fn multistatus(responses: &str) -> String {
    format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav" xmlns:cs="http://calendarserver.org/ns/" xmlns:ic="http://apple.com/ns/ical/">
{responses}
</d:multistatus>"#
    )
}

pub fn xml_response(body: String) -> ResponseTemplate {
    ResponseTemplate::new(207).set_body_raw(body, "application/xml; charset=utf-8")
}

pub fn ok_propstat(href: &str, props: &str) -> String {
    format!(
        r"<d:response>
  <d:href>{href}</d:href>
  <d:propstat>
    <d:prop>{props}</d:prop>
    <d:status>HTTP/1.1 200 OK</d:status>
  </d:propstat>
</d:response>"
    )
}

pub fn principal_response(href: &str) -> String {
    ok_propstat(
        href,
        &format!("<d:current-user-principal><d:href>{PRINCIPAL}</d:href></d:current-user-principal>"),
    )
}

pub fn home_set_response() -> String {
    ok_propstat(
        PRINCIPAL,
        &format!("<c:calendar-home-set><d:href>{HOME}</d:href></c:calendar-home-set>"),
    )
}

pub fn home_response() -> String {
    ok_propstat(
        HOME,
        "<d:resourcetype><d:collection/></d:resourcetype><d:displayname>Home</d:displayname>",
    )
}

pub fn calendar_response(href: &str, name: &str, ctag: &str) -> String {
    ok_propstat(
        href,
        &format!(
            r#"<d:resourcetype><d:collection/><c:calendar/></d:resourcetype>
<d:displayname>{name}</d:displayname>
<cs:getctag>{ctag}</cs:getctag>
<c:supported-calendar-component-set><c:comp name="VTODO"/></c:supported-calendar-component-set>
<ic:calendar-color>#3584e4</ic:calendar-color>"#
        ),
    )
}

pub fn etag_response(href: &str, etag: &str) -> String {
    ok_propstat(href, &format!("<d:getetag>{etag}</d:getetag>"))
}

pub fn data_response(href: &str, etag: &str, ical: &str) -> String {
    ok_propstat(
        href,
        &format!("<d:getetag>{etag}</d:getetag><c:calendar-data>{ical}</c:calendar-data>"),
    )
}

pub fn not_found_response(href: &str) -> String {
    format!(
        r"<d:response>
  <d:href>{href}</d:href>
  <d:status>HTTP/1.1 404 Not Found</d:status>
</d:response>"
    )
}

pub fn vtodo(uid: &str, summary: &str) -> String {
    format!(
        "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:-//Errands//EN\r\nBEGIN:VTODO\r\nUID:{uid}\r\nSUMMARY:{summary}\r\nLAST-MODIFIED:20260101T120000Z\r\nEND:VTODO\r\nEND:VCALENDAR"
    )
}

pub fn event_href(uid: &str) -> String {
    format!("{WORK}{uid}.ics")
}

/// Mounts principal and home-set discovery under `/dav/`.
pub async fn mount_discovery(server: &MockServer) {
    Mock::given(method("PROPFIND"))
        .and(path("/dav/"))
        .and(header("Depth", "0"))
        .respond_with(xml_response(multistatus(&principal_response("/dav/"))))
        .mount(server)
        .await;

    Mock::given(method("PROPFIND"))
        .and(path(PRINCIPAL))
        .and(header("Depth", "0"))
        .and(body_string_contains("calendar-home-set"))
        .respond_with(xml_response(multistatus(&home_set_response())))
        .mount(server)
        .await;
}

/// Mounts a home set listing `work` with the given ctag.
pub async fn mount_calendar_list(server: &MockServer, ctag: &str) {
    Mock::given(method("PROPFIND"))
        .and(path(HOME))
        .and(header("Depth", "1"))
        .respond_with(xml_response(multistatus(&format!(
            "{}\n{}",
            home_response(),
            calendar_response(WORK, "Work", ctag)
        ))))
        .mount(server)
        .await;
}

pub async fn connect(server: &MockServer) -> Client {
    mount_discovery(server).await;
    Client::discover(config(format!("{}/dav/", server.uri())), CancellationToken::new())
        .await
        .expect("discovery against mock server")
}

/// Discovered client that already knows the `work` calendar; mocks are reset.
pub async fn connect_with_work(server: &MockServer) -> (Client, Href) {
    let mut client = connect(server).await;
    mount_calendar_list(server, "\"1\"").await;
    client.pull_calendars().await.expect("calendar list");
    server.reset().await;

    let href = Href::new(format!("{}{WORK}", server.uri()));
    assert!(client.calendar(&href).is_some());
    (client, href)
}

/// Mounts the three REPORTs of an event pull: the `ETag` listing, the body
/// fetch and the deletion check.
pub async fn mount_event_reports(
    server: &MockServer,
    listing: &str,
    bodies: &str,
    existing: &str,
    expected_fetches: u64,
) {
    Mock::given(method("REPORT"))
        .and(path(WORK))
        .and(body_string_contains("calendar-query"))
        .respond_with(xml_response(multistatus(listing)))
        .expect(1)
        .mount(server)
        .await;

    Mock::given(method("REPORT"))
        .and(path(WORK))
        .and(body_string_contains("calendar-multiget"))
        .and(body_string_contains("calendar-data"))
        .respond_with(xml_response(multistatus(bodies)))
        .with_priority(1)
        .expect(expected_fetches)
        .mount(server)
        .await;

    Mock::given(method("REPORT"))
        .and(path(WORK))
        .and(body_string_contains("calendar-multiget"))
        .respond_with(xml_response(multistatus(existing)))
        .with_priority(2)
        .mount(server)
        .await;
}
