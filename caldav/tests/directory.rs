// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Calendar and event directory tests against a mock server.

mod common;

use common::{
    HOME, WORK, calendar_response, connect, connect_with_work, data_response, etag_response,
    event_href, home_response, mount_calendar_list, mount_event_reports, multistatus,
    not_found_response, vtodo, xml_response,
};
use errands_caldav::{CalDavError, ComponentSet, Href};
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn pull_calendars_discovers_new_calendar() {
    let server = MockServer::start().await;
    let mut client = connect(&server).await;
    mount_calendar_list(&server, "\"1\"").await;

    client.pull_calendars().await.unwrap();

    assert_eq!(client.calendars().len(), 1, "home collection is not a calendar");
    let calendar = &client.calendars()[0];
    assert_eq!(calendar.href().as_str(), format!("{}{WORK}", server.uri()));
    assert_eq!(calendar.uid(), "work");
    assert_eq!(calendar.display_name(), Some("Work"));
    assert_eq!(calendar.color(), Some("#3584e4"));
    assert_eq!(calendar.ctag().map(|c| c.as_str()), Some("\"1\""));
    assert_eq!(calendar.components(), ComponentSet::VTODO);
    assert!(calendar.events_changed());
    assert!(!calendar.properties_changed());
    assert!(!calendar.is_deleted());
    assert_eq!(client.changed_calendars().len(), 1);
}

#[tokio::test]
async fn pull_calendars_twice_is_idempotent() {
    let server = MockServer::start().await;
    let mut client = connect(&server).await;
    mount_calendar_list(&server, "\"1\"").await;

    client.pull_calendars().await.unwrap();
    client.pull_calendars().await.unwrap();

    let calendar = &client.calendars()[0];
    assert!(!calendar.events_changed());
    assert!(!calendar.properties_changed());
    assert!(client.changed_calendars().is_empty());
}

#[tokio::test]
async fn pull_calendars_flags_changes() {
    let server = MockServer::start().await;
    let (mut client, href) = connect_with_work(&server).await;

    Mock::given(method("PROPFIND"))
        .and(path(HOME))
        .and(header("Depth", "1"))
        .respond_with(xml_response(multistatus(&calendar_response(
            WORK, "Office", "\"2\"",
        ))))
        .mount(&server)
        .await;
    client.pull_calendars().await.unwrap();

    let calendar = client.calendar(&href).unwrap();
    assert_eq!(calendar.display_name(), Some("Office"));
    assert!(calendar.properties_changed());
    assert!(calendar.events_changed());
}

#[tokio::test]
async fn pull_calendars_marks_then_removes_deleted() {
    let server = MockServer::start().await;
    let (mut client, href) = connect_with_work(&server).await;

    Mock::given(method("PROPFIND"))
        .and(path(HOME))
        .respond_with(xml_response(multistatus(&home_response())))
        .mount(&server)
        .await;

    client.pull_calendars().await.unwrap();
    assert!(client.calendar(&href).unwrap().is_deleted());
    assert!(client.changed_calendars().is_empty());

    client.pull_calendars().await.unwrap();
    assert!(client.calendar(&href).is_none());
}

#[tokio::test]
async fn pull_calendars_failure_keeps_state() {
    let server = MockServer::start().await;
    let (mut client, href) = connect_with_work(&server).await;

    Mock::given(method("PROPFIND"))
        .and(path(HOME))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;
    let err = client.pull_calendars().await.unwrap_err();
    assert!(matches!(err, CalDavError::Protocol(_)), "got {err:?}");

    server.reset().await;
    Mock::given(method("PROPFIND"))
        .and(path(HOME))
        .respond_with(ResponseTemplate::new(207).set_body_raw("<d:multistatus", "application/xml"))
        .mount(&server)
        .await;
    let err = client.pull_calendars().await.unwrap_err();
    assert!(matches!(err, CalDavError::Parse(_)), "got {err:?}");

    let calendar = client.calendar(&href).unwrap();
    assert!(!calendar.is_deleted());
    assert!(calendar.events_changed(), "flags of the last good pull survive");
}

#[tokio::test]
async fn pull_events_scenario() {
    let server = MockServer::start().await;
    let (mut client, calendar) = connect_with_work(&server).await;
    let t1 = event_href("t1");
    let body_a = vtodo("t1", "Buy milk");

    // First pull fetches the one event.
    mount_event_reports(
        &server,
        &etag_response(&t1, "\"a\""),
        &data_response(&t1, "\"a\"", &body_a),
        &etag_response(&t1, "\"a\""),
        1,
    )
    .await;
    client.pull_events(&calendar).await.unwrap();
    server.verify().await;

    let events = client.calendar(&calendar).unwrap().events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].href().as_str(), t1);
    assert_eq!(events[0].etag().as_str(), "\"a\"");
    assert_eq!(events[0].ical(), Some(body_a.as_str()));

    // Unchanged server: only listing and deletion check, no body fetch.
    server.reset().await;
    mount_event_reports(
        &server,
        &etag_response(&t1, "\"a\""),
        "",
        &etag_response(&t1, "\"a\""),
        0,
    )
    .await;
    client.pull_events(&calendar).await.unwrap();
    server.verify().await;
    assert_eq!(client.calendar(&calendar).unwrap().events()[0].ical(), Some(body_a.as_str()));

    // Server-side update: exactly that body is fetched again.
    server.reset().await;
    let body_b = vtodo("t1", "Buy oat milk");
    mount_event_reports(
        &server,
        &etag_response(&t1, "\"b\""),
        &data_response(&t1, "\"b\"", &body_b),
        &etag_response(&t1, "\"b\""),
        1,
    )
    .await;
    client.pull_events(&calendar).await.unwrap();
    server.verify().await;

    let events = client.calendar(&calendar).unwrap().events();
    assert_eq!(events.len(), 1);
    assert_eq!(events[0].href().as_str(), t1);
    assert_eq!(events[0].etag().as_str(), "\"b\"");
    assert_eq!(events[0].ical(), Some(body_b.as_str()));
}

#[tokio::test]
async fn pull_events_detects_deletion() {
    let server = MockServer::start().await;
    let (mut client, calendar) = connect_with_work(&server).await;
    let t1 = event_href("t1");

    mount_event_reports(
        &server,
        &etag_response(&t1, "\"a\""),
        &data_response(&t1, "\"a\"", &vtodo("t1", "Buy milk")),
        &etag_response(&t1, "\"a\""),
        1,
    )
    .await;
    client.pull_events(&calendar).await.unwrap();

    // The event is gone: no longer listed, 404 in the deletion check.
    server.reset().await;
    mount_event_reports(&server, "", "", &not_found_response(&t1), 0).await;
    client.pull_events(&calendar).await.unwrap();
    server.verify().await;

    let event = client.calendar(&calendar).unwrap().event(&t1).unwrap();
    assert!(event.is_deleted());

    // The tombstone is dropped on the following pull.
    server.reset().await;
    mount_event_reports(&server, "", "", "", 0).await;
    client.pull_events(&calendar).await.unwrap();
    assert!(client.calendar(&calendar).unwrap().events().is_empty());
}

#[tokio::test]
async fn pull_events_empty_fetch_keeps_state() {
    let server = MockServer::start().await;
    let (mut client, calendar) = connect_with_work(&server).await;
    let t1 = event_href("t1");

    mount_event_reports(&server, &etag_response(&t1, "\"a\""), "", "", 1).await;
    let err = client.pull_events(&calendar).await.unwrap_err();
    assert!(matches!(err, CalDavError::Protocol(_)), "got {err:?}");
    assert!(client.calendar(&calendar).unwrap().events().is_empty());
}

#[tokio::test]
async fn pull_events_deleted_before_fetch() {
    let server = MockServer::start().await;
    let (mut client, calendar) = connect_with_work(&server).await;
    let t1 = event_href("t1");

    // Listed, then gone by the time its body is requested.
    mount_event_reports(
        &server,
        &etag_response(&t1, "\"a\""),
        &not_found_response(&t1),
        &not_found_response(&t1),
        1,
    )
    .await;
    client.pull_events(&calendar).await.unwrap();
    server.verify().await;

    let event = client.calendar(&calendar).unwrap().event(&t1).unwrap();
    assert!(event.is_deleted());
    assert!(event.ical().is_none());
}

#[tokio::test]
async fn pull_events_unknown_calendar() {
    let server = MockServer::start().await;
    let mut client = connect(&server).await;

    let err = client
        .pull_events(&Href::from("http://localhost/nowhere/"))
        .await
        .unwrap_err();
    assert!(matches!(err, CalDavError::NotFound(_)), "got {err:?}");
}

#[tokio::test]
async fn pull_events_after_cancel() {
    let server = MockServer::start().await;
    let (mut client, calendar) = connect_with_work(&server).await;

    client.cancellation_token().cancel();
    let err = client.pull_events(&calendar).await.unwrap_err();
    assert!(matches!(err, CalDavError::Cancelled), "got {err:?}");
    assert!(server.received_requests().await.unwrap().is_empty());
}

#[tokio::test]
async fn pull_changed_events_collects_failures() {
    let server = MockServer::start().await;
    let (mut client, calendar) = connect_with_work(&server).await;

    Mock::given(method("REPORT"))
        .and(path(WORK))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let failures = client.pull_changed_events().await;
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].0, calendar);
}
