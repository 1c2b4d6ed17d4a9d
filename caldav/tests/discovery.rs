// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Discovery integration tests with wiremock.

mod common;

use common::{
    HOME, PRINCIPAL, config, home_set_response, mount_discovery, multistatus, principal_response,
    xml_response,
};
use errands_caldav::{CalDavError, CancellationToken, Client};
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[tokio::test]
async fn discover_direct_principal() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;

    let client = Client::discover(
        config(format!("{}/dav/", server.uri())),
        CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(client.base_url().as_str(), format!("{}/", server.uri()));
    assert_eq!(
        client.principal_url().as_str(),
        format!("{}{PRINCIPAL}", server.uri())
    );
    assert_eq!(
        client.home_set_url().as_str(),
        format!("{}{HOME}", server.uri())
    );
    assert!(client.calendars().is_empty());

    let requests = server.received_requests().await.unwrap();
    assert!(
        requests
            .iter()
            .all(|r| !r.url.path().starts_with("/.well-known")),
        "direct discovery must not touch .well-known"
    );
}

#[tokio::test]
async fn discover_sends_basic_auth_and_depth() {
    let server = MockServer::start().await;
    // "user:secret"
    Mock::given(method("PROPFIND"))
        .and(path("/dav/"))
        .and(header("Authorization", "Basic dXNlcjpzZWNyZXQ="))
        .and(header("Depth", "0"))
        .and(header("Content-Type", "application/xml; charset=utf-8"))
        .and(body_string_contains("current-user-principal"))
        .respond_with(xml_response(multistatus(&principal_response("/dav/"))))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("PROPFIND"))
        .and(path(PRINCIPAL))
        .and(header("Authorization", "Basic dXNlcjpzZWNyZXQ="))
        .respond_with(xml_response(multistatus(&home_set_response())))
        .expect(1)
        .mount(&server)
        .await;

    Client::discover(
        config(format!("{}/dav/", server.uri())),
        CancellationToken::new(),
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn discover_without_scheme_falls_back_to_http() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;

    // The mock server only speaks plain HTTP, so the HTTPS attempt fails first.
    let bare = server.uri().trim_start_matches("http://").to_string();
    let client = Client::discover(config(format!("{bare}/dav/")), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(client.base_url().scheme(), "http");
    assert_eq!(
        client.home_set_url().as_str(),
        format!("{}{HOME}", server.uri())
    );
}

#[tokio::test]
async fn discover_follows_well_known_redirect() {
    let front = MockServer::start().await;
    let dav = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/.well-known/caldav"))
        .respond_with(
            ResponseTemplate::new(301).insert_header("Location", format!("{}/dav/", dav.uri())),
        )
        .expect(1)
        .mount(&front)
        .await;
    Mock::given(method("GET"))
        .and(path("/dav/"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&dav)
        .await;
    mount_discovery(&dav).await;

    let client = Client::discover(config(front.uri()), CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(client.base_url().as_str(), format!("{}/", dav.uri()));
    assert_eq!(
        client.principal_url().as_str(),
        format!("{}{PRINCIPAL}", dav.uri())
    );
    assert_eq!(
        client.home_set_url().as_str(),
        format!("{}{HOME}", dav.uri())
    );
}

#[tokio::test]
async fn discover_fails_when_nothing_answers() {
    let server = MockServer::start().await;

    let err = Client::discover(config(server.uri()), CancellationToken::new())
        .await
        .unwrap_err();
    assert!(matches!(err, CalDavError::Discovery(_)), "got {err:?}");
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn discover_fails_without_home_set() {
    let server = MockServer::start().await;
    Mock::given(method("PROPFIND"))
        .and(path("/dav/"))
        .respond_with(xml_response(multistatus(&principal_response("/dav/"))))
        .mount(&server)
        .await;
    Mock::given(method("PROPFIND"))
        .and(path(PRINCIPAL))
        .respond_with(xml_response(multistatus(
            r"<d:response>
  <d:href>/principals/user/</d:href>
  <d:propstat>
    <d:prop><c:calendar-home-set/></d:prop>
    <d:status>HTTP/1.1 404 Not Found</d:status>
  </d:propstat>
</d:response>",
        )))
        .mount(&server)
        .await;

    let err = Client::discover(
        config(format!("{}/dav/", server.uri())),
        CancellationToken::new(),
    )
    .await
    .unwrap_err();
    assert!(matches!(err, CalDavError::Discovery(_)), "got {err:?}");
}

#[tokio::test]
async fn discover_respects_cancellation() {
    let server = MockServer::start().await;
    mount_discovery(&server).await;

    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = Client::discover(config(format!("{}/dav/", server.uri())), cancel)
        .await
        .unwrap_err();
    assert!(matches!(err, CalDavError::Cancelled), "got {err:?}");
    assert!(server.received_requests().await.unwrap().is_empty());
}
