// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! End-to-end runs of the command line against a mock server.

use std::path::{Path, PathBuf};

use errands_sync_cli::Cli;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const PRINCIPAL: &str = "/principals/user/";
const HOME: &str = "/calendars/user/";
const WORK: &str = "/calendars/user/work/";

fn multistatus(responses: &str) -> ResponseTemplate {
    let body = format!(
        r#"<?xml version="1.0" encoding="utf-8"?>
<d:multistatus xmlns:d="DAV:" xmlns:c="urn:ietf:params:xml:ns:caldav" xmlns:cs="http://calendarserver.org/ns/">
{responses}
</d:multistatus>"#
    );
    ResponseTemplate::new(207).set_body_raw(body, "application/xml; charset=utf-8")
}

fn ok_propstat(href: &str, props: &str) -> String {
    format!(
        "<d:response><d:href>{href}</d:href><d:propstat><d:prop>{props}</d:prop>\
         <d:status>HTTP/1.1 200 OK</d:status></d:propstat></d:response>"
    )
}

async fn mount_server() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("PROPFIND"))
        .and(path("/dav/"))
        .and(header("Depth", "0"))
        .respond_with(multistatus(&ok_propstat(
            "/dav/",
            &format!("<d:current-user-principal><d:href>{PRINCIPAL}</d:href></d:current-user-principal>"),
        )))
        .mount(&server)
        .await;

    Mock::given(method("PROPFIND"))
        .and(path(PRINCIPAL))
        .and(body_string_contains("calendar-home-set"))
        .respond_with(multistatus(&ok_propstat(
            PRINCIPAL,
            &format!("<c:calendar-home-set><d:href>{HOME}</d:href></c:calendar-home-set>"),
        )))
        .mount(&server)
        .await;

    let home = ok_propstat(HOME, "<d:resourcetype><d:collection/></d:resourcetype>");
    let work = ok_propstat(
        WORK,
        r#"<d:resourcetype><d:collection/><c:calendar/></d:resourcetype>
<d:displayname>Work</d:displayname>
<cs:getctag>"1"</cs:getctag>
<c:supported-calendar-component-set><c:comp name="VTODO"/></c:supported-calendar-component-set>"#,
    );
    Mock::given(method("PROPFIND"))
        .and(path(HOME))
        .and(header("Depth", "1"))
        .respond_with(multistatus(&format!("{home}\n{work}")))
        .mount(&server)
        .await;

    server
}

fn write_config(dir: &Path, server: &MockServer) -> PathBuf {
    let config = dir.join("config.toml");
    let data_dir = dir.join("lists");
    let toml = format!(
        r#"
data_dir = "{}"

[server]
base_url = "{}/dav/"
timeout_secs = 5

[server.auth]
type = "basic"
username = "user"
password = "secret"
"#,
        data_dir.to_str().unwrap().replace('\\', "/"),
        server.uri()
    );
    std::fs::write(&config, toml).unwrap();
    config
}

async fn run(args: &[&str]) -> Result<(), Box<dyn std::error::Error>> {
    Cli::try_parse_from(args)?.run().await
}

#[tokio::test]
async fn sync_pulls_calendar_into_list_file() {
    let server = mount_server().await;
    Mock::given(method("REPORT"))
        .and(path(WORK))
        .and(body_string_contains("calendar-query"))
        .respond_with(multistatus(""))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &server);

    run(&["errands-sync", "-c", config.to_str().unwrap(), "sync"])
        .await
        .unwrap();

    let list = std::fs::read_to_string(dir.path().join("lists").join("work.ics")).unwrap();
    assert!(list.contains("X-WR-CALNAME:Work"));
    assert!(dir.path().join("lists").join(".sync-state.json").exists());
}

#[tokio::test]
async fn create_calendar_sends_mkcol() {
    let server = mount_server().await;
    Mock::given(method("MKCOL"))
        .and(path("/calendars/user/groceries/"))
        .and(body_string_contains("<d:displayname>Groceries</d:displayname>"))
        .respond_with(ResponseTemplate::new(201))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &server);

    let args = [
        "errands-sync",
        "-c",
        config.to_str().unwrap(),
        "create-calendar",
        "Groceries",
        "--uid",
        "groceries",
    ];
    run(&args).await.unwrap();
}

#[tokio::test]
async fn delete_calendar_sends_delete() {
    let server = mount_server().await;
    Mock::given(method("DELETE"))
        .and(path(WORK))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &server);

    let args = ["errands-sync", "-c", config.to_str().unwrap(), "delete-calendar", "work"];
    run(&args).await.unwrap();
}

#[tokio::test]
async fn unknown_calendar_is_an_error() {
    let server = mount_server().await;
    let dir = TempDir::new().unwrap();
    let config = write_config(dir.path(), &server);

    let args = ["errands-sync", "-c", config.to_str().unwrap(), "events", "nope"];
    let err = run(&args).await.unwrap_err();
    assert!(err.to_string().contains("Calendar not found: nope"));
}

#[tokio::test]
async fn missing_config_file_is_an_error() {
    let dir = TempDir::new().unwrap();
    let missing = dir.path().join("missing.toml");

    let err = run(&["errands-sync", "-c", missing.to_str().unwrap(), "discover"])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("failed to read config file"));
}
