// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Response parsers for WebDAV/CalDAV operations.

use crate::error::CalDavError;
use crate::types::{CTag, ComponentSet, ETag, Href};
use crate::xml::{self, Node};

/// `WebDAV` multistatus response.
#[derive(Debug, Clone, Default)]
pub struct MultiStatusResponse {
    /// The response items.
    pub responses: Vec<ResponseItem>,
}

/// Individual response in multistatus.
#[derive(Debug, Clone)]
pub struct ResponseItem {
    /// Href the response is about.
    pub href: Href,
    /// Response-level status, used by servers for missing resources.
    pub status: Option<String>,
    /// Property groups, each with its own status.
    pub prop_stats: Vec<PropStat>,
}

/// Property stat with status and value.
#[derive(Debug, Clone)]
pub struct PropStat {
    /// Status line, e.g. `HTTP/1.1 200 OK`.
    pub status: String,
    /// Properties in this group.
    pub props: Properties,
}

/// WebDAV/CalDAV properties.
#[derive(Debug, Clone, Default)]
pub struct Properties {
    /// `displayname`.
    pub display_name: Option<String>,
    /// `calendar-description`.
    pub calendar_description: Option<String>,
    /// `calendar-color`.
    pub calendar_color: Option<String>,
    /// `getctag`.
    pub ctag: Option<CTag>,
    /// `getetag`.
    pub etag: Option<ETag>,
    /// `calendar-data`.
    pub calendar_data: Option<String>,
    /// `current-user-principal` href.
    pub current_user_principal: Option<Href>,
    /// `calendar-home-set` href.
    pub calendar_home_set: Option<Href>,
    /// `supported-calendar-component-set`.
    pub components: Option<ComponentSet>,
    /// `resourcetype` contains `collection`.
    pub is_collection: bool,
    /// `resourcetype` contains `calendar`.
    pub is_calendar: bool,
}

impl MultiStatusResponse {
    /// Parses a multistatus response from XML.
    ///
    /// # Errors
    ///
    /// Returns [`CalDavError::Parse`] for malformed XML and
    /// [`CalDavError::Protocol`] if there is no `multistatus` element.
    pub fn from_xml(body: &str) -> Result<Self, CalDavError> {
        let doc = xml::parse(body).inspect_err(|e| {
            tracing::warn!(error = %e, body, "malformed XML in response");
        })?;
        let Some(multistatus) = doc.root().find_tag("multistatus", true) else {
            tracing::warn!(body, "response has no multistatus element");
            return Err(CalDavError::Protocol(
                "response has no multistatus element".to_string(),
            ));
        };

        let responses = multistatus
            .children_named("response")
            .filter_map(ResponseItem::from_node)
            .collect();
        Ok(Self { responses })
    }
}

impl ResponseItem {
    fn from_node(node: Node<'_>) -> Option<Self> {
        let Some(href) = node.child_text("href") else {
            tracing::warn!("ignoring response without href");
            return None;
        };
        let prop_stats = node
            .children_named("propstat")
            .map(|propstat| PropStat {
                status: propstat.child_text("status").unwrap_or_default().to_string(),
                props: propstat
                    .children_named("prop")
                    .next()
                    .map(Properties::from_node)
                    .unwrap_or_default(),
            })
            .collect();

        Some(Self {
            href: Href::new(href.to_string()),
            status: node.child_text("status").map(str::to_string),
            prop_stats,
        })
    }

    /// Properties of the first propstat with status 200.
    #[must_use]
    pub fn ok_props(&self) -> Option<&Properties> {
        self.prop_stats
            .iter()
            .find(|p| p.is_ok())
            .map(|p| &p.props)
    }

    /// Whether the server reports the resource itself as missing.
    ///
    /// That is a response-level 404, or a response whose only propstats are
    /// 404s.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        match &self.status {
            Some(status) => status_code(status) == Some(404),
            None => {
                !self.prop_stats.is_empty()
                    && self
                        .prop_stats
                        .iter()
                        .all(|p| status_code(&p.status) == Some(404))
            }
        }
    }
}

impl PropStat {
    /// Whether the status is `200`.
    #[must_use]
    pub fn is_ok(&self) -> bool {
        status_code(&self.status) == Some(200)
    }
}

impl Properties {
    fn from_node(prop: Node<'_>) -> Self {
        let mut props = Self::default();
        let text = |node: Node<'_>| node.text().map(str::to_string);
        let href = |node: Node<'_>| node.child_text("href").map(|h| Href::new(h.to_string()));

        for node in prop.children() {
            match node.local_name().unwrap_or_default() {
                "displayname" => props.display_name = text(node),
                "calendar-description" => props.calendar_description = text(node),
                "calendar-color" => props.calendar_color = text(node),
                "getctag" => props.ctag = node.text().map(CTag::from),
                "getetag" => props.etag = node.text().map(ETag::from),
                "calendar-data" => props.calendar_data = text(node),
                "current-user-principal" => props.current_user_principal = href(node),
                "calendar-home-set" => props.calendar_home_set = href(node),
                "resourcetype" => {
                    for kind in node.children() {
                        match kind.local_name() {
                            Some("collection") => props.is_collection = true,
                            Some("calendar") => props.is_calendar = true,
                            _ => {}
                        }
                    }
                }
                "supported-calendar-component-set" => {
                    props.components = Some(
                        node.children_named("comp")
                            .filter_map(|comp| comp.attr("name"))
                            .collect(),
                    );
                }
                _ => {}
            }
        }
        props
    }
}

/// Extracts the numeric code from a status line such as `HTTP/1.1 404 Not Found`.
#[must_use]
pub fn status_code(status: &str) -> Option<u16> {
    status.split_whitespace().nth(1)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_status_code() {
        assert_eq!(status_code("HTTP/1.1 200 OK"), Some(200));
        assert_eq!(status_code("HTTP/1.1 404 Not Found"), Some(404));
        assert_eq!(status_code("garbage"), None);
        assert_eq!(status_code(""), None);
    }

    #[test]
    fn response_not_found_detection() {
        let body = r#"<?xml version="1.0"?>
<d:multistatus xmlns:d="DAV:">
  <d:response>
    <d:href>/cal/gone.ics</d:href>
    <d:status>HTTP/1.1 404 Not Found</d:status>
  </d:response>
  <d:response>
    <d:href>/cal/also-gone.ics</d:href>
    <d:propstat>
      <d:prop><d:getetag/></d:prop>
      <d:status>HTTP/1.1 404 Not Found</d:status>
    </d:propstat>
  </d:response>
  <d:response>
    <d:href>/cal/here.ics</d:href>
    <d:propstat>
      <d:prop><d:getetag>"a"</d:getetag></d:prop>
      <d:status>HTTP/1.1 200 OK</d:status>
    </d:propstat>
  </d:response>
</d:multistatus>"#;
        let ms = MultiStatusResponse::from_xml(body).unwrap();
        let gone: Vec<_> = ms
            .responses
            .iter()
            .filter(|r| r.is_not_found())
            .map(|r| r.href.as_str())
            .collect();
        assert_eq!(gone, vec!["/cal/gone.ics", "/cal/also-gone.ics"]);
        assert_eq!(
            ms.responses[2].ok_props().unwrap().etag.as_deref(),
            Some("\"a\"")
        );
    }

    #[test]
    fn response_without_multistatus_is_protocol_error() {
        assert!(matches!(
            MultiStatusResponse::from_xml("<html><body>oops</body></html>"),
            Err(CalDavError::Protocol(_))
        ));
        assert!(matches!(
            MultiStatusResponse::from_xml("<d:multistatus>"),
            Err(CalDavError::Parse(_))
        ));
    }
}
