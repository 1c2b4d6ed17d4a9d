// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Request builders for `CalDAV` operations.

use crate::types::{ComponentSet, Href};
use crate::xml::{Element, ns};

/// Properties that can be requested or set.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Prop {
    /// Current user principal.
    CurrentUserPrincipal,
    /// Calendar home set.
    CalendarHomeSet,
    /// Resource type.
    ResourceType,
    /// Display name.
    DisplayName,
    /// Collection tag.
    GetCTag,
    /// `ETag`.
    GetETag,
    /// Calendar description.
    CalendarDescription,
    /// Calendar color.
    CalendarColor,
    /// Supported calendar components.
    SupportedCalendarComponents,
    /// Calendar data.
    CalendarData,
}

impl Prop {
    const fn qualified_name(self) -> &'static str {
        match self {
            Self::CurrentUserPrincipal => "d:current-user-principal",
            Self::CalendarHomeSet => "c:calendar-home-set",
            Self::ResourceType => "d:resourcetype",
            Self::DisplayName => "d:displayname",
            Self::GetCTag => "cs:getctag",
            Self::GetETag => "d:getetag",
            Self::CalendarDescription => "c:calendar-description",
            Self::CalendarColor => "ic:calendar-color",
            Self::SupportedCalendarComponents => "c:supported-calendar-component-set",
            Self::CalendarData => "c:calendar-data",
        }
    }

    fn element(self) -> Element {
        Element::new(self.qualified_name())
    }
}

/// Properties read when listing or re-reading calendars.
pub const CALENDAR_PROPS: [Prop; 6] = [
    Prop::ResourceType,
    Prop::DisplayName,
    Prop::GetCTag,
    Prop::CalendarDescription,
    Prop::SupportedCalendarComponents,
    Prop::CalendarColor,
];

fn root(name: &str) -> Element {
    Element::new(name)
        .attr("xmlns:d", ns::DAV)
        .attr("xmlns:c", ns::CALDAV)
        .attr("xmlns:cs", ns::CALENDARSERVER)
        .attr("xmlns:ic", ns::APPLE_ICAL)
}

fn prop_block<'a>(props: impl IntoIterator<Item = &'a Prop>) -> Element {
    props
        .into_iter()
        .fold(Element::new("d:prop"), |prop, p| prop.child(p.element()))
}

fn components_element(components: ComponentSet) -> Element {
    components.names().fold(
        Prop::SupportedCalendarComponents.element(),
        |set, name| set.child(Element::new("c:comp").attr("name", name)),
    )
}

/// PROPFIND request builder.
#[derive(Debug, Default)]
pub struct PropFindRequest {
    props: Vec<Prop>,
}

impl PropFindRequest {
    /// Creates a new PROPFIND request.
    #[must_use]
    pub fn new() -> Self {
        Self { props: Vec::new() }
    }

    /// Adds a property to the request.
    pub fn add_property(&mut self, prop: Prop) -> &mut Self {
        self.props.push(prop);
        self
    }

    /// Builds the XML body for the PROPFIND request.
    #[must_use]
    pub fn build(&self) -> String {
        root("d:propfind")
            .child(prop_block(&self.props))
            .to_document()
    }
}

impl FromIterator<Prop> for PropFindRequest {
    fn from_iter<T: IntoIterator<Item = Prop>>(iter: T) -> Self {
        Self {
            props: iter.into_iter().collect(),
        }
    }
}

/// `calendar-query` REPORT that lists every resource's `ETag`.
#[derive(Debug, Clone, Copy, Default)]
pub struct CalendarQueryRequest;

impl CalendarQueryRequest {
    /// Creates a new calendar query.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }

    /// Builds the XML body.
    #[must_use]
    pub fn build(self) -> String {
        root("c:calendar-query")
            .child(prop_block(&[Prop::GetETag]))
            .child(
                Element::new("c:filter")
                    .child(Element::new("c:comp-filter").attr("name", "VCALENDAR")),
            )
            .to_document()
    }
}

/// `calendar-multiget` REPORT builder.
#[derive(Debug, Default)]
pub struct CalendarMultiGetRequest {
    hrefs: Vec<String>,
    with_data: bool,
}

impl CalendarMultiGetRequest {
    /// Creates a multiget that only asks for `ETag`s.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Also requests `calendar-data`.
    #[must_use]
    pub const fn with_data(mut self) -> Self {
        self.with_data = true;
        self
    }

    /// Adds a resource href.
    pub fn add_href(&mut self, href: &Href) -> &mut Self {
        self.hrefs.push(href.to_string());
        self
    }

    /// Builds the XML body.
    #[must_use]
    pub fn build(&self) -> String {
        let props: &[Prop] = if self.with_data {
            &[Prop::GetETag, Prop::CalendarData]
        } else {
            &[Prop::GetETag]
        };
        self.hrefs
            .iter()
            .fold(
                root("c:calendar-multiget").child(prop_block(props)),
                |body, href| body.child(Element::new("d:href").text(href.as_str())),
            )
            .to_document()
    }
}

/// Extended MKCOL request creating a calendar collection.
#[derive(Debug)]
pub struct MkColRequest<'a> {
    /// Display name.
    pub display_name: &'a str,
    /// Optional description.
    pub description: Option<&'a str>,
    /// Optional hex color.
    pub color: Option<&'a str>,
    /// Components the calendar accepts.
    pub components: ComponentSet,
}

impl MkColRequest<'_> {
    /// Builds the XML body.
    #[must_use]
    pub fn build(&self) -> String {
        let mut prop = Element::new("d:prop")
            .child(
                Prop::ResourceType
                    .element()
                    .child(Element::new("d:collection"))
                    .child(Element::new("c:calendar")),
            )
            .child(components_element(self.components))
            .child(Prop::DisplayName.element().text(self.display_name));
        if let Some(description) = self.description {
            prop.push(Prop::CalendarDescription.element().text(description));
        }
        if let Some(color) = self.color {
            prop.push(Prop::CalendarColor.element().text(color));
        }

        root("d:mkcol")
            .child(Element::new("d:set").child(prop))
            .to_document()
    }
}

/// Calendar properties to change. `None` fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CalendarPatch {
    /// New display name.
    pub display_name: Option<String>,
    /// New description.
    pub description: Option<String>,
    /// New hex color.
    pub color: Option<String>,
}

impl CalendarPatch {
    /// Whether no field is set.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.display_name.is_none() && self.description.is_none() && self.color.is_none()
    }

    /// Builds the PROPPATCH body with only the supplied fields.
    #[must_use]
    pub fn build(&self) -> String {
        let fields = [
            (Prop::DisplayName, &self.display_name),
            (Prop::CalendarDescription, &self.description),
            (Prop::CalendarColor, &self.color),
        ];
        let prop = fields
            .into_iter()
            .filter_map(|(p, value)| Some(p.element().text(value.as_deref()?)))
            .fold(Element::new("d:prop"), Element::child);

        root("d:propertyupdate")
            .child(Element::new("d:set").child(prop))
            .to_document()
    }
}
