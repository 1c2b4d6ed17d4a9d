// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

use std::fmt;
use std::ops::{BitOr, BitOrAssign, Deref};

use serde::{Deserialize, Serialize};

macro_rules! string_newtype {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            #[doc = concat!("Creates a new `", stringify!($name), "` from a string.")]
            #[must_use]
            pub const fn new(value: String) -> Self {
                Self(value)
            }

            /// Returns the inner string value.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl Deref for $name {
            type Target = str;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }

        impl AsRef<str> for $name {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }
    };
}

string_newtype!(
    /// Resource href.
    ///
    /// Calendar hrefs are absolute collection URLs such as
    /// `https://dav.example.com/calendars/user/work/`; event hrefs are kept as
    /// the server reported them, usually an absolute path like
    /// `/calendars/user/work/t1.ics`.
    Href
);

string_newtype!(
    /// Entity tag for change detection.
    ///
    /// Opaque; it changes whenever the content of the resource changes.
    ETag
);

string_newtype!(
    /// Collection tag.
    ///
    /// Opaque; it changes whenever any member of the collection changes.
    CTag
);

/// Set of iCalendar component types a calendar accepts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ComponentSet(u8);

impl ComponentSet {
    /// No components.
    pub const EMPTY: Self = Self(0);
    /// `VEVENT`.
    pub const VEVENT: Self = Self(1);
    /// `VTODO`.
    pub const VTODO: Self = Self(1 << 1);
    /// `VJOURNAL`.
    pub const VJOURNAL: Self = Self(1 << 2);
    /// `VFREEBUSY`.
    pub const VFREEBUSY: Self = Self(1 << 3);

    const NAMED: [(Self, &'static str); 4] = [
        (Self::VEVENT, "VEVENT"),
        (Self::VTODO, "VTODO"),
        (Self::VJOURNAL, "VJOURNAL"),
        (Self::VFREEBUSY, "VFREEBUSY"),
    ];

    /// Parses a single component name, case-insensitively.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::NAMED
            .iter()
            .find(|(_, n)| n.eq_ignore_ascii_case(name.trim()))
            .map(|(set, _)| *set)
    }

    /// Whether every component in `other` is also in `self`.
    #[must_use]
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// Whether the set is empty.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Component names in canonical order.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMED
            .into_iter()
            .filter(move |(set, _)| self.contains(*set))
            .map(|(_, name)| name)
    }
}

impl BitOr for ComponentSet {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self::Output {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for ComponentSet {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl<'a> FromIterator<&'a str> for ComponentSet {
    /// Unknown names are ignored.
    fn from_iter<T: IntoIterator<Item = &'a str>>(iter: T) -> Self {
        iter.into_iter()
            .filter_map(Self::from_name)
            .fold(Self::EMPTY, BitOr::bitor)
    }
}

impl fmt::Display for ComponentSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, name) in self.names().enumerate() {
            if i > 0 {
                f.write_str(",")?;
            }
            f.write_str(name)?;
        }
        Ok(())
    }
}

/// One remote calendar collection.
///
/// Calendars are owned by a [`Client`](crate::Client) and only mutated by it;
/// everything here is read-only for callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Calendar {
    pub(crate) href: Href,
    pub(crate) uid: String,
    pub(crate) display_name: Option<String>,
    pub(crate) description: Option<String>,
    pub(crate) color: Option<String>,
    pub(crate) ctag: Option<CTag>,
    pub(crate) components: ComponentSet,
    #[serde(skip)]
    pub(crate) properties_changed: bool,
    #[serde(skip)]
    pub(crate) events_changed: bool,
    #[serde(default)]
    pub(crate) deleted: bool,
    #[serde(default)]
    pub(crate) events: Vec<Event>,
}

impl Calendar {
    pub(crate) fn new(href: Href) -> Self {
        let uid = uid_from_href(&href).to_string();
        Self {
            href,
            uid,
            display_name: None,
            description: None,
            color: None,
            ctag: None,
            components: ComponentSet::EMPTY,
            properties_changed: false,
            events_changed: false,
            deleted: false,
            events: Vec::new(),
        }
    }

    /// Absolute URL of the collection.
    #[must_use]
    pub const fn href(&self) -> &Href {
        &self.href
    }

    /// Last path segment of the href.
    #[must_use]
    pub fn uid(&self) -> &str {
        &self.uid
    }

    /// Display name.
    #[must_use]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }

    /// Calendar description.
    #[must_use]
    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Color as a hex string, e.g. `#3584e4`.
    #[must_use]
    pub fn color(&self) -> Option<&str> {
        self.color.as_deref()
    }

    /// Collection tag seen in the last pull.
    #[must_use]
    pub const fn ctag(&self) -> Option<&CTag> {
        self.ctag.as_ref()
    }

    /// Supported component types.
    #[must_use]
    pub const fn components(&self) -> ComponentSet {
        self.components
    }

    /// Name, description or color changed in the last pull.
    #[must_use]
    pub const fn properties_changed(&self) -> bool {
        self.properties_changed
    }

    /// The `CTag` changed in the last pull, or the calendar is new.
    #[must_use]
    pub const fn events_changed(&self) -> bool {
        self.events_changed
    }

    /// The calendar is gone on the server and will be dropped on the next pull.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted
    }

    /// Known events, including tombstones.
    #[must_use]
    pub fn events(&self) -> &[Event] {
        &self.events
    }

    /// Looks up an event by href.
    #[must_use]
    pub fn event(&self, href: &str) -> Option<&Event> {
        self.events.iter().find(|e| e.href.as_str() == href)
    }

    pub(crate) fn event_mut(&mut self, href: &str) -> Option<&mut Event> {
        self.events.iter_mut().find(|e| e.href.as_str() == href)
    }
}

/// One calendar object resource (a VTODO or VEVENT).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub(crate) href: Href,
    pub(crate) etag: ETag,
    pub(crate) ical: Option<String>,
    #[serde(default)]
    pub(crate) deleted: bool,
}

impl Event {
    pub(crate) const fn new(href: Href, etag: ETag) -> Self {
        Self {
            href,
            etag,
            ical: None,
            deleted: false,
        }
    }

    /// Href as reported by the server.
    #[must_use]
    pub const fn href(&self) -> &Href {
        &self.href
    }

    /// Entity tag of the last fetched version.
    #[must_use]
    pub const fn etag(&self) -> &ETag {
        &self.etag
    }

    /// Raw iCalendar text, `None` until fetched.
    #[must_use]
    pub fn ical(&self) -> Option<&str> {
        self.ical.as_deref()
    }

    /// The resource is gone on the server and will be dropped on the next pull.
    #[must_use]
    pub const fn is_deleted(&self) -> bool {
        self.deleted
    }
}

/// Last non-empty path segment of an href.
#[must_use]
pub fn uid_from_href(href: &str) -> &str {
    href.trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or_default()
}
