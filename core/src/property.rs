// SPDX-FileCopyrightText: 2025-2026 Zexin Yuan <aim@yzx9.xyz>
//
// SPDX-License-Identifier: Apache-2.0

//! Typed access to task and list properties.
//!
//! Every field maps to one on-disk property name and one value kind. The
//! names are shared with other clients of the same files and must not change.

use icalendar::{Calendar, Component, Property, Todo};
use jiff::Timestamp;
use jiff::civil::{Date, DateTime};
use jiff::tz::TimeZone;

const TIMESTAMP_FORMAT: &str = "%Y%m%dT%H%M%SZ";

/// Value kind of a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropKind {
    /// TEXT.
    Text,
    /// Integer.
    Int,
    /// `TRUE` or `FALSE`.
    Bool,
    /// Comma-separated TEXT list.
    TextList,
    /// UTC date-time `YYYYMMDDTHHMMSSZ`.
    Timestamp,
    /// Recurrence rule, stored verbatim.
    Recur,
}

/// A decoded property value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropValue {
    /// Text.
    Text(String),
    /// Integer.
    Int(i64),
    /// Boolean.
    Bool(bool),
    /// Text list.
    TextList(Vec<String>),
    /// Point in time.
    Timestamp(Timestamp),
    /// Recurrence rule.
    Recur(String),
}

impl PropValue {
    /// Decodes a raw iCalendar value.
    ///
    /// Returns `None` if the value does not fit `kind`.
    #[must_use]
    pub fn decode(kind: PropKind, raw: &str) -> Option<Self> {
        let raw = raw.trim();
        Some(match kind {
            PropKind::Text => Self::Text(raw.to_string()),
            PropKind::Int => Self::Int(raw.parse().ok()?),
            PropKind::Bool => Self::Bool(match raw.to_ascii_uppercase().as_str() {
                "TRUE" | "1" => true,
                "FALSE" | "0" => false,
                _ => return None,
            }),
            PropKind::TextList => Self::TextList(
                raw.split(',')
                    .map(str::trim)
                    .filter(|item| !item.is_empty())
                    .map(str::to_string)
                    .collect(),
            ),
            PropKind::Timestamp => Self::Timestamp(parse_timestamp(raw)?),
            PropKind::Recur => Self::Recur(raw.to_string()),
        })
    }

    /// Encodes the value. TEXT escaping is left to the writer.
    #[must_use]
    pub fn encode(&self) -> String {
        match self {
            Self::Text(text) => text.clone(),
            Self::Int(n) => n.to_string(),
            Self::Bool(true) => "TRUE".to_string(),
            Self::Bool(false) => "FALSE".to_string(),
            Self::TextList(items) => items.join(","),
            Self::Timestamp(ts) => format_timestamp(*ts),
            Self::Recur(rule) => rule.clone(),
        }
    }

    /// Kind of this value.
    #[must_use]
    pub const fn kind(&self) -> PropKind {
        match self {
            Self::Text(_) => PropKind::Text,
            Self::Int(_) => PropKind::Int,
            Self::Bool(_) => PropKind::Bool,
            Self::TextList(_) => PropKind::TextList,
            Self::Timestamp(_) => PropKind::Timestamp,
            Self::Recur(_) => PropKind::Recur,
        }
    }

    /// Text payload, for `Text` and `Recur` values.
    #[must_use]
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(s) | Self::Recur(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean payload.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(b) => Some(*b),
            _ => None,
        }
    }

    /// Timestamp payload.
    #[must_use]
    pub const fn as_timestamp(&self) -> Option<Timestamp> {
        match self {
            Self::Timestamp(ts) => Some(*ts),
            _ => None,
        }
    }
}

/// Formats a timestamp as `YYYYMMDDTHHMMSSZ`.
#[must_use]
pub fn format_timestamp(ts: Timestamp) -> String {
    ts.strftime(TIMESTAMP_FORMAT).to_string()
}

/// Parses `YYYYMMDDTHHMMSS[Z]` or `YYYYMMDD`.
///
/// Floating times and dates are read as UTC.
#[must_use]
pub fn parse_timestamp(raw: &str) -> Option<Timestamp> {
    let raw = raw.trim();
    let raw = raw.strip_suffix(['Z', 'z']).unwrap_or(raw);
    let zoned = if raw.len() == 8 {
        Date::strptime("%Y%m%d", raw).ok()?.to_zoned(TimeZone::UTC)
    } else {
        DateTime::strptime("%Y%m%dT%H%M%S", raw)
            .ok()?
            .to_zoned(TimeZone::UTC)
    };
    zoned.ok().map(|z| z.timestamp())
}

/// A property with a fixed on-disk name and kind.
pub trait PropertyKey: Copy {
    /// Property name as written to disk.
    fn name(self) -> &'static str;

    /// Value kind.
    fn kind(self) -> PropKind;
}

macro_rules! property_keys {
    (
        $(#[$meta:meta])*
        $vis:vis enum $enum:ident {
            $($(#[$vmeta:meta])* $variant:ident => ($name:literal, $kind:ident),)*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        $vis enum $enum {
            $($(#[$vmeta])* $variant,)*
        }

        impl $enum {
            /// Every property, in file order.
            pub const ALL: &[Self] = &[$(Self::$variant,)*];
        }

        impl PropertyKey for $enum {
            fn name(self) -> &'static str {
                match self {
                    $(Self::$variant => $name,)*
                }
            }

            fn kind(self) -> PropKind {
                match self {
                    $(Self::$variant => PropKind::$kind,)*
                }
            }
        }
    };
}

property_keys! {
    /// Properties of a task (a `VTODO`).
    pub enum TaskProp {
        /// Unique id.
        Uid => ("UID", Text),
        /// Title.
        Summary => ("SUMMARY", Text),
        /// Notes.
        Description => ("DESCRIPTION", Text),
        /// Tags.
        Categories => ("CATEGORIES", TextList),
        /// Priority, 0 to 9.
        Priority => ("PRIORITY", Int),
        /// Progress in percent.
        PercentComplete => ("PERCENT-COMPLETE", Int),
        /// Uid of the parent task.
        RelatedTo => ("RELATED-TO", Text),
        /// Recurrence rule.
        Rrule => ("RRULE", Recur),
        /// Start.
        DtStart => ("DTSTART", Timestamp),
        /// Due date.
        Due => ("DUE", Timestamp),
        /// Completion time.
        Completed => ("COMPLETED", Timestamp),
        /// Creation time.
        Created => ("CREATED", Timestamp),
        /// Last local or remote edit.
        LastModified => ("LAST-MODIFIED", Timestamp),
        /// Accent color.
        Color => ("X-ERRANDS-COLOR", Text),
        /// Deleted, pending removal on the server.
        Deleted => ("X-ERRANDS-DELETED", Bool),
        /// Sub-tasks are expanded.
        Expanded => ("X-ERRANDS-EXPANDED", Bool),
        /// A reminder was shown.
        Notified => ("X-ERRANDS-NOTIFIED", Bool),
        /// Toolbar is shown.
        ToolbarShown => ("X-ERRANDS-TOOLBAR-SHOWN", Bool),
        /// Moved to trash.
        Trash => ("X-ERRANDS-TRASH", Bool),
        /// No local edits since the last upload.
        Synced => ("X-ERRANDS-SYNCED", Bool),
        /// Attached file paths.
        Attachments => ("X-ERRANDS-ATTACHMENTS", TextList),
    }
}

property_keys! {
    /// Properties of a list (the `VCALENDAR` of a list file).
    pub enum ListProp {
        /// Unique id, equal to the remote calendar uid.
        Uid => ("X-WR-RELCALID", Text),
        /// Name.
        Name => ("X-WR-CALNAME", Text),
        /// Description.
        Description => ("X-WR-CALDESC", Text),
        /// Accent color.
        Color => ("X-ERRANDS-COLOR", Text),
        /// Deleted locally or on the server.
        Deleted => ("X-ERRANDS-DELETED", Bool),
        /// No local edits since the last upload.
        Synced => ("X-ERRANDS-SYNCED", Bool),
    }
}

/// Raw property storage of an iCalendar component, with typed access on top.
pub trait Properties {
    /// Raw value of the property `name`.
    fn raw_value(&self, name: &str) -> Option<&str>;

    /// Sets `name`, replacing any previous value.
    fn set_raw_value(&mut self, name: &str, value: &str);

    /// Removes every `name` property.
    fn remove_raw_value(&mut self, name: &str);

    /// Decoded value of `key`, if present and well-formed.
    fn prop<K: PropertyKey>(&self, key: K) -> Option<PropValue> {
        let raw = self.raw_value(key.name())?;
        let value = PropValue::decode(key.kind(), raw);
        if value.is_none() {
            tracing::warn!(property = key.name(), raw, "ignoring malformed property value");
        }
        value
    }

    /// Writes `value` under `key`; `None` removes the property.
    fn set_prop<K: PropertyKey>(&mut self, key: K, value: Option<&PropValue>) {
        match value {
            Some(value) => {
                debug_assert_eq!(value.kind(), key.kind(), "{}", key.name());
                self.set_raw_value(key.name(), &value.encode());
            }
            None => self.remove_raw_value(key.name()),
        }
    }

    /// Text value of `key`.
    fn prop_text<K: PropertyKey>(&self, key: K) -> Option<String> {
        match self.prop(key)? {
            PropValue::Text(s) | PropValue::Recur(s) => Some(s),
            _ => None,
        }
    }

    /// Boolean value of `key`, `false` when absent.
    fn prop_flag<K: PropertyKey>(&self, key: K) -> bool {
        self.prop(key).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    /// Timestamp value of `key`.
    fn prop_time<K: PropertyKey>(&self, key: K) -> Option<Timestamp> {
        self.prop(key).and_then(|v| v.as_timestamp())
    }
}

impl Properties for Todo {
    fn raw_value(&self, name: &str) -> Option<&str> {
        self.property_value(name)
    }

    fn set_raw_value(&mut self, name: &str, value: &str) {
        self.add_property(name, value);
    }

    fn remove_raw_value(&mut self, name: &str) {
        self.remove_property(name);
    }
}

// Calendar-level properties keep their file order; later duplicates win.
impl Properties for Calendar {
    fn raw_value(&self, name: &str) -> Option<&str> {
        self.properties
            .iter()
            .rev()
            .find(|p| p.key().eq_ignore_ascii_case(name))
            .map(Property::value)
    }

    fn set_raw_value(&mut self, name: &str, value: &str) {
        self.remove_raw_value(name);
        self.properties.push(Property::new(name, value));
    }

    fn remove_raw_value(&mut self, name: &str) {
        self.properties.retain(|p| !p.key().eq_ignore_ascii_case(name));
    }
}
