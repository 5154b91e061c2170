//! Timetable and class session data structures.

use std::fmt;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Display format for class start/end timestamps.
pub const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// One scheduled class session.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Class {
    /// Session start (local wall-clock time of the upstream site)
    pub start: NaiveDateTime,

    /// Session end
    pub end: NaiveDateTime,

    /// Subject name
    pub subject: String,

    /// Session type (lecture, lab, ...)
    #[serde(rename = "type", default)]
    pub kind: String,

    /// Instructor display name
    #[serde(default)]
    pub instructor: String,

    /// Room label
    #[serde(default)]
    pub room: String,

    /// Annotation attached from a trailing notes row
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,

    /// Row was highlighted upstream
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub urgent: bool,
}

// `urgent` only mirrors upstream highlighting and is not part of a session's identity.
impl PartialEq for Class {
    fn eq(&self, other: &Self) -> bool {
        self.start == other.start
            && self.end == other.end
            && self.subject == other.subject
            && self.kind == other.kind
            && self.instructor == other.instructor
            && self.room == other.room
            && self.note == other.note
    }
}

impl Eq for Class {}

impl fmt::Display for Class {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} - {}: {} - {} ({}) in {}",
            self.start.format(TIME_FORMAT),
            self.end.format(TIME_FORMAT),
            self.kind,
            self.subject,
            self.instructor,
            self.room
        )
    }
}

/// One group's schedule for one period.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct Timetable {
    /// Numeric group identifier
    pub group_id: u32,

    /// Group display name as shown upstream
    #[serde(rename = "group", default)]
    pub group_name: String,

    /// Classes in document order
    #[serde(default)]
    pub classes: Vec<Class>,
}

impl Timetable {
    /// Create an empty timetable for a group.
    pub fn new(group_id: u32, group_name: impl Into<String>) -> Self {
        Self {
            group_id,
            group_name: group_name.into(),
            classes: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.classes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classes.is_empty()
    }
}

/// Cache and storage key of one timetable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TimetableKey {
    pub group: u32,
    pub period: u32,
}

impl TimetableKey {
    pub fn new(group: u32, period: u32) -> Self {
        Self { group, period }
    }

    /// Relative storage path of the persisted timetable.
    pub fn storage_key(&self) -> String {
        format!("timetables/{self}.json")
    }
}

impl fmt::Display for TimetableKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.group, self.period)
    }
}
