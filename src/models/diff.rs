//! Change-set types produced by comparing two timetable snapshots.

use std::fmt;

use serde::{Deserialize, Serialize};

use super::{Class, TimetableKey};

/// A single difference between two snapshots.
///
/// `old == None` is an added class, `new == None` a removed one, both present
/// a modification. Both sides are never absent and never equal.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ClassChange {
    pub old: Option<Class>,
    pub new: Option<Class>,
}

impl ClassChange {
    pub fn added(class: Class) -> Self {
        Self {
            old: None,
            new: Some(class),
        }
    }

    pub fn removed(class: Class) -> Self {
        Self {
            old: Some(class),
            new: None,
        }
    }

    pub fn modified(old: Class, new: Class) -> Self {
        Self {
            old: Some(old),
            new: Some(new),
        }
    }

    pub fn is_addition(&self) -> bool {
        self.old.is_none() && self.new.is_some()
    }

    pub fn is_removal(&self) -> bool {
        self.old.is_some() && self.new.is_none()
    }

    pub fn is_modification(&self) -> bool {
        self.old.is_some() && self.new.is_some()
    }
}

impl fmt::Display for ClassChange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.old, &self.new) {
            (None, Some(new)) => write!(f, "Added: {new}"),
            (Some(old), None) => write!(f, "Removed: {old}"),
            (Some(old), Some(new)) => write!(f, "Changed:\n\t{old}\n\tto: {new}"),
            (None, None) => Ok(()),
        }
    }
}

/// Ordered list of changes: matches and additions in new-timetable order,
/// followed by removals in old-timetable order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(transparent)]
pub struct TimetableDiff(pub Vec<ClassChange>);

impl TimetableDiff {
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, ClassChange> {
        self.0.iter()
    }

    /// Count of (added, modified, removed) entries.
    pub fn counts(&self) -> (usize, usize, usize) {
        self.0.iter().fold((0, 0, 0), |(a, m, r), c| {
            if c.is_addition() {
                (a + 1, m, r)
            } else if c.is_removal() {
                (a, m, r + 1)
            } else {
                (a, m + 1, r)
            }
        })
    }
}

impl fmt::Display for TimetableDiff {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for change in &self.0 {
            writeln!(f, "{change}")?;
            writeln!(f)?;
        }
        Ok(())
    }
}

impl IntoIterator for TimetableDiff {
    type Item = ClassChange;
    type IntoIter = std::vec::IntoIter<ClassChange>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

/// Non-empty change set detected for one timetable during a sweep.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChangeReport {
    pub key: TimetableKey,
    pub group_name: String,
    pub changes: TimetableDiff,
}
