//! Change detection between two timetable snapshots.
//!
//! Classes are paired by start time rather than by position, so a class that
//! merely moved within the listing is still recognized. Each old class can be
//! paired once; the first unpaired old class with the same start wins. A class
//! whose start time changed shows up as a removal plus an addition.

use crate::models::{Class, ClassChange, Timetable, TimetableDiff};

/// Calculate the changes that turn `old` into `new`.
///
/// Entries for paired and added classes follow `new`'s order; removals come
/// last in `old`'s order.
pub fn calculate_diff(old: &Timetable, new: &Timetable) -> TimetableDiff {
    let mut unmatched: Vec<&Class> = old.classes.iter().collect();
    let mut changes = Vec::new();

    for new_class in &new.classes {
        match unmatched.iter().position(|c| c.start == new_class.start) {
            Some(index) => {
                let old_class = unmatched.remove(index);
                if old_class != new_class {
                    changes.push(ClassChange::modified(old_class.clone(), new_class.clone()));
                }
            }
            None => changes.push(ClassChange::added(new_class.clone())),
        }
    }

    changes.extend(
        unmatched
            .into_iter()
            .map(|old_class| ClassChange::removed(old_class.clone())),
    );

    TimetableDiff(changes)
}
