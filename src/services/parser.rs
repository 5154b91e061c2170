// src/services/parser.rs

//! Timetable page parser.
//!
//! Turns the schedule page of one group into a [`Timetable`]. Rows that fail
//! to parse are collected as [`RowError`]s instead of aborting the whole
//! document; only a page without the group header is rejected outright.

use std::fmt;

use chrono::NaiveDateTime;
use regex::Regex;
use scraper::{ElementRef, Html, Selector};
use thiserror::Error;

use crate::error::{AppError, Result};
use crate::models::{Class, TIME_FORMAT, Timetable};

const GROUP_NAME_SELECTOR: &str = ".grupa";
const ROW_SELECTOR: &str = "tr";
const CELL_SELECTOR: &str = "td";
const URGENT_CLASS: &str = "czerwony";
const NOTES_CLASS: &str = "uwagi";
const HOUR_PATTERN: &str = r"\d{2}:\d{2}";

/// A single row that could not be turned into a class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowError {
    /// Zero-based row index in the document (the header row is 0)
    pub row: usize,
    pub message: String,
}

impl fmt::Display for RowError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "row {}: {}", self.row, self.message)
    }
}

/// All row-level failures of one parse.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{}", join_errors(.0))]
pub struct RowErrors(pub Vec<RowError>);

fn join_errors(errors: &[RowError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Parser output: the timetable plus the rows that had to be dropped.
#[derive(Debug, Clone)]
pub struct ParsedTimetable {
    pub timetable: Timetable,
    /// `Some` only when at least one row failed
    pub row_errors: Option<RowErrors>,
}

impl ParsedTimetable {
    pub fn is_clean(&self) -> bool {
        self.row_errors.is_none()
    }
}

/// Class under construction while walking the cells of one row.
#[derive(Debug, Default)]
struct PendingClass {
    start: Option<NaiveDateTime>,
    end: Option<NaiveDateTime>,
    subject: String,
    kind: String,
    instructor: String,
    room: String,
    urgent: bool,
}

impl PendingClass {
    /// A class is kept only with both timestamps and a subject.
    fn finish(self) -> Option<Class> {
        let (start, end) = (self.start?, self.end?);
        if self.subject.is_empty() {
            return None;
        }
        Some(Class {
            start,
            end,
            subject: self.subject,
            kind: self.kind,
            instructor: self.instructor,
            room: self.room,
            note: None,
            urgent: self.urgent,
        })
    }
}

/// Compiled selectors and patterns for the timetable page.
#[derive(Debug, Clone)]
pub struct TimetableParser {
    group_name: Selector,
    row: Selector,
    cell: Selector,
    hours: Regex,
}

impl TimetableParser {
    pub fn new() -> Result<Self> {
        Ok(Self {
            group_name: parse_selector(GROUP_NAME_SELECTOR)?,
            row: parse_selector(ROW_SELECTOR)?,
            cell: parse_selector(CELL_SELECTOR)?,
            hours: Regex::new(HOUR_PATTERN)?,
        })
    }

    /// Parse a raw schedule page for `group_id`.
    pub fn parse(&self, body: &[u8], group_id: u32) -> Result<ParsedTimetable> {
        let document = Html::parse_document(&String::from_utf8_lossy(body));

        let mut headers = document.select(&self.group_name).peekable();
        if headers.peek().is_none() {
            return Err(AppError::document(format!(
                "group name element '{GROUP_NAME_SELECTOR}' not found"
            )));
        }
        let group_name: String = headers.flat_map(|el| el.text()).collect();

        let mut timetable = Timetable::new(group_id, group_name.trim());
        let mut errors = Vec::new();

        // Row 0 is the column header.
        for (index, row) in document.select(&self.row).enumerate().skip(1) {
            if let Err(message) = self.parse_row(row, &mut timetable) {
                errors.push(RowError {
                    row: index,
                    message,
                });
            }
        }

        let row_errors = (!errors.is_empty()).then_some(RowErrors(errors));
        Ok(ParsedTimetable {
            timetable,
            row_errors,
        })
    }

    /// Walk the cells of one row, appending its class when it is complete.
    ///
    /// Even a failing row may have attached a note to the previous class.
    fn parse_row(
        &self,
        row: ElementRef<'_>,
        timetable: &mut Timetable,
    ) -> std::result::Result<(), String> {
        let mut pending = PendingClass {
            urgent: has_class(row, URGENT_CLASS),
            ..PendingClass::default()
        };
        let mut date_label = String::new();

        for (column, cell) in row.select(&self.cell).enumerate() {
            if has_class(cell, NOTES_CLASS) {
                if let Some(last) = timetable.classes.last_mut() {
                    let note = cell_text(cell);
                    last.note = (!note.is_empty()).then_some(note);
                    break;
                }
            }
            // Merged cells mark breaks and announcements, never a class.
            if cell.value().attr("colspan").is_some_and(|v| !v.is_empty()) {
                return Ok(());
            }

            match column {
                0 => date_label = cell_text(cell),
                1 => {
                    let raw: String = cell.text().collect();
                    let (start, end) = self.parse_hours(&date_label, &raw)?;
                    pending.start = Some(start);
                    pending.end = Some(end);
                }
                2 => pending.subject = cell_text(cell),
                3 => pending.kind = cell_text(cell),
                4 => pending.instructor = cell_text(cell),
                5 => pending.room = cell_text(cell),
                _ => {}
            }
        }

        if let Some(class) = pending.finish() {
            timetable.classes.push(class);
        }
        Ok(())
    }

    /// Combine the date label with the two `HH:MM` tokens of the hours cell.
    fn parse_hours(
        &self,
        date_label: &str,
        raw: &str,
    ) -> std::result::Result<(NaiveDateTime, NaiveDateTime), String> {
        let hours: Vec<&str> = self.hours.find_iter(raw).map(|m| m.as_str()).collect();
        let [start, end] = hours[..] else {
            return Err(format!("invalid hours field: {}", raw.trim()));
        };

        let at = |hour: &str| {
            NaiveDateTime::parse_from_str(&format!("{date_label} {hour}"), TIME_FORMAT)
                .map_err(|_| format!("could not parse time: {}", raw.trim()))
        };
        Ok((at(start)?, at(end)?))
    }
}

/// Parse a schedule page with a freshly compiled parser.
pub fn parse_timetable(body: &[u8], group_id: u32) -> Result<ParsedTimetable> {
    TimetableParser::new()?.parse(body, group_id)
}

fn parse_selector(s: &str) -> Result<Selector> {
    Selector::parse(s).map_err(|e| AppError::selector(s, format!("{e:?}")))
}

fn has_class(element: ElementRef<'_>, class: &str) -> bool {
    element.value().classes().any(|c| c == class)
}

fn cell_text(cell: ElementRef<'_>) -> String {
    cell.text().collect::<String>().trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    const PAGE: &str = r#"<!DOCTYPE html>
<html><body>
<div class="grupa">  KrDZIs3011  </div>
<table>
<tr><th>Termin</th><th>Dzień, godzina</th><th>Przedmiot</th><th>Typ</th><th>Nauczyciel</th><th>Sala</th></tr>
<tr><td>2024-10-14</td><td>Pn 08:00 - 09:30 (2g.)</td><td>Algebra</td><td>wykład</td><td>dr Nowak</td><td>101</td></tr>
<tr class="czerwony"><td>2024-10-14</td><td>Pn 09:45 - 11:15 (2g.)</td><td>Logika</td><td>ćwiczenia</td><td>dr Kowal</td><td>205</td></tr>
<tr><td colspan="6" class="uwagi">  Zajęcia online  </td></tr>
<tr><td colspan="6">Przerwa świąteczna</td></tr>
<tr><td>2024-10-15</td><td>Wt 12:00 - 13:30 (2g.)</td><td>Statystyka</td><td>lektorat</td><td>mgr Lis</td><td>Paw. A</td></tr>
</table>
</body></html>"#;

    fn parse(html: &str) -> ParsedTimetable {
        parse_timetable(html.as_bytes(), 1234).unwrap()
    }

    #[test]
    fn test_parses_group_and_classes() {
        let parsed = parse(PAGE);
        assert!(parsed.is_clean());

        let tt = &parsed.timetable;
        assert_eq!(tt.group_id, 1234);
        assert_eq!(tt.group_name, "KrDZIs3011");
        assert_eq!(tt.len(), 3);

        let first = &tt.classes[0];
        assert_eq!(first.start.format(TIME_FORMAT).to_string(), "2024-10-14 08:00");
        assert_eq!(first.end.format(TIME_FORMAT).to_string(), "2024-10-14 09:30");
        assert_eq!(first.subject, "Algebra");
        assert_eq!(first.kind, "wykład");
        assert_eq!(first.instructor, "dr Nowak");
        assert_eq!(first.room, "101");
        assert!(!first.urgent);
        assert_eq!(tt.classes[2].room, "Paw. A");
    }

    #[test]
    fn test_highlighted_row_is_urgent() {
        let parsed = parse(PAGE);
        assert!(parsed.timetable.classes[1].urgent);
    }

    #[test]
    fn test_note_attaches_to_preceding_class() {
        let parsed = parse(PAGE);
        let classes = &parsed.timetable.classes;
        assert_eq!(classes[0].note, None);
        assert_eq!(classes[1].note.as_deref(), Some("Zajęcia online"));
        assert_eq!(classes[2].note, None);
    }

    #[test]
    fn test_colspan_row_never_produces_class() {
        let html = r#"<html><body><div class="grupa">G</div><table>
<tr><th>h</th></tr>
<tr><td>2024-10-14</td><td colspan="2">08:00 - 09:30</td><td>Algebra</td></tr>
</table></body></html>"#;
        let parsed = parse(html);
        assert!(parsed.is_clean());
        assert!(parsed.timetable.is_empty());
    }

    #[test]
    fn test_trailing_colspan_cell_drops_complete_row() {
        let html = r#"<html><body><div class="grupa">G</div><table>
<tr><th>h</th></tr>
<tr><td>2024-10-14</td><td>08:00 - 09:30</td><td>Algebra</td><td colspan="3">merged</td></tr>
<tr><td>2024-10-15</td><td>12:00 - 13:30</td><td>Logika</td></tr>
</table></body></html>"#;
        let parsed = parse(html);
        assert!(parsed.is_clean());
        assert_eq!(parsed.timetable.len(), 1);
        assert_eq!(parsed.timetable.classes[0].subject, "Logika");
    }

    #[test]
    fn test_row_without_subject_is_dropped() {
        let html = r#"<html><body><div class="grupa">G</div><table>
<tr><th>h</th></tr>
<tr><td>2024-10-14</td><td>08:00 - 09:30</td><td>   </td><td>wykład</td></tr>
</table></body></html>"#;
        let parsed = parse(html);
        assert!(parsed.is_clean());
        assert!(parsed.timetable.is_empty());
    }

    #[test]
    fn test_single_hour_token_is_row_error() {
        let html = r#"<html><body><div class="grupa">G</div><table>
<tr><th>h</th></tr>
<tr><td>2024-10-14</td><td>08:00 - 09:30</td><td>Algebra</td></tr>
<tr><td>2024-10-14</td><td>od 10:00</td><td>Logika</td></tr>
<tr><td>2024-10-15</td><td>12:00 - 13:30</td><td>Statystyka</td></tr>
</table></body></html>"#;
        let parsed = parse(html);

        let subjects: Vec<_> = parsed
            .timetable
            .classes
            .iter()
            .map(|c| c.subject.as_str())
            .collect();
        assert_eq!(subjects, vec!["Algebra", "Statystyka"]);

        let errors = parsed.row_errors.unwrap();
        assert_eq!(errors.0.len(), 1);
        assert_eq!(errors.0[0].row, 2);
        assert!(errors.to_string().contains("invalid hours field: od 10:00"));
    }

    #[test]
    fn test_unparsable_date_is_row_error() {
        let html = r#"<html><body><div class="grupa">G</div><table>
<tr><th>h</th></tr>
<tr><td>jutro</td><td>08:00 - 09:30</td><td>Algebra</td></tr>
</table></body></html>"#;
        let parsed = parse(html);
        assert!(parsed.timetable.is_empty());
        assert!(
            parsed
                .row_errors
                .unwrap()
                .to_string()
                .contains("could not parse time")
        );
    }

    #[test]
    fn test_note_without_previous_class_is_ignored() {
        let html = r#"<html><body><div class="grupa">G</div><table>
<tr><th>h</th></tr>
<tr><td colspan="6" class="uwagi">orphan</td></tr>
<tr><td>2024-10-14</td><td>08:00 - 09:30</td><td>Algebra</td></tr>
</table></body></html>"#;
        let parsed = parse(html);
        assert_eq!(parsed.timetable.len(), 1);
        assert_eq!(parsed.timetable.classes[0].note, None);
    }

    #[test]
    fn test_parsing_is_idempotent() {
        assert_eq!(parse(PAGE).timetable, parse(PAGE).timetable);
    }

    #[test]
    fn test_missing_group_header_is_document_error() {
        let result = parse_timetable(b"<html><body><table></table></body></html>", 1);
        assert!(matches!(result, Err(AppError::Document(_))));
    }

    #[test]
    fn test_invalid_utf8_bytes_are_tolerated() {
        let mut body = PAGE.as_bytes().to_vec();
        let at = PAGE.find("Statystyka").unwrap();
        body.insert(at, 0xff);

        let parsed = parse_timetable(&body, 1234).unwrap();
        assert_eq!(parsed.timetable.len(), 3);
        assert_eq!(parsed.timetable.classes[2].subject, "\u{fffd}Statystyka");
    }

    #[test]
    fn test_invalid_utf8_without_group_header_is_document_error() {
        let result = parse_timetable(&[0xff, 0xfe, 0x00], 1);
        assert!(matches!(result, Err(AppError::Document(_))));
    }
}
