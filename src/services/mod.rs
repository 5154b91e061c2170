//! Service layer for the timetable crawler.
//!
//! This module contains the business logic for:
//! - Timetable page parsing (`TimetableParser`)
//! - Upstream page retrieval (`TimetableFetcher`, `HttpFetcher`)
//! - Group id discovery (`GroupScraper`)

mod fetcher;
mod groups;
mod parser;

pub use fetcher::{HttpFetcher, TimetableFetcher};
pub use groups::GroupScraper;
pub use parser::{ParsedTimetable, RowError, RowErrors, TimetableParser, parse_timetable};

#[cfg(test)]
pub(crate) use fetcher::fake;
