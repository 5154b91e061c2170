//! Utility functions and helpers.

pub mod http;
pub mod url;

pub use self::url::{resolve_url, timetable_url};
