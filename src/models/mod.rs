// src/models/mod.rs

//! Domain models for the timetable crawler.
//!
//! This module contains all data structures used throughout the application,
//! organized by their primary purpose.

mod config;
mod diff;
mod groups;
pub(crate) mod timetable;

// Re-export all public types
pub use config::{Config, FetcherConfig, GroupsConfig, ServerConfig, StorageConfig, SweepConfig};
pub use diff::{ChangeReport, ClassChange, TimetableDiff};
pub use groups::GroupAssociations;
pub use timetable::{Class, TIME_FORMAT, Timetable, TimetableKey};
