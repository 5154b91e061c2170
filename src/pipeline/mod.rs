//! Pipeline entry points for timetable operations.
//!
//! - `Coordinator`: periodic refresh sweep and timetable lookup
//! - `calculate_diff`: change detection between two snapshots
//! - `load_or_scrape_associations`: one-shot group association bootstrap

pub mod coordinator;
pub mod diff;
pub mod directory;
pub mod groups;

pub use coordinator::{Coordinator, GroupOutcome, SweepSummary};
pub use diff::calculate_diff;
pub use directory::{
    CombinedDirectory, GroupDirectory, StaticDirectory, UserFileDirectory, UserProfile,
};
pub use groups::load_or_scrape_associations;
