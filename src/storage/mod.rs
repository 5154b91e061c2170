//! Storage abstractions for timetable persistence.
//!
//! Two tiers sit in front of the upstream site:
//! - Memory: `TimetableStore` keeps the latest timetable per `(group, period)`
//! - Disk: one JSON file per `(group, period)` under `timetables/`
//!
//! ## Directory Structure
//!
//! ```text
//! storage/
//! ├── groups/
//! │   └── group-assoc.json   # Group association map
//! └── timetables/
//!     ├── 1234-3.json
//!     └── 5678-3.json
//! ```

pub mod local;
mod store;

use async_trait::async_trait;

use crate::error::Result;
use crate::models::{GroupAssociations, Timetable, TimetableKey};

// Re-export for convenience
pub use local::LocalStorage;
pub use store::{Lookup, Source, TimetableStore};

/// Relative key of the persisted group association map.
pub const ASSOCIATIONS_KEY: &str = "groups/group-assoc.json";

/// Trait for timetable persistence backends.
#[async_trait]
pub trait TimetableStorage: Send + Sync {
    /// Load the persisted timetable for `key`, `None` when never saved.
    async fn load_timetable(&self, key: TimetableKey) -> Result<Option<Timetable>>;

    /// Replace the persisted timetable for `key`.
    ///
    /// Readers never observe a partially written value.
    async fn save_timetable(&self, key: TimetableKey, timetable: &Timetable) -> Result<()>;

    /// Load the cached group association map.
    async fn load_associations(&self) -> Result<Option<GroupAssociations>>;

    /// Persist the group association map.
    async fn save_associations(&self, associations: &GroupAssociations) -> Result<()>;
}
