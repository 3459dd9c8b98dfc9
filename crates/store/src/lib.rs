//! Hydrosonde Store
//!
//! SQLite implementation of the reading sink and the calibration source,
//! plus read-side summaries of the stored level history.

pub mod error;
pub mod sqlite;
pub mod summary;

pub use error::{Result, StoreError};
pub use sqlite::{ReadingStore, StoredLevel};
pub use summary::{mode, LevelSummary};
