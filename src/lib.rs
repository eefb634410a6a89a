//! M2W booking sheet sync
//!
//! Pulls upcoming reservations from the Arctic reservation API, extracts the
//! customer and trip details guides need, sorts them by trip time, and
//! rewrites a Google spreadsheet with the result.

pub mod error;
pub mod helpers;
pub mod models;
pub mod service;

pub use error::SyncError;
pub use service::{SyncConfig, SyncReport, SyncService};

// Re-export key types for convenience
pub use helpers::enrich::{CustomerName, CustomerRecord};
pub use helpers::schedule::{convert_time, Row};
pub use helpers::sheets::{publish_rows, ClearScope, SheetTarget};
