//! Scan history database.
//!
//! A small SQLite store of scan runs and the findings each produced, so
//! results can be listed and compared after the fact.
//! - `ScanRunRecord`/`ScanStatus`: one row per scan.
//! - `ScanDb`: the connection wrapper with schema migrations.

mod models;
mod scan_db;

pub use models::{timestamp, ScanRunRecord, ScanStatus};
pub use scan_db::{DbError, DbResult, ScanDb, CURRENT_SCHEMA_VERSION};
