//! perfscan-core
//!
//! Static detection of known performance anti-patterns in a compiled
//! program's intermediate representation.
//!
//! The crate holds the IR model the detectors read, the loop facts supplied
//! alongside it, source resolution, the detectors themselves and the engine
//! that drives them, plus scan configuration and a findings database. The
//! frontends stay thin.

pub mod config;
pub mod context;
pub mod db;
pub mod detectors;
pub mod engine;
pub mod ir;
pub mod loops;
pub mod query;
pub mod report;
pub mod source;

/// Returns the library version as encoded at compile time.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
