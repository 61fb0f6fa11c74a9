//! Source-level view of the program: debug locations and file contents.

pub mod cache;
pub mod location;

pub use cache::SourceCache;
pub use location::{canonicalize, LocationError, LocationResolver, SourceLocation};
