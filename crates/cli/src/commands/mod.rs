pub mod detectors;
pub mod history;
pub mod scan;

pub use detectors::*;
pub use history::*;
pub use scan::*;
