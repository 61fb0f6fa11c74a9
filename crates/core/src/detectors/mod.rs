//! Per-bug detector routines and their dispatch.
//!
//! A detector is a plain function over one function of the program (or the
//! whole program for module-level detectors). Selection is a closed enum,
//! dispatched by `match`.

use thiserror::Error;

use crate::context::ScanContext;
use crate::ir::{FuncId, InstId};
use crate::report::FindingSink;

mod api_calls;
mod format;
mod interfaces;
mod loop_calls;
mod mutex;
pub mod registry;
mod sentinel;
mod string_buffer;

pub use format::is_hex_byte_format;
pub use registry::{Detector, DetectorInfo, Granularity};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum DetectorError {
    #[error("no debug location for instruction {instruction} in function `{function}`")]
    MissingDebugInfo { function: String, instruction: InstId },
}

pub type DetectorResult = Result<(), DetectorError>;

/// Run a per-function detector on `func`. Module-level detectors do nothing here.
pub fn run_function(
    detector: Detector,
    ctx: &mut ScanContext<'_>,
    func: FuncId,
    sink: &mut dyn FindingSink,
) -> DetectorResult {
    match detector {
        Detector::MozillaBug35294 => loop_calls::detect(detector, ctx, func, "RemoveChildAt", sink),
        Detector::MozillaBug311566 => loop_calls::detect(detector, ctx, func, "Append(", sink),
        Detector::LoopNestedCallSites => loop_calls::detect(detector, ctx, func, "", sink),
        Detector::MozillaBug103330 => {
            string_buffer::truncate_then_append(detector, ctx, func, sink)
        }
        Detector::MozillaBug267506 => string_buffer::charset_copy(detector, ctx, func, sink),
        Detector::MozillaBug66461 => interfaces::skippable_function(detector, ctx, func, sink),
        Detector::MozillaBug409961 => api_calls::qi_in_loop(detector, ctx, func, sink),
        Detector::MySQLBug38769 => sentinel::info_field_check(detector, ctx, func, sink),
        Detector::MySQLBug14637 => sentinel::byte_sentinel(detector, ctx, func, sink),
        Detector::MySQLBug49491 => format::hex_format(detector, ctx, func, sink),
        Detector::MySQLBug39268 => api_calls::transaction_without_hint(detector, ctx, func, sink),
        Detector::MySQLBug48229 => api_calls::two_arg_val_str(detector, ctx, func, sink),
        Detector::ApacheBug33605 => api_calls::setsockopt_calls(detector, ctx, func, sink),
        Detector::ApacheBug45464 => api_calls::stat_full_info(detector, ctx, func, sink),
        Detector::MySQLBug38968
        | Detector::MozillaBug258793
        | Detector::MySQLBug26527
        | Detector::MySQLBug38941
        | Detector::MySQLBug38824 => Ok(()),
    }
}

/// Run a module-level detector once. Per-function detectors do nothing here.
pub fn run_module(
    detector: Detector,
    ctx: &mut ScanContext<'_>,
    sink: &mut dyn FindingSink,
) -> DetectorResult {
    match detector {
        Detector::MySQLBug38968 => mutex::lifecycle(detector, ctx, sink),
        _ => Ok(()),
    }
}
