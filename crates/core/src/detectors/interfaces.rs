use super::{Detector, DetectorResult};
use crate::context::ScanContext;
use crate::ir::FuncId;
use crate::query;
use crate::report::{Finding, FindingContext, FindingSink};

const DEVICE_CONTEXT: &str = "struct.nsIDeviceContext";
const GET_GC: &str = "_ZN21nsRenderingContextGTK5GetGCEv";
const GET_DRAWABLE: &str = "_ZN19nsDrawingSurfaceGTK11GetDrawableEv";

/// Drawing code that fetches GTK handles while taking pointer parameters
/// other than the device context; such functions can often be skipped.
pub(super) fn skippable_function(
    detector: Detector,
    ctx: &mut ScanContext<'_>,
    func: FuncId,
    sink: &mut dyn FindingSink,
) -> DetectorResult {
    let program = ctx.program;
    let (Some(iface), Some(get_gc), Some(get_drawable)) = (
        program.type_by_name(DEVICE_CONTEXT),
        program.function_by_name(GET_GC),
        program.function_by_name(GET_DRAWABLE),
    ) else {
        return Ok(());
    };

    if !(query::contains_call_to(program, func, get_gc)
        || query::contains_call_to(program, func, get_drawable))
    {
        return Ok(());
    }

    let foreign_pointer = program
        .param_types(func)
        .into_iter()
        .any(|p| program.ty(p).pointee().is_some_and(|pointee| pointee != iface));
    if !foreign_pointer {
        return Ok(());
    }

    // First instruction that maps to a real source line.
    let line = program
        .instructions(func)
        .filter_map(|i| program.inst(i).loc.as_ref().map(|l| l.line))
        .find(|l| *l > 0)
        .unwrap_or(0);
    let name = ctx.function_name(func);
    sink.emit(
        Finding::new(detector.as_str(), Some(name))
            .with(FindingContext::SkippableFunction { name: name.to_string(), line }),
    );
    Ok(())
}
