use super::{Detector, DetectorResult};
use crate::context::ScanContext;
use crate::ir::FuncId;
use crate::query;
use crate::report::{Finding, FindingContext, FindingSink};

/// Call sites whose source text contains `needle` and that sit inside a loop.
pub(super) fn detect(
    detector: Detector,
    ctx: &mut ScanContext<'_>,
    func: FuncId,
    needle: &str,
    sink: &mut dyn FindingSink,
) -> DetectorResult {
    let calls = query::call_sites_matching_source(
        ctx.program,
        &ctx.resolver,
        &mut ctx.sources,
        func,
        needle,
    );
    let forest = ctx.forest(func);
    for inst in calls {
        let depth = forest.loop_depth(ctx.block_of(inst));
        if depth == 0 {
            continue;
        }
        let site = ctx.site(func, inst)?;
        sink.emit(
            Finding::new(detector.as_str(), Some(ctx.function_name(func)))
                .site(site)
                .with(FindingContext::LoopDepth { depth }),
        );
    }
    Ok(())
}
