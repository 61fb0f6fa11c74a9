use std::collections::BTreeSet;
use std::path::PathBuf;

use super::{Detector, DetectorResult};
use crate::context::ScanContext;
use crate::ir::{FuncId, InstId, InstKind, Program};
use crate::query;
use crate::report::{Finding, FindingContext, FindingSink};

const QI_WITH_ERROR: &str =
    "_ZN13nsCOMPtr_base25assign_from_qi_with_errorERK25nsQueryInterfaceWithErrorRK4nsID";

/// `apr_stat` wanted-flags value asking for every field (`APR_FINFO_NORM`
/// plus ownership and protection bits).
const APR_FINFO_FULL: i64 = 0x0073_b170;

/// Direct calls (not invokes) in `func` whose callee satisfies `pred`.
fn direct_calls<F>(program: &Program, func: FuncId, mut pred: F) -> Vec<InstId>
where
    F: FnMut(&str) -> bool,
{
    program
        .instructions(func)
        .filter(|i| program.inst(*i).is_call())
        .filter(|i| program.called_function(*i).is_some_and(|f| pred(&program.function(f).name)))
        .collect()
}

/// `Ndb::startTransaction(ndb, NULL, ...)` whose transaction is used to get an
/// operation: without a table hint the transaction lands on an arbitrary node.
pub(super) fn transaction_without_hint(
    detector: Detector,
    ctx: &mut ScanContext<'_>,
    func: FuncId,
    sink: &mut dyn FindingSink,
) -> DetectorResult {
    let program = ctx.program;
    for call in direct_calls(program, func, |name| name.contains("startTransaction")) {
        let args = program.inst(call).call_args().unwrap_or_default();
        let (Some(ndb), Some(hint)) = (args.first().copied(), args.get(1).copied()) else {
            continue;
        };
        if ctx.type_signature(ndb) != "%struct.Ndb*" {
            continue;
        }
        let null_hint = hint.as_const().is_some_and(|c| program.constant(c).is_null_value());
        if !null_hint {
            continue;
        }
        for user in program.users(call.into()).iter().filter_map(|u| u.as_inst()) {
            if !program.inst(user).is_call() {
                continue;
            }
            let gets_operation = program
                .called_function(user)
                .is_some_and(|f| program.function(f).name.contains("getNdbOperation"));
            if !gets_operation {
                continue;
            }
            let first = ctx.site(func, call)?;
            let second = ctx.site(func, user)?;
            sink.emit(
                Finding::new(detector.as_str(), Some(ctx.function_name(func)))
                    .site(first)
                    .site(second),
            );
        }
    }
    Ok(())
}

/// Every two-argument `val_str` call; these copy the value into a fresh buffer.
pub(super) fn two_arg_val_str(
    detector: Detector,
    ctx: &mut ScanContext<'_>,
    func: FuncId,
    sink: &mut dyn FindingSink,
) -> DetectorResult {
    let program = ctx.program;
    for call in direct_calls(program, func, |name| name.contains("val_str")) {
        if program.inst(call).call_args().map(<[_]>::len) != Some(2) {
            continue;
        }
        let site = ctx.site(func, call)?;
        sink.emit(Finding::new(detector.as_str(), Some(ctx.function_name(func))).site(site));
    }
    Ok(())
}

/// Call sites whose source line mentions `setsockopt`.
pub(super) fn setsockopt_calls(
    detector: Detector,
    ctx: &mut ScanContext<'_>,
    func: FuncId,
    sink: &mut dyn FindingSink,
) -> DetectorResult {
    let calls = query::call_sites_matching_source(
        ctx.program,
        &ctx.resolver,
        &mut ctx.sources,
        func,
        "setsockopt",
    );
    for call in calls {
        let site = ctx.site(func, call)?;
        sink.emit(Finding::new(detector.as_str(), Some(ctx.function_name(func))).site(site));
    }
    Ok(())
}

/// `apr_stat`/`apr_lstat` asked for full info while the caller only reads a
/// handful of `apr_finfo_t` fields.
pub(super) fn stat_full_info(
    detector: Detector,
    ctx: &mut ScanContext<'_>,
    func: FuncId,
    sink: &mut dyn FindingSink,
) -> DetectorResult {
    let program = ctx.program;
    let calls =
        direct_calls(program, func, |name| name.contains("apr_stat") || name.contains("apr_lstat"));
    for call in calls {
        let args = program.inst(call).call_args().unwrap_or_default();
        if args.get(2).and_then(|v| program.const_int(*v)) != Some(APR_FINFO_FULL) {
            continue;
        }
        let Some(finfo) = args.first().copied().filter(|v| v.as_inst().is_some()) else {
            continue;
        };
        if ctx.type_signature(finfo) != "%struct.apr_finfo_t*" {
            continue;
        }

        let fields: BTreeSet<i64> = program
            .users(finfo)
            .iter()
            .filter_map(|u| u.as_inst())
            .map(|u| program.inst(u))
            .filter(|i| matches!(i.kind, InstKind::GetElementPtr { .. }) && i.num_operands() == 3)
            .filter_map(|i| i.operand(2).and_then(|op| program.const_int(op)))
            .collect();
        if fields.is_empty() || fields.len() >= 17 {
            continue;
        }
        let site = ctx.site(func, call)?;
        sink.emit(
            Finding::new(detector.as_str(), Some(ctx.function_name(func)))
                .site(site)
                .with(FindingContext::Note {
                    text: format!("apr_finfo_t fields read: {}", fields.len()),
                }),
        );
    }
    Ok(())
}

/// `do_QueryInterface` with an error out-parameter inside a loop. The
/// function's source range (padded by five lines) is attached to the last
/// finding for context.
pub(super) fn qi_in_loop(
    detector: Detector,
    ctx: &mut ScanContext<'_>,
    func: FuncId,
    sink: &mut dyn FindingSink,
) -> DetectorResult {
    let program = ctx.program;
    let forest = ctx.forest(func);
    let mut min_line = u32::MAX;
    let mut max_line = 0;
    let mut last_path: Option<PathBuf> = None;
    let mut findings = Vec::new();

    for inst in program.instructions(func).collect::<Vec<_>>() {
        if let Some(loc) = ctx.location(inst) {
            min_line = min_line.min(loc.line);
            max_line = max_line.max(loc.line);
            last_path = Some(loc.path);
        }
        let block = program.parent(inst);
        if !forest.in_loop(block) {
            continue;
        }
        if !program.inst(inst).is_call() {
            continue;
        }
        let is_target = program
            .called_function(inst)
            .is_some_and(|f| program.function(f).name == QI_WITH_ERROR);
        if !is_target {
            continue;
        }
        let site = ctx.site(func, inst)?;
        findings.push(
            Finding::new(detector.as_str(), Some(ctx.function_name(func)))
                .site(site)
                .with(FindingContext::LoopDepth { depth: forest.loop_depth(block) })
                .with(FindingContext::LoopHeader { is_header: forest.is_loop_header(block) }),
        );
    }

    if let (Some(last), Some(path)) = (findings.last_mut(), last_path) {
        let first_line = min_line.saturating_sub(5).max(1);
        let last_line = max_line.saturating_add(4);
        let lines = ctx.sources.excerpt(&path, first_line, last_line);
        last.context.push(FindingContext::Excerpt { path, first_line, lines });
    }
    for finding in findings {
        sink.emit(finding);
    }
    Ok(())
}
