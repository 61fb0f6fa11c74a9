use std::collections::HashSet;

use super::{Detector, DetectorResult};
use crate::context::ScanContext;
use crate::ir::{FuncId, InstId, InstKind, User, ValueRef};
use crate::query::{successor_walk, WalkControl};
use crate::report::{Finding, FindingSink};

/// An `nsAString` local truncated with `SetLength(0)` whose next use appends
/// to it: the buffer is reallocated instead of reused.
pub(super) fn truncate_then_append(
    detector: Detector,
    ctx: &mut ScanContext<'_>,
    func: FuncId,
    sink: &mut dyn FindingSink,
) -> DetectorResult {
    let program = ctx.program;
    let allocas: Vec<InstId> = program
        .instructions(func)
        .filter(|i| matches!(program.inst(*i).kind, InstKind::Alloca { .. }))
        .filter(|i| ctx.type_signature((*i).into()).contains("struct.nsAString"))
        .collect();

    for alloca in allocas {
        let alloca_users = program.users(alloca.into());
        for load in alloca_users.iter().filter_map(|u| u.as_inst()) {
            if !matches!(program.inst(load).kind, InstKind::Load { .. }) {
                continue;
            }
            let Some(call) = first_call_user(ctx, load.into()) else {
                continue;
            };
            let args = program.inst(call).call_args().unwrap_or_default();
            if args.len() != 2 || program.const_int(args[1]) != Some(0) {
                continue;
            }
            if !ctx.call_name(call).contains("SetLength") {
                continue;
            }

            for next in next_uses(ctx, func, alloca, call) {
                if !matches!(program.inst(next).kind, InstKind::Load { .. }) {
                    continue;
                }
                let Some(append) = first_call_user(ctx, next.into()) else {
                    continue;
                };
                if !ctx.call_name(append).contains("Append") {
                    continue;
                }
                let first = ctx.site(func, call)?;
                let second = ctx.site(func, append)?;
                sink.emit(
                    Finding::new(detector.as_str(), Some(ctx.function_name(func)))
                        .site(first)
                        .site(second),
                );
            }
        }
    }
    Ok(())
}

/// The first user of `value`, when it is a plain call.
fn first_call_user(ctx: &ScanContext<'_>, value: ValueRef) -> Option<InstId> {
    let user = ctx.program.users(value).first()?.as_inst()?;
    ctx.program.inst(user).is_call().then_some(user)
}

/// The uses of `alloca` that can come next after `from`.
///
/// The rest of `from`'s block is searched first; a use there is the only
/// answer. Otherwise successor blocks outside loops are walked depth-first,
/// and the first use in a block ends that branch of the walk.
fn next_uses(ctx: &ScanContext<'_>, func: FuncId, alloca: InstId, from: InstId) -> Vec<InstId> {
    let program = ctx.program;
    let uses: HashSet<User> = program.users(alloca.into()).iter().copied().collect();
    let is_use = |i: InstId| uses.contains(&User::Inst(i));

    let block = program.parent(from);
    let insts = &program.block(block).insts;
    let Some(pos) = insts.iter().position(|i| *i == from) else {
        return Vec::new();
    };
    if let Some(hit) = insts[pos + 1..].iter().copied().find(|i| is_use(*i)) {
        return vec![hit];
    }

    let forest = ctx.forest(func);
    let mut found = Vec::new();
    let mut visited = HashSet::new();
    successor_walk(program, block, &mut visited, |b| {
        if forest.loop_depth(b) > 0 {
            return WalkControl::Skip;
        }
        match program.block(b).insts.iter().copied().find(|i| is_use(*i)) {
            Some(hit) => {
                found.push(hit);
                WalkControl::Skip
            }
            None => WalkControl::Continue,
        }
    });
    found
}

/// `nsIDocument::GetDocumentCharacterSet` result copied through a GEP into a
/// `nsCAutoString` that is touched only once.
pub(super) fn charset_copy(
    detector: Detector,
    ctx: &mut ScanContext<'_>,
    func: FuncId,
    sink: &mut dyn FindingSink,
) -> DetectorResult {
    let program = ctx.program;
    let getters: Vec<InstId> = program
        .instructions(func)
        .filter(|i| program.inst(*i).is_call())
        .filter(|i| {
            program.called_function(*i).is_some_and(|f| {
                let name = &program.function(f).name;
                name.contains("nsIDocument") && name.contains("GetDocumentCharacterSet")
            })
        })
        .collect();

    for getter in getters {
        for gep in program.users(getter.into()).iter().filter_map(|u| u.as_inst()) {
            if !matches!(program.inst(gep).kind, InstKind::GetElementPtr { .. }) {
                continue;
            }
            for call in program.users(gep.into()).iter().filter_map(|u| u.as_inst()) {
                let inst = program.inst(call);
                if !inst.is_call() {
                    continue;
                }
                let Some(target) = inst.call_args().and_then(|a| a.first()).copied() else {
                    continue;
                };
                if target.as_inst().is_none()
                    || ctx.type_signature(target) != "%struct.nsCAutoString*"
                {
                    continue;
                }
                let gep_uses = program
                    .users(target)
                    .iter()
                    .filter_map(|u| u.as_inst())
                    .filter(|u| matches!(program.inst(*u).kind, InstKind::GetElementPtr { .. }))
                    .count();
                if gep_uses == 1 {
                    let site = ctx.site(func, getter)?;
                    let finding = Finding::new(detector.as_str(), Some(ctx.function_name(func)));
                    sink.emit(finding.site(site));
                }
            }
        }
    }
    Ok(())
}
