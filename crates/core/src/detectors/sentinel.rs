use super::{Detector, DetectorResult};
use crate::context::ScanContext;
use crate::ir::{FuncId, InstId, InstKind, Program, ValueRef};
use crate::query;
use crate::report::{Finding, FindingContext, FindingSink};

/// `info->field[i]` reads (GEP `0, 0, 3, %i` into a `struct.*_info`) inside a
/// loop whose header tests an instruction against a constant.
pub(super) fn info_field_check(
    detector: Detector,
    ctx: &mut ScanContext<'_>,
    func: FuncId,
    sink: &mut dyn FindingSink,
) -> DetectorResult {
    let program = ctx.program;
    let forest = ctx.forest(func);
    let geps: Vec<InstId> =
        program.instructions(func).filter(|i| is_info_field_gep(ctx, *i)).collect();

    for gep in geps {
        let block = program.parent(gep);
        if forest.loop_depth(block) == 0 {
            continue;
        }
        let Some(header) =
            forest.loop_for(block).and_then(|lp| query::loop_header_of(forest, lp))
        else {
            continue;
        };
        for branch in program.block(header).insts.iter().copied() {
            let InstKind::CondBr { cond, .. } = &program.inst(branch).kind else {
                continue;
            };
            if !compares_constant_with_instruction(program, *cond) {
                continue;
            }
            let mut finding = Finding::new(detector.as_str(), Some(ctx.function_name(func)));
            finding = match ctx.location(gep) {
                Some(loc) => finding.site(ctx.site_at(loc)),
                None => {
                    let site = ctx.site(func, branch)?;
                    finding.site(site).with(FindingContext::Note {
                        text: format!(
                            "read at {gep} has no location; reporting the loop header test"
                        ),
                    })
                }
            };
            sink.emit(finding);
        }
    }
    Ok(())
}

fn is_info_field_gep(ctx: &ScanContext<'_>, inst: InstId) -> bool {
    let program = ctx.program;
    let i = program.inst(inst);
    let InstKind::GetElementPtr { base, .. } = &i.kind else {
        return false;
    };
    let base_ty = ctx.type_signature(*base);
    if !(base_ty.contains("_info") && base_ty.contains("struct")) {
        return false;
    }
    let ops = i.operands();
    if ops.len() != 5 {
        return false;
    }
    if program.const_int(ops[1]) != Some(0)
        || program.const_int(ops[2]) != Some(0)
        || program.const_int(ops[3]) != Some(3)
    {
        return false;
    }
    match ops[4].as_inst() {
        Some(index) => program.ty(program.inst(index).ty).is_integer(),
        None => false,
    }
}

/// `icmp` between an integer constant and an instruction, in either order.
fn compares_constant_with_instruction(program: &Program, cond: ValueRef) -> bool {
    let Some(cmp) = cond.as_inst() else {
        return false;
    };
    let InstKind::ICmp { lhs, rhs, .. } = &program.inst(cmp).kind else {
        return false;
    };
    (program.is_const_int(*lhs) && rhs.as_inst().is_some())
        || (lhs.as_inst().is_some() && program.is_const_int(*rhs))
}

/// A loop exit driven by comparing one byte of an indexed buffer with a
/// constant on every iteration (`while (p[i] != 'x')`).
///
/// The branch must sit on the same source line as the loop header's branch,
/// stay in the loop on its true edge and leave it on its false edge.
pub(super) fn byte_sentinel(
    detector: Detector,
    ctx: &mut ScanContext<'_>,
    func: FuncId,
    sink: &mut dyn FindingSink,
) -> DetectorResult {
    let program = ctx.program;
    let forest = ctx.forest(func);
    let branches: Vec<InstId> = program
        .instructions(func)
        .filter(|i| matches!(program.inst(*i).kind, InstKind::CondBr { .. }))
        .collect();

    for branch in branches {
        let InstKind::CondBr { cond, then_dest, else_dest } = &program.inst(branch).kind else {
            continue;
        };
        let block = program.parent(branch);
        if forest.loop_depth(block) == 0 {
            continue;
        }
        let Some(cmp) = cond.as_inst() else {
            continue;
        };
        let InstKind::ICmp { predicate, lhs, rhs } = &program.inst(cmp).kind else {
            continue;
        };
        if !predicate.is_equality() {
            continue;
        }
        let Some(lp) = forest.loop_for(block) else {
            continue;
        };

        let header_line = program
            .block(lp.header)
            .insts
            .iter()
            .copied()
            .find(|i| {
                matches!(program.inst(*i).kind, InstKind::Br { .. } | InstKind::CondBr { .. })
            })
            .and_then(|i| ctx.location(i))
            .map(|loc| loc.line)
            .unwrap_or(0);
        let branch_line = ctx.location(branch).map(|loc| loc.line).unwrap_or(0);
        if header_line == 0 || header_line != branch_line {
            continue;
        }
        if !(lp.contains(*then_dest) && !lp.contains(*else_dest)) {
            continue;
        }

        let Some(scanned) = byte_operand(program, *lhs, *rhs) else {
            continue;
        };
        if !is_indexed_byte_load(ctx, func, scanned) {
            continue;
        }
        let site = ctx.site(func, cmp)?;
        sink.emit(Finding::new(detector.as_str(), Some(ctx.function_name(func))).site(site));
    }
    Ok(())
}

/// The non-constant side of a comparison against an `i8` constant.
fn byte_operand(program: &Program, lhs: ValueRef, rhs: ValueRef) -> Option<ValueRef> {
    let is_byte_const = |v: ValueRef| {
        program.is_const_int(v) && program.ty(program.value_type(v)).is_integer_bits(8)
    };
    if program.is_const_int(lhs) {
        return (!program.is_const_int(rhs) && is_byte_const(lhs)).then_some(rhs);
    }
    if program.is_const_int(rhs) {
        return is_byte_const(rhs).then_some(lhs);
    }
    None
}

/// A load, inside a loop, of a two-operand `gep ptr, int` also inside a loop.
fn is_indexed_byte_load(ctx: &ScanContext<'_>, func: FuncId, value: ValueRef) -> bool {
    let program = ctx.program;
    let forest = ctx.forest(func);
    let Some(load) = value.as_inst() else {
        return false;
    };
    let InstKind::Load { ptr } = &program.inst(load).kind else {
        return false;
    };
    if forest.loop_depth(program.parent(load)) == 0 {
        return false;
    }
    let Some(gep) = ptr.as_inst() else {
        return false;
    };
    let gep_inst = program.inst(gep);
    if !matches!(gep_inst.kind, InstKind::GetElementPtr { .. }) {
        return false;
    }
    if forest.loop_depth(program.parent(gep)) == 0 {
        return false;
    }
    let ops = gep_inst.operands();
    ops.len() == 2
        && program.ty(program.value_type(ops[0])).is_pointer()
        && program.ty(program.value_type(ops[1])).is_integer()
}
