//! Structural queries over the read-only IR.
//!
//! Everything here is stateless: callers pass the program, loop facts and
//! source cache explicitly.

pub mod types;
pub mod walk;

pub use types::{llvm_name, TypeNames};
pub use walk::{forward_uses, successor_walk, WalkControl};

use crate::ir::{BlockId, CallSite, FuncId, InstId, Program};
use crate::loops::{Loop, LoopForest};
use crate::source::{LocationResolver, SourceCache};

/// Calls and invokes in `func` whose source line contains `needle`.
///
/// A call without a debug location has no line to match and is skipped.
pub fn call_sites_matching_source(
    program: &Program,
    resolver: &LocationResolver,
    sources: &mut SourceCache,
    func: FuncId,
    needle: &str,
) -> Vec<InstId> {
    let mut out = Vec::new();
    for inst in program.instructions(func) {
        if !program.inst(inst).is_call_like() {
            continue;
        }
        let Ok(loc) = resolver.resolve(program, inst) else {
            continue;
        };
        if sources.line_at(&loc.path, loc.line).contains(needle) {
            out.push(inst);
        }
    }
    out
}

/// The first member block of `lp` that is a loop header in `forest`.
pub fn loop_header_of(forest: &LoopForest, lp: &Loop) -> Option<BlockId> {
    lp.blocks.iter().copied().find(|b| forest.is_loop_header(*b))
}

/// Whether `func` directly calls `target`.
pub fn contains_call_to(program: &Program, func: FuncId, target: FuncId) -> bool {
    program.instructions(func).any(|i| program.called_function(i) == Some(target))
}

/// Direct calls and invokes of `target` within `func`, in instruction order.
/// Indirect calls never match.
pub fn call_sites_to(program: &Program, func: FuncId, target: FuncId) -> Vec<CallSite> {
    program
        .instructions(func)
        .filter(|i| program.called_function(*i) == Some(target))
        .filter_map(|i| program.call_site(i))
        .collect()
}

/// Functions whose name contains `needle`, in program order.
pub fn functions_containing_name(program: &Program, needle: &str) -> Vec<FuncId> {
    program.functions().filter(|(_, f)| f.name.contains(needle)).map(|(id, _)| id).collect()
}

/// Name used to match a call: the callee's name for direct calls, the source
/// line for indirect ones.
pub fn call_name(
    program: &Program,
    resolver: &LocationResolver,
    sources: &mut SourceCache,
    inst: InstId,
) -> String {
    match program.called_function(inst) {
        Some(callee) => program.function(callee).name.clone(),
        None => match resolver.resolve(program, inst) {
            Ok(loc) => sources.line_at(&loc.path, loc.line),
            Err(_) => String::new(),
        },
    }
}
