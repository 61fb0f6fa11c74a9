use std::collections::BTreeSet;

use tracing::debug;

use super::{Detector, DetectorResult};
use crate::context::ScanContext;
use crate::ir::{InstId, Program, User, ValueRef};
use crate::report::{Finding, FindingContext, FindingSink, LifecycleVerdict};

/// Creation and teardown functions; calls to these do not count as use.
const LIFECYCLE_FUNCTIONS: [&str; 6] = [
    "mutex_create_func",
    "mutex_free",
    "os_fast_mutex_init",
    "os_fast_mutex_free",
    "pthread_mutex_init",
    "pthread_mutex_destroy",
];

/// Classify every global `pthread_mutex_t` by the functions that call it.
///
/// A mutex that no function other than the lifecycle ones touches is
/// reported as `bugs`; anything else is `good practice`. Calls count when
/// they take the global directly or through one intermediate user (a cast
/// or address computation).
pub(super) fn lifecycle(
    detector: Detector,
    ctx: &mut ScanContext<'_>,
    sink: &mut dyn FindingSink,
) -> DetectorResult {
    let program = ctx.program;
    for (id, global) in program.globals() {
        let value = ValueRef::Global(id);
        if !ctx.type_signature(value).contains("pthread_mutex_t") {
            continue;
        }

        let mut used_by = BTreeSet::new();
        for user in program.users(value) {
            if let Some(call) = direct_call(program, *user) {
                note_callee(program, call, &mut used_by);
                continue;
            }
            for inner in program.users(user.as_value()) {
                if let Some(call) = direct_call(program, *inner) {
                    note_callee(program, call, &mut used_by);
                }
            }
        }

        let verdict = if used_by.is_empty() {
            LifecycleVerdict::Bug
        } else {
            LifecycleVerdict::GoodPractice
        };
        debug!(variable = %global.name, verdict = verdict.as_str(), "classified mutex");
        sink.emit(Finding::new(detector.as_str(), None).with(FindingContext::Classification {
            variable: global.name.clone(),
            verdict,
            used_by: used_by.into_iter().collect(),
        }));
    }
    Ok(())
}

fn direct_call(program: &Program, user: User) -> Option<InstId> {
    let inst = user.as_inst()?;
    program.inst(inst).is_call().then_some(inst)
}

fn note_callee(program: &Program, call: InstId, used_by: &mut BTreeSet<String>) {
    let Some(callee) = program.called_function(call) else {
        return;
    };
    let name = &program.function(callee).name;
    if !LIFECYCLE_FUNCTIONS.contains(&name.as_str()) {
        used_by.insert(name.clone());
    }
}
