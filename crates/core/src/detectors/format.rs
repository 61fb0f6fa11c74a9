use super::{Detector, DetectorResult};
use crate::context::ScanContext;
use crate::ir::{ConstValue, FuncId, InstId, Program, ValueRef};
use crate::report::{Finding, FindingSink};

/// `sprintf(buf, "%02X%02X...")`: hex dumping one byte per call argument.
pub(super) fn hex_format(
    detector: Detector,
    ctx: &mut ScanContext<'_>,
    func: FuncId,
    sink: &mut dyn FindingSink,
) -> DetectorResult {
    let program = ctx.program;
    let calls: Vec<InstId> = program
        .instructions(func)
        .filter(|i| program.inst(*i).is_call())
        .filter(|i| {
            program.called_function(*i).is_some_and(|f| program.function(f).name == "sprintf")
        })
        .collect();

    for call in calls {
        let Some(format) = program.inst(call).call_args().and_then(|a| a.get(1)).copied() else {
            continue;
        };
        let Some(text) = constant_format(program, format) else {
            continue;
        };
        if is_hex_byte_format(text) {
            let site = ctx.site(func, call)?;
            sink.emit(Finding::new(detector.as_str(), Some(ctx.function_name(func))).site(site));
        }
    }
    Ok(())
}

/// Contents of a constant string reached through a constant expression over
/// a global (`getelementptr (@.str, 0, 0)`).
fn constant_format(program: &Program, value: ValueRef) -> Option<&str> {
    let expr = program.constant(value.as_const()?);
    let ConstValue::Expr { operands, .. } = &expr.value else {
        return None;
    };
    let global = program.global(operands.first()?.as_global()?);
    match &program.constant(global.initializer?).value {
        ConstValue::String(s) => Some(s),
        _ => None,
    }
}

/// `%02X`/`%02x` repeated, followed by exactly one trailing character (the
/// terminator). The length must be `4k + 1`.
pub fn is_hex_byte_format(text: &str) -> bool {
    if text.is_empty() || (text.len() - 1) % 4 != 0 {
        return false;
    }
    let mut rest = text.as_bytes();
    while rest.len() > 1 {
        if !(rest.starts_with(b"%02X") || rest.starts_with(b"%02x")) {
            break;
        }
        rest = &rest[4..];
    }
    rest.len() == 1
}
