use std::collections::{HashMap, HashSet};

use crate::ir::{Program, Type, TypeId, ValueRef};

/// Printable names for every aggregate type in a program.
///
/// Named aggregates print as `%name`. Unnamed non-empty structs and unnamed
/// opaque types get `%0`, `%1`, ... in the order they are first reached:
/// named types sorted by name, then globals and their initializers, then
/// functions with their instructions and constant operands. Built once per
/// program so numbering stays fixed for the whole run.
#[derive(Debug, Clone, Default)]
pub struct TypeNames {
    names: HashMap<TypeId, String>,
    numbered: Vec<TypeId>,
}

impl TypeNames {
    pub fn for_program(program: &Program) -> Self {
        let mut names = HashMap::new();
        let mut symbols: Vec<(&str, TypeId)> = program
            .types()
            .filter_map(|(id, ty)| ty.name().filter(|n| !n.is_empty()).map(|n| (n, id)))
            .collect();
        symbols.sort_by(|a, b| a.0.cmp(b.0).then(a.1.cmp(&b.1)));
        for (name, id) in &symbols {
            names.insert(*id, format!("%{}", llvm_name(name)));
        }

        let mut finder = Finder {
            program,
            names,
            numbered: Vec::new(),
            seen_types: HashSet::new(),
            seen_consts: HashSet::new(),
        };
        for (_, id) in &symbols {
            finder.visit_type(*id);
        }
        for (_, global) in program.globals() {
            finder.visit_type(global.ty);
            if let Some(init) = global.initializer {
                finder.visit_value(ValueRef::Const(init));
            }
        }
        for (_, func) in program.functions() {
            finder.visit_type(func.ty);
            for block in &func.blocks {
                for inst in &program.block(*block).insts {
                    let inst = program.inst(*inst);
                    finder.visit_type(inst.ty);
                    for op in inst.operands() {
                        finder.visit_value(op);
                    }
                }
            }
        }

        Self { names: finder.names, numbered: finder.numbered }
    }

    /// Symbolic name assigned to a type, if any.
    pub fn name_of(&self, ty: TypeId) -> Option<&str> {
        self.names.get(&ty).map(String::as_str)
    }

    /// Types that received a `%N` name, in numbering order.
    pub fn numbered(&self) -> &[TypeId] {
        &self.numbered
    }

    /// Canonical text of a type, e.g. `%struct.nsAString*` or `[4 x i8]`.
    pub fn render(&self, program: &Program, ty: TypeId) -> String {
        let mut out = String::new();
        let mut stack = Vec::new();
        self.write_type(program, ty, &mut stack, &mut out);
        out
    }

    /// Canonical text of the static type of `value`.
    pub fn type_signature(&self, program: &Program, value: ValueRef) -> String {
        self.render(program, program.value_type(value))
    }

    fn write_type(&self, program: &Program, ty: TypeId, stack: &mut Vec<TypeId>, out: &mut String) {
        if let Some(name) = self.names.get(&ty) {
            out.push_str(name);
            return;
        }
        // Anonymous recursion prints as an up-reference.
        if let Some(pos) = stack.iter().rposition(|t| *t == ty) {
            out.push_str(&format!("\\{}", stack.len() - pos));
            return;
        }
        stack.push(ty);
        match program.ty(ty) {
            Type::Void => out.push_str("void"),
            Type::Label => out.push_str("label"),
            Type::Float => out.push_str("float"),
            Type::Double => out.push_str("double"),
            Type::Integer { bits } => out.push_str(&format!("i{bits}")),
            Type::Pointer { pointee } => {
                self.write_type(program, *pointee, stack, out);
                out.push('*');
            }
            Type::Array { element, len } => {
                out.push_str(&format!("[{len} x "));
                self.write_type(program, *element, stack, out);
                out.push(']');
            }
            Type::Struct { fields, packed, .. } => {
                if *packed {
                    out.push('<');
                }
                if fields.is_empty() {
                    out.push_str("{}");
                } else {
                    out.push_str("{ ");
                    self.write_list(program, fields, stack, out);
                    out.push_str(" }");
                }
                if *packed {
                    out.push('>');
                }
            }
            Type::Opaque { .. } => out.push_str("opaque"),
            Type::Function { ret, params, var_arg } => {
                self.write_type(program, *ret, stack, out);
                out.push_str(" (");
                self.write_list(program, params, stack, out);
                if *var_arg {
                    if !params.is_empty() {
                        out.push_str(", ");
                    }
                    out.push_str("...");
                }
                out.push(')');
            }
        }
        stack.pop();
    }

    fn write_list(
        &self,
        program: &Program,
        tys: &[TypeId],
        stack: &mut Vec<TypeId>,
        out: &mut String,
    ) {
        for (i, t) in tys.iter().enumerate() {
            if i > 0 {
                out.push_str(", ");
            }
            self.write_type(program, *t, stack, out);
        }
    }
}

struct Finder<'p> {
    program: &'p Program,
    names: HashMap<TypeId, String>,
    numbered: Vec<TypeId>,
    seen_types: HashSet<TypeId>,
    seen_consts: HashSet<ValueRef>,
}

impl Finder<'_> {
    fn visit_type(&mut self, ty: TypeId) {
        if !self.seen_types.insert(ty) {
            return;
        }
        let numbered = match self.program.ty(ty) {
            Type::Struct { fields, .. } => !fields.is_empty(),
            Type::Opaque { .. } => true,
            _ => false,
        };
        if numbered && !self.names.contains_key(&ty) {
            self.names.insert(ty, format!("%{}", self.numbered.len()));
            self.numbered.push(ty);
        }
        for sub in self.program.ty(ty).subtypes() {
            self.visit_type(sub);
        }
    }

    /// Only constants carry types not reachable otherwise; globals and
    /// functions are enumerated on their own.
    fn visit_value(&mut self, value: ValueRef) {
        let ValueRef::Const(id) = value else {
            return;
        };
        if !self.seen_consts.insert(value) {
            return;
        }
        let constant = self.program.constant(id);
        self.visit_type(constant.ty);
        for op in constant.operands() {
            self.visit_value(*op);
        }
    }
}

/// `name` as it appears after the `%` sigil: bare when it only uses
/// `[A-Za-z0-9._-]` and does not start with a digit, quoted and escaped otherwise.
pub fn llvm_name(name: &str) -> String {
    let needs_quotes = name.as_bytes().first().is_some_and(u8::is_ascii_digit)
        || name
            .bytes()
            .any(|c| !(c.is_ascii_alphanumeric() || c == b'-' || c == b'.' || c == b'_'));
    if !needs_quotes {
        return name.to_string();
    }
    let mut out = String::with_capacity(name.len() + 2);
    out.push('"');
    for c in name.bytes() {
        if (0x20..0x7f).contains(&c) && c != b'\\' && c != b'"' {
            out.push(c as char);
        } else {
            out.push_str(&format!("\\{c:02X}"));
        }
    }
    out.push('"');
    out
}
