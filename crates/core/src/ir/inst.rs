use serde::{Deserialize, Serialize};

use crate::ir::{BlockId, TypeId, ValueRef};

/// Integer comparison predicate of an `icmp` instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntPredicate {
    Eq,
    Ne,
    Ugt,
    Uge,
    Ult,
    Ule,
    Sgt,
    Sge,
    Slt,
    Sle,
}

impl IntPredicate {
    /// `eq` and `ne` are the equality predicates.
    pub fn is_equality(self) -> bool {
        matches!(self, IntPredicate::Eq | IntPredicate::Ne)
    }
}

/// Source position attached to an instruction by the compiler's debug info.
///
/// `inlined_at` links to the location of the call site this code was inlined
/// into, forming a chain that ends at the outermost (non-inlined) position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugLoc {
    pub directory: String,
    pub file: String,
    pub line: u32,
    #[serde(default)]
    pub column: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub inlined_at: Option<Box<DebugLoc>>,
}

impl DebugLoc {
    pub fn new(directory: impl Into<String>, file: impl Into<String>, line: u32) -> Self {
        Self { directory: directory.into(), file: file.into(), line, column: 0, inlined_at: None }
    }

    /// Builder-style helper to record the call site this location was inlined into.
    pub fn inlined_at(mut self, site: DebugLoc) -> Self {
        self.inlined_at = Some(Box::new(site));
        self
    }

    /// A node is usable when it names a file and a real line.
    pub fn is_verified(&self) -> bool {
        !self.file.is_empty() && self.line > 0
    }

    /// The chain from this (innermost) node out to the outermost inlining site.
    pub fn chain(&self) -> Vec<&DebugLoc> {
        let mut out = vec![self];
        let mut cur = self;
        while let Some(parent) = cur.inlined_at.as_deref() {
            out.push(parent);
            cur = parent;
        }
        out
    }
}

/// Operation performed by an instruction, with its operands.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstKind {
    Alloca {
        allocated: TypeId,
    },
    Load {
        ptr: ValueRef,
    },
    Store {
        value: ValueRef,
        ptr: ValueRef,
    },
    GetElementPtr {
        base: ValueRef,
        indices: Vec<ValueRef>,
    },
    Call {
        callee: ValueRef,
        args: Vec<ValueRef>,
    },
    Invoke {
        callee: ValueRef,
        args: Vec<ValueRef>,
        normal: BlockId,
        unwind: BlockId,
    },
    ICmp {
        predicate: IntPredicate,
        lhs: ValueRef,
        rhs: ValueRef,
    },
    Br {
        dest: BlockId,
    },
    CondBr {
        cond: ValueRef,
        then_dest: BlockId,
        else_dest: BlockId,
    },
    Switch {
        cond: ValueRef,
        default: BlockId,
        cases: Vec<(ValueRef, BlockId)>,
    },
    Ret {
        #[serde(default)]
        value: Option<ValueRef>,
    },
    Unreachable,
    Phi {
        incoming: Vec<(ValueRef, BlockId)>,
    },
    Cast {
        opcode: String,
        value: ValueRef,
    },
    Binary {
        opcode: String,
        lhs: ValueRef,
        rhs: ValueRef,
    },
    Other {
        opcode: String,
        #[serde(default)]
        operands: Vec<ValueRef>,
    },
}

/// One IR instruction. The owning block is tracked by the [`crate::ir::Program`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instruction {
    /// Result type (`void` for instructions producing nothing).
    pub ty: TypeId,
    pub kind: InstKind,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub loc: Option<DebugLoc>,
}

impl Instruction {
    /// Value operands in compiler order.
    ///
    /// Calls and invokes list their arguments first and the callee last, so
    /// `operand(i)` is the i-th argument. GEPs list the base first.
    pub fn operands(&self) -> Vec<ValueRef> {
        match &self.kind {
            InstKind::Alloca { .. } | InstKind::Br { .. } | InstKind::Unreachable => Vec::new(),
            InstKind::Load { ptr } => vec![*ptr],
            InstKind::Store { value, ptr } => vec![*value, *ptr],
            InstKind::GetElementPtr { base, indices } => {
                let mut out = Vec::with_capacity(indices.len() + 1);
                out.push(*base);
                out.extend(indices.iter().copied());
                out
            }
            InstKind::Call { callee, args } | InstKind::Invoke { callee, args, .. } => {
                let mut out = args.clone();
                out.push(*callee);
                out
            }
            InstKind::ICmp { lhs, rhs, .. } | InstKind::Binary { lhs, rhs, .. } => vec![*lhs, *rhs],
            InstKind::CondBr { cond, .. } => vec![*cond],
            InstKind::Switch { cond, cases, .. } => {
                let mut out = vec![*cond];
                out.extend(cases.iter().map(|(v, _)| *v));
                out
            }
            InstKind::Ret { value } => value.iter().copied().collect(),
            InstKind::Phi { incoming } => incoming.iter().map(|(v, _)| *v).collect(),
            InstKind::Cast { value, .. } => vec![*value],
            InstKind::Other { operands, .. } => operands.clone(),
        }
    }

    pub fn operand(&self, index: usize) -> Option<ValueRef> {
        self.operands().get(index).copied()
    }

    pub fn num_operands(&self) -> usize {
        self.operands().len()
    }

    pub fn is_call_like(&self) -> bool {
        matches!(self.kind, InstKind::Call { .. } | InstKind::Invoke { .. })
    }

    pub fn is_call(&self) -> bool {
        matches!(self.kind, InstKind::Call { .. })
    }

    /// Arguments of a call or invoke.
    pub fn call_args(&self) -> Option<&[ValueRef]> {
        match &self.kind {
            InstKind::Call { args, .. } | InstKind::Invoke { args, .. } => Some(args),
            _ => None,
        }
    }

    pub fn callee(&self) -> Option<ValueRef> {
        match &self.kind {
            InstKind::Call { callee, .. } | InstKind::Invoke { callee, .. } => Some(*callee),
            _ => None,
        }
    }

    /// Control-flow successors for terminators, in edge order.
    pub fn successors(&self) -> Vec<BlockId> {
        match &self.kind {
            InstKind::Br { dest } => vec![*dest],
            InstKind::CondBr { then_dest, else_dest, .. } => vec![*then_dest, *else_dest],
            InstKind::Invoke { normal, unwind, .. } => vec![*normal, *unwind],
            InstKind::Switch { default, cases, .. } => {
                let mut out = vec![*default];
                out.extend(cases.iter().map(|(_, b)| *b));
                out
            }
            _ => Vec::new(),
        }
    }

    pub fn is_terminator(&self) -> bool {
        matches!(
            self.kind,
            InstKind::Br { .. }
                | InstKind::CondBr { .. }
                | InstKind::Switch { .. }
                | InstKind::Ret { .. }
                | InstKind::Invoke { .. }
                | InstKind::Unreachable
        )
    }
}
