//! Read-only program IR.
//!
//! The host compiler owns the real representation; this module is the view the
//! detectors query. A program is a set of arenas (types, constants, globals,
//! functions, blocks, instructions) addressed by small copyable ids. Operand
//! edges are [`ValueRef`]s, and the reverse (def-use) index is built once when
//! the program is assembled.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod builder;
mod dump;
mod inst;
mod types;

pub use builder::ProgramBuilder;
pub use dump::{FunctionLoops, ProgramDump};
pub use inst::{DebugLoc, InstKind, Instruction, IntPredicate};
pub use types::Type;

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(pub u32);

        impl $name {
            pub fn index(self) -> usize {
                self.0 as usize
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "{}"), self.0)
            }
        }
    };
}

arena_id!(
    /// Index into the program's type table.
    TypeId,
    "type#"
);
arena_id!(ConstId, "const#");
arena_id!(GlobalId, "@g");
arena_id!(FuncId, "fn#");
arena_id!(
    /// Identity of a basic block; unique across the whole program.
    BlockId,
    "bb"
);
arena_id!(
    /// Identity of an instruction; unique across the whole program.
    InstId,
    "%i"
);

/// An operand edge: a reference to something that produces a value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueRef {
    Inst(InstId),
    Arg { func: FuncId, index: u32 },
    Const(ConstId),
    Global(GlobalId),
    Func(FuncId),
}

impl ValueRef {
    pub fn as_inst(self) -> Option<InstId> {
        match self {
            ValueRef::Inst(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_const(self) -> Option<ConstId> {
        match self {
            ValueRef::Const(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_global(self) -> Option<GlobalId> {
        match self {
            ValueRef::Global(id) => Some(id),
            _ => None,
        }
    }

    pub fn as_func(self) -> Option<FuncId> {
        match self {
            ValueRef::Func(id) => Some(id),
            _ => None,
        }
    }

    /// Constants, globals and functions are all compile-time constants.
    pub fn is_constant(self) -> bool {
        matches!(self, ValueRef::Const(_) | ValueRef::Global(_) | ValueRef::Func(_))
    }
}

impl From<InstId> for ValueRef {
    fn from(id: InstId) -> Self {
        ValueRef::Inst(id)
    }
}

impl From<ConstId> for ValueRef {
    fn from(id: ConstId) -> Self {
        ValueRef::Const(id)
    }
}

impl From<GlobalId> for ValueRef {
    fn from(id: GlobalId) -> Self {
        ValueRef::Global(id)
    }
}

impl From<FuncId> for ValueRef {
    fn from(id: FuncId) -> Self {
        ValueRef::Func(id)
    }
}

/// Payload of a constant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConstValue {
    /// Integer constant, sign-extended to 64 bits.
    Int(i64),
    Null,
    Undef,
    ZeroInit,
    /// Character array; includes the terminating NUL when the source had one.
    String(String),
    Aggregate(Vec<ValueRef>),
    /// Constant expression (`getelementptr`, `bitcast`, ...) over other constants.
    Expr { opcode: String, operands: Vec<ValueRef> },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Constant {
    pub ty: TypeId,
    pub value: ConstValue,
}

impl Constant {
    /// Operands that are themselves values (aggregate elements, expression operands).
    pub fn operands(&self) -> &[ValueRef] {
        match &self.value {
            ConstValue::Aggregate(elems) => elems,
            ConstValue::Expr { operands, .. } => operands,
            _ => &[],
        }
    }

    /// Null pointers, zero integers and zero initializers.
    pub fn is_null_value(&self) -> bool {
        matches!(self.value, ConstValue::Null | ConstValue::ZeroInit | ConstValue::Int(0))
    }
}

/// A module-level variable. `ty` is the type of the global's address (a pointer).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GlobalVariable {
    pub name: String,
    pub ty: TypeId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub initializer: Option<ConstId>,
    #[serde(default)]
    pub is_constant: bool,
}

/// A function definition or declaration (declarations have no blocks).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Function {
    pub name: String,
    /// Type of the function's address: a pointer to a function type.
    pub ty: TypeId,
    #[serde(default)]
    pub blocks: Vec<BlockId>,
}

impl Function {
    pub fn is_declaration(&self) -> bool {
        self.blocks.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub name: String,
    pub func: FuncId,
    pub insts: Vec<InstId>,
}

/// Something that consumes a value through an operand edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum User {
    Inst(InstId),
    Const(ConstId),
}

impl User {
    pub fn as_value(self) -> ValueRef {
        match self {
            User::Inst(id) => ValueRef::Inst(id),
            User::Const(id) => ValueRef::Const(id),
        }
    }

    pub fn as_inst(self) -> Option<InstId> {
        match self {
            User::Inst(id) => Some(id),
            User::Const(_) => None,
        }
    }
}

/// A call or invoke with its statically resolved callee, if any.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSite {
    pub inst: InstId,
    pub callee: Option<FuncId>,
    pub args: Vec<ValueRef>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IrError {
    #[error("{what} {index} referenced from {from} does not exist")]
    DanglingReference { what: &'static str, index: u32, from: String },

    #[error("instruction {0} belongs to more than one block")]
    SharedInstruction(InstId),

    #[error("block {block} is listed by {listed_by} but owned by {owner}")]
    BlockOwnerMismatch { block: BlockId, listed_by: FuncId, owner: FuncId },

    #[error("function {func} has type {ty}, which is not a pointer to a function type")]
    NotAFunctionType { func: FuncId, ty: TypeId },
}

pub type IrResult<T> = Result<T, IrError>;

/// The whole analyzed program, immutable once assembled.
#[derive(Debug, Clone)]
pub struct Program {
    types: Vec<Type>,
    constants: Vec<Constant>,
    globals: Vec<GlobalVariable>,
    functions: Vec<Function>,
    blocks: Vec<BasicBlock>,
    insts: Vec<Instruction>,
    parents: Vec<BlockId>,
    users: HashMap<ValueRef, Vec<User>>,
}

impl Program {
    pub fn ty(&self, id: TypeId) -> &Type {
        &self.types[id.index()]
    }

    pub fn types(&self) -> impl Iterator<Item = (TypeId, &Type)> {
        self.types.iter().enumerate().map(|(i, t)| (TypeId(i as u32), t))
    }

    pub fn constant(&self, id: ConstId) -> &Constant {
        &self.constants[id.index()]
    }

    pub fn global(&self, id: GlobalId) -> &GlobalVariable {
        &self.globals[id.index()]
    }

    pub fn globals(&self) -> impl Iterator<Item = (GlobalId, &GlobalVariable)> {
        self.globals.iter().enumerate().map(|(i, g)| (GlobalId(i as u32), g))
    }

    pub fn function(&self, id: FuncId) -> &Function {
        &self.functions[id.index()]
    }

    /// Functions in program order.
    pub fn functions(&self) -> impl Iterator<Item = (FuncId, &Function)> {
        self.functions.iter().enumerate().map(|(i, f)| (FuncId(i as u32), f))
    }

    pub fn function_by_name(&self, name: &str) -> Option<FuncId> {
        self.functions().find(|(_, f)| f.name == name).map(|(id, _)| id)
    }

    pub fn block(&self, id: BlockId) -> &BasicBlock {
        &self.blocks[id.index()]
    }

    pub fn inst(&self, id: InstId) -> &Instruction {
        &self.insts[id.index()]
    }

    /// Block that contains an instruction.
    pub fn parent(&self, id: InstId) -> BlockId {
        self.parents[id.index()]
    }

    /// Instructions of a function, block by block, in order.
    pub fn instructions(&self, func: FuncId) -> impl Iterator<Item = InstId> + '_ {
        self.function(func).blocks.iter().flat_map(move |b| self.block(*b).insts.iter().copied())
    }

    /// Every instruction of every function, in program order.
    pub fn all_instructions(&self) -> impl Iterator<Item = InstId> + '_ {
        self.functions().flat_map(move |(id, _)| self.instructions(id))
    }

    /// Control-flow successors of a block, taken from its terminator.
    pub fn successors(&self, block: BlockId) -> Vec<BlockId> {
        self.block(block).insts.last().map(|i| self.inst(*i).successors()).unwrap_or_default()
    }

    /// The function type behind a function's address type.
    pub fn function_type(&self, func: FuncId) -> &Type {
        let ptr = self.ty(self.function(func).ty);
        match ptr.pointee() {
            Some(inner) => self.ty(inner),
            None => ptr,
        }
    }

    /// Parameter types of a function, empty when the type is malformed.
    pub fn param_types(&self, func: FuncId) -> Vec<TypeId> {
        match self.function_type(func) {
            Type::Function { params, .. } => params.clone(),
            _ => Vec::new(),
        }
    }

    /// Look up a named aggregate or opaque type.
    pub fn type_by_name(&self, name: &str) -> Option<TypeId> {
        self.types().find(|(_, t)| t.name() == Some(name)).map(|(id, _)| id)
    }

    /// Static type of any value.
    pub fn value_type(&self, value: ValueRef) -> TypeId {
        match value {
            ValueRef::Inst(id) => self.inst(id).ty,
            ValueRef::Const(id) => self.constant(id).ty,
            ValueRef::Global(id) => self.global(id).ty,
            ValueRef::Func(id) => self.function(id).ty,
            ValueRef::Arg { func, index } => {
                let params = self.param_types(func);
                params.get(index as usize).copied().unwrap_or(self.function(func).ty)
            }
        }
    }

    /// Consumers of a value, in program order (instructions first, then constants).
    pub fn users(&self, value: ValueRef) -> &[User] {
        self.users.get(&value).map(Vec::as_slice).unwrap_or(&[])
    }

    /// The function a call or invoke statically targets; `None` for indirect calls.
    pub fn called_function(&self, inst: InstId) -> Option<FuncId> {
        self.inst(inst).callee().and_then(ValueRef::as_func)
    }

    pub fn call_site(&self, inst: InstId) -> Option<CallSite> {
        let i = self.inst(inst);
        let args = i.call_args()?.to_vec();
        Some(CallSite { inst, callee: self.called_function(inst), args })
    }

    /// Integer payload of a constant operand.
    pub fn const_int(&self, value: ValueRef) -> Option<i64> {
        match &self.constant(value.as_const()?).value {
            ConstValue::Int(v) => Some(*v),
            _ => None,
        }
    }

    /// True for integer constants (`ConstantInt` in compiler terms).
    pub fn is_const_int(&self, value: ValueRef) -> bool {
        self.const_int(value).is_some()
    }

    fn assemble(
        types: Vec<Type>,
        constants: Vec<Constant>,
        globals: Vec<GlobalVariable>,
        functions: Vec<Function>,
        blocks: Vec<BasicBlock>,
        insts: Vec<Instruction>,
    ) -> IrResult<Self> {
        let mut program = Program {
            types,
            constants,
            globals,
            functions,
            blocks,
            insts,
            parents: Vec::new(),
            users: HashMap::new(),
        };
        program.validate()?;
        program.index();
        Ok(program)
    }

    fn validate(&mut self) -> IrResult<()> {
        let check = |what: &'static str, index: u32, len: usize, from: &dyn fmt::Display| {
            if (index as usize) < len {
                Ok(())
            } else {
                Err(IrError::DanglingReference { what, index, from: from.to_string() })
            }
        };

        for (i, ty) in self.types.iter().enumerate() {
            for sub in ty.subtypes() {
                check("type", sub.0, self.types.len(), &TypeId(i as u32))?;
            }
        }
        for (i, c) in self.constants.iter().enumerate() {
            let from = ConstId(i as u32);
            check("type", c.ty.0, self.types.len(), &from)?;
            for op in c.operands() {
                self.check_value(*op, &from)?;
            }
        }
        for (i, g) in self.globals.iter().enumerate() {
            let from = GlobalId(i as u32);
            check("type", g.ty.0, self.types.len(), &from)?;
            if let Some(init) = g.initializer {
                check("constant", init.0, self.constants.len(), &from)?;
            }
        }

        let mut parents: Vec<Option<BlockId>> = vec![None; self.insts.len()];
        for (i, f) in self.functions.iter().enumerate() {
            let fid = FuncId(i as u32);
            check("type", f.ty.0, self.types.len(), &fid)?;
            let is_fn = match self.types[f.ty.index()].pointee() {
                Some(inner) => matches!(self.types.get(inner.index()), Some(Type::Function { .. })),
                None => false,
            };
            if !is_fn {
                return Err(IrError::NotAFunctionType { func: fid, ty: f.ty });
            }
            for b in &f.blocks {
                check("block", b.0, self.blocks.len(), &fid)?;
                let owner = self.blocks[b.index()].func;
                if owner != fid {
                    return Err(IrError::BlockOwnerMismatch { block: *b, listed_by: fid, owner });
                }
                for inst in &self.blocks[b.index()].insts {
                    check("instruction", inst.0, self.insts.len(), b)?;
                    if parents[inst.index()].replace(*b).is_some() {
                        return Err(IrError::SharedInstruction(*inst));
                    }
                }
            }
        }
        for (i, inst) in self.insts.iter().enumerate() {
            let from = InstId(i as u32);
            check("type", inst.ty.0, self.types.len(), &from)?;
            if let InstKind::Alloca { allocated } = &inst.kind {
                check("type", allocated.0, self.types.len(), &from)?;
            }
            for op in inst.operands() {
                self.check_value(op, &from)?;
            }
            for succ in inst.successors() {
                check("block", succ.0, self.blocks.len(), &from)?;
            }
        }

        // Instructions not placed in any block are unreachable from the
        // program; park them on block 0 so `parent` stays total.
        self.parents = parents.into_iter().map(|p| p.unwrap_or(BlockId(0))).collect();
        Ok(())
    }

    fn check_value(&self, value: ValueRef, from: &dyn fmt::Display) -> IrResult<()> {
        let (what, index, len) = match value {
            ValueRef::Inst(id) => ("instruction", id.0, self.insts.len()),
            ValueRef::Const(id) => ("constant", id.0, self.constants.len()),
            ValueRef::Global(id) => ("global", id.0, self.globals.len()),
            ValueRef::Func(id) | ValueRef::Arg { func: id, .. } => {
                ("function", id.0, self.functions.len())
            }
        };
        if (index as usize) < len {
            Ok(())
        } else {
            Err(IrError::DanglingReference { what, index, from: from.to_string() })
        }
    }

    fn index(&mut self) {
        let mut users: HashMap<ValueRef, Vec<User>> = HashMap::new();
        let order: Vec<InstId> = self.all_instructions().collect();
        for id in order {
            for op in self.inst(id).operands() {
                let list = users.entry(op).or_default();
                if list.last() != Some(&User::Inst(id)) {
                    list.push(User::Inst(id));
                }
            }
        }
        for (i, c) in self.constants.iter().enumerate() {
            let user = User::Const(ConstId(i as u32));
            for op in c.operands() {
                let list = users.entry(*op).or_default();
                if list.last() != Some(&user) {
                    list.push(user);
                }
            }
        }
        self.users = users;
    }
}
