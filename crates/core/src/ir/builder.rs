//! Programmatic construction of programs.
//!
//! Used by exporters that already hold the IR in memory and by tests that
//! need small, readable fixtures. Instructions are appended to blocks in call
//! order and pick up the builder's current debug location.

use std::collections::HashMap;

use super::{
    BasicBlock, BlockId, ConstId, ConstValue, Constant, DebugLoc, FuncId, Function,
    FunctionLoops, GlobalId, GlobalVariable, InstId, InstKind, Instruction, IntPredicate,
    IrResult, Program, ProgramDump, Type, TypeId, ValueRef,
};
use crate::loops::{Loop, LoopForest, LoopTable};

#[derive(Debug, Default)]
pub struct ProgramBuilder {
    dump: ProgramDump,
    interned: HashMap<Type, TypeId>,
    loc: Option<DebugLoc>,
}

impl ProgramBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    // ---- types -------------------------------------------------------------

    /// Intern a type; structurally equal types share one id.
    pub fn ty(&mut self, ty: Type) -> TypeId {
        if let Some(id) = self.interned.get(&ty) {
            return *id;
        }
        let id = TypeId(self.dump.types.len() as u32);
        self.dump.types.push(ty.clone());
        self.interned.insert(ty, id);
        id
    }

    pub fn void(&mut self) -> TypeId {
        self.ty(Type::Void)
    }

    pub fn int(&mut self, bits: u32) -> TypeId {
        self.ty(Type::Integer { bits })
    }

    pub fn ptr(&mut self, pointee: TypeId) -> TypeId {
        self.ty(Type::Pointer { pointee })
    }

    pub fn array(&mut self, element: TypeId, len: u64) -> TypeId {
        self.ty(Type::Array { element, len })
    }

    pub fn named_struct(&mut self, name: &str, fields: Vec<TypeId>) -> TypeId {
        self.ty(Type::Struct { name: Some(name.to_string()), fields, packed: false })
    }

    pub fn anon_struct(&mut self, fields: Vec<TypeId>) -> TypeId {
        self.ty(Type::Struct { name: None, fields, packed: false })
    }

    /// A fresh opaque type. Unnamed opaque types are never shared.
    pub fn opaque(&mut self, name: Option<&str>) -> TypeId {
        let ty = Type::Opaque { name: name.map(str::to_string) };
        match name {
            Some(_) => self.ty(ty),
            None => {
                let id = TypeId(self.dump.types.len() as u32);
                self.dump.types.push(ty);
                id
            }
        }
    }

    /// Declare a named struct whose body is filled in later, for recursive types.
    pub fn declare_struct(&mut self, name: &str) -> TypeId {
        let id = TypeId(self.dump.types.len() as u32);
        self.dump.types.push(Type::Struct {
            name: Some(name.to_string()),
            fields: Vec::new(),
            packed: false,
        });
        id
    }

    pub fn set_struct_body(&mut self, id: TypeId, body: Vec<TypeId>) {
        if let Some(Type::Struct { fields, .. }) = self.dump.types.get_mut(id.index()) {
            *fields = body;
        }
    }

    pub fn fn_type(&mut self, ret: TypeId, params: Vec<TypeId>, var_arg: bool) -> TypeId {
        self.ty(Type::Function { ret, params, var_arg })
    }

    // ---- constants and globals ---------------------------------------------

    pub fn constant(&mut self, ty: TypeId, value: ConstValue) -> ConstId {
        let id = ConstId(self.dump.constants.len() as u32);
        self.dump.constants.push(Constant { ty, value });
        id
    }

    pub fn const_int(&mut self, bits: u32, value: i64) -> ConstId {
        let ty = self.int(bits);
        self.constant(ty, ConstValue::Int(value))
    }

    pub fn const_null(&mut self, ptr_ty: TypeId) -> ConstId {
        self.constant(ptr_ty, ConstValue::Null)
    }

    /// A NUL-terminated `[N x i8]` string constant.
    pub fn const_cstring(&mut self, text: &str) -> ConstId {
        let mut value = text.to_string();
        value.push('\0');
        let i8_ty = self.int(8);
        let ty = self.array(i8_ty, value.len() as u64);
        self.constant(ty, ConstValue::String(value))
    }

    pub fn const_expr(&mut self, ty: TypeId, opcode: &str, operands: Vec<ValueRef>) -> ConstId {
        self.constant(ty, ConstValue::Expr { opcode: opcode.to_string(), operands })
    }

    /// A global holding a value of `value_ty`; the global itself is a pointer.
    pub fn global(
        &mut self,
        name: &str,
        value_ty: TypeId,
        initializer: Option<ConstId>,
    ) -> GlobalId {
        let ty = self.ptr(value_ty);
        let id = GlobalId(self.dump.globals.len() as u32);
        self.dump.globals.push(GlobalVariable {
            name: name.to_string(),
            ty,
            initializer,
            is_constant: false,
        });
        id
    }

    /// A private constant string global, as front ends emit for literals.
    pub fn string_global(&mut self, name: &str, text: &str) -> GlobalId {
        let init = self.const_cstring(text);
        let value_ty = self.dump.constants[init.index()].ty;
        let id = self.global(name, value_ty, Some(init));
        self.dump.globals[id.index()].is_constant = true;
        id
    }

    /// `getelementptr (@global, 0, 0)`: address of the first character.
    pub fn string_ptr(&mut self, global: GlobalId) -> ConstId {
        let i8_ty = self.int(8);
        let ty = self.ptr(i8_ty);
        let zero = self.const_int(64, 0);
        self.const_expr(ty, "getelementptr", vec![global.into(), zero.into(), zero.into()])
    }

    // ---- functions and blocks ----------------------------------------------

    /// Add a function. It stays a declaration until a block is added.
    pub fn function(&mut self, name: &str, ret: TypeId, params: Vec<TypeId>) -> FuncId {
        let fn_ty = self.fn_type(ret, params, false);
        let ty = self.ptr(fn_ty);
        let id = FuncId(self.dump.functions.len() as u32);
        self.dump.functions.push(Function { name: name.to_string(), ty, blocks: Vec::new() });
        id
    }

    pub fn arg(&self, func: FuncId, index: u32) -> ValueRef {
        ValueRef::Arg { func, index }
    }

    pub fn block(&mut self, func: FuncId, name: &str) -> BlockId {
        let id = BlockId(self.dump.blocks.len() as u32);
        self.dump.blocks.push(BasicBlock { name: name.to_string(), func, insts: Vec::new() });
        if let Some(f) = self.dump.functions.get_mut(func.index()) {
            f.blocks.push(id);
        }
        id
    }

    // ---- debug locations ---------------------------------------------------

    /// Location attached to every instruction added from now on.
    pub fn set_loc(&mut self, loc: Option<DebugLoc>) -> &mut Self {
        self.loc = loc;
        self
    }

    /// Shorthand for `set_loc` with a location in `directory/file`.
    pub fn at(&mut self, directory: &str, file: &str, line: u32) -> &mut Self {
        self.set_loc(Some(DebugLoc::new(directory, file, line)))
    }

    // ---- instructions ------------------------------------------------------

    /// Append an instruction of the given result type.
    pub fn push(&mut self, block: BlockId, ty: TypeId, kind: InstKind) -> InstId {
        let id = InstId(self.dump.insts.len() as u32);
        self.dump.insts.push(Instruction { ty, kind, name: None, loc: self.loc.clone() });
        if let Some(b) = self.dump.blocks.get_mut(block.index()) {
            b.insts.push(id);
        }
        id
    }

    pub fn name_inst(&mut self, inst: InstId, name: &str) {
        if let Some(i) = self.dump.insts.get_mut(inst.index()) {
            i.name = Some(name.to_string());
        }
    }

    pub fn alloca(&mut self, block: BlockId, allocated: TypeId) -> InstId {
        let ty = self.ptr(allocated);
        self.push(block, ty, InstKind::Alloca { allocated })
    }

    pub fn load(&mut self, block: BlockId, ptr: impl Into<ValueRef>) -> InstId {
        let ptr = ptr.into();
        let pointee = self.dump.types.get(self.value_ty(ptr).index()).and_then(Type::pointee);
        let ty = match pointee {
            Some(inner) => inner,
            None => self.int(8),
        };
        self.push(block, ty, InstKind::Load { ptr })
    }

    pub fn store(
        &mut self,
        block: BlockId,
        value: impl Into<ValueRef>,
        ptr: impl Into<ValueRef>,
    ) -> InstId {
        let void = self.void();
        self.push(block, void, InstKind::Store { value: value.into(), ptr: ptr.into() })
    }

    /// GEP with an explicit result type.
    pub fn gep(
        &mut self,
        block: BlockId,
        result_ty: TypeId,
        base: impl Into<ValueRef>,
        indices: Vec<ValueRef>,
    ) -> InstId {
        self.push(block, result_ty, InstKind::GetElementPtr { base: base.into(), indices })
    }

    pub fn call(&mut self, block: BlockId, callee: FuncId, args: Vec<ValueRef>) -> InstId {
        let ty = self.return_type(callee);
        self.push(block, ty, InstKind::Call { callee: callee.into(), args })
    }

    /// Call through a pointer value; the callee is not statically known.
    pub fn call_indirect(
        &mut self,
        block: BlockId,
        ret: TypeId,
        callee: impl Into<ValueRef>,
        args: Vec<ValueRef>,
    ) -> InstId {
        self.push(block, ret, InstKind::Call { callee: callee.into(), args })
    }

    pub fn invoke(
        &mut self,
        block: BlockId,
        callee: FuncId,
        args: Vec<ValueRef>,
        normal: BlockId,
        unwind: BlockId,
    ) -> InstId {
        let ty = self.return_type(callee);
        self.push(block, ty, InstKind::Invoke { callee: callee.into(), args, normal, unwind })
    }

    pub fn icmp(
        &mut self,
        block: BlockId,
        predicate: IntPredicate,
        lhs: impl Into<ValueRef>,
        rhs: impl Into<ValueRef>,
    ) -> InstId {
        let ty = self.int(1);
        self.push(block, ty, InstKind::ICmp { predicate, lhs: lhs.into(), rhs: rhs.into() })
    }

    pub fn br(&mut self, block: BlockId, dest: BlockId) -> InstId {
        let void = self.void();
        self.push(block, void, InstKind::Br { dest })
    }

    pub fn cond_br(
        &mut self,
        block: BlockId,
        cond: impl Into<ValueRef>,
        then_dest: BlockId,
        else_dest: BlockId,
    ) -> InstId {
        let void = self.void();
        self.push(block, void, InstKind::CondBr { cond: cond.into(), then_dest, else_dest })
    }

    pub fn ret(&mut self, block: BlockId, value: Option<ValueRef>) -> InstId {
        let void = self.void();
        self.push(block, void, InstKind::Ret { value })
    }

    // ---- loops -------------------------------------------------------------

    /// Record a loop of `func`; returns its index in the function's forest.
    pub fn add_loop(
        &mut self,
        func: FuncId,
        header: BlockId,
        blocks: Vec<BlockId>,
        depth: u32,
        parent: Option<usize>,
    ) -> usize {
        let lp = Loop { header, blocks, depth, parent };
        if let Some(entry) = self.dump.loops.iter_mut().find(|e| e.func == func) {
            entry.forest.loops.push(lp);
            return entry.forest.loops.len() - 1;
        }
        self.dump.loops.push(FunctionLoops { func, forest: LoopForest::new(vec![lp]) });
        0
    }

    // ---- finish ------------------------------------------------------------

    pub fn into_dump(self) -> ProgramDump {
        self.dump
    }

    pub fn finish(self) -> IrResult<(Program, LoopTable)> {
        Program::from_dump(self.dump)
    }

    fn return_type(&mut self, func: FuncId) -> TypeId {
        let ret = self
            .dump
            .functions
            .get(func.index())
            .and_then(|f| self.dump.types.get(f.ty.index()))
            .and_then(Type::pointee)
            .and_then(|inner| match self.dump.types.get(inner.index()) {
                Some(Type::Function { ret, .. }) => Some(*ret),
                _ => None,
            });
        match ret {
            Some(ret) => ret,
            None => self.void(),
        }
    }

    fn value_ty(&self, value: ValueRef) -> TypeId {
        let fallback = TypeId(0);
        match value {
            ValueRef::Inst(id) => self.dump.insts.get(id.index()).map(|i| i.ty),
            ValueRef::Const(id) => self.dump.constants.get(id.index()).map(|c| c.ty),
            ValueRef::Global(id) => self.dump.globals.get(id.index()).map(|g| g.ty),
            ValueRef::Func(id) => self.dump.functions.get(id.index()).map(|f| f.ty),
            ValueRef::Arg { func, index } => self
                .dump
                .functions
                .get(func.index())
                .and_then(|f| self.dump.types.get(f.ty.index()))
                .and_then(Type::pointee)
                .and_then(|inner| match self.dump.types.get(inner.index()) {
                    Some(Type::Function { params, .. }) => params.get(index as usize).copied(),
                    _ => None,
                }),
        }
        .unwrap_or(fallback)
    }
}
