use serde::{Deserialize, Serialize};

use super::{
    BasicBlock, Constant, FuncId, Function, GlobalVariable, Instruction, IrError, IrResult,
    Program, Type,
};
use crate::loops::{LoopForest, LoopTable};

/// Loop facts for one function as written by the exporter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionLoops {
    pub func: FuncId,
    #[serde(flatten)]
    pub forest: LoopForest,
}

/// Serialized form of a program and its loop facts.
///
/// Every cross reference is an arena index; [`Program::from_dump`] checks them
/// all before any analysis sees the data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProgramDump {
    #[serde(default)]
    pub types: Vec<Type>,
    #[serde(default)]
    pub constants: Vec<Constant>,
    #[serde(default)]
    pub globals: Vec<GlobalVariable>,
    #[serde(default)]
    pub functions: Vec<Function>,
    #[serde(default)]
    pub blocks: Vec<BasicBlock>,
    #[serde(default)]
    pub insts: Vec<Instruction>,
    #[serde(default)]
    pub loops: Vec<FunctionLoops>,
}

impl Program {
    /// Validate a dump and build the program plus its loop table.
    pub fn from_dump(dump: ProgramDump) -> IrResult<(Program, LoopTable)> {
        let ProgramDump { types, constants, globals, functions, blocks, insts, loops } = dump;
        let program = Program::assemble(types, constants, globals, functions, blocks, insts)?;

        let mut table = LoopTable::new();
        for entry in loops {
            let owner = format!("loops of {}", entry.func);
            if entry.func.index() >= program.functions.len() {
                return Err(IrError::DanglingReference {
                    what: "function",
                    index: entry.func.0,
                    from: owner,
                });
            }
            for (i, lp) in entry.forest.loops.iter().enumerate() {
                for block in std::iter::once(&lp.header).chain(lp.blocks.iter()) {
                    if block.index() >= program.blocks.len() {
                        return Err(IrError::DanglingReference {
                            what: "block",
                            index: block.0,
                            from: owner.clone(),
                        });
                    }
                }
                if let Some(parent) = lp.parent {
                    if parent >= entry.forest.loops.len() || parent == i {
                        return Err(IrError::DanglingReference {
                            what: "loop",
                            index: parent as u32,
                            from: owner.clone(),
                        });
                    }
                }
            }
            table.insert(entry.func, entry.forest);
        }
        Ok((program, table))
    }

    /// Serialize back to the dump form, attaching the given loop facts.
    pub fn to_dump(&self, loops: Vec<FunctionLoops>) -> ProgramDump {
        ProgramDump {
            types: self.types.clone(),
            constants: self.constants.clone(),
            globals: self.globals.clone(),
            functions: self.functions.clone(),
            blocks: self.blocks.clone(),
            insts: self.insts.clone(),
            loops,
        }
    }
}
