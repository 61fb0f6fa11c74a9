//! Loop facts consumed by the detectors.
//!
//! Loop analysis itself happens outside this crate. The exporter supplies,
//! per function, the natural loops it found: header, member blocks, nesting
//! depth, and the enclosing loop.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::ir::{BlockId, FuncId};

/// One natural loop.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Loop {
    pub header: BlockId,
    /// Member blocks, including the header and the blocks of nested loops.
    pub blocks: Vec<BlockId>,
    /// 1 for an outermost loop.
    pub depth: u32,
    /// Index of the enclosing loop in the same forest.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<usize>,
}

impl Loop {
    pub fn contains(&self, block: BlockId) -> bool {
        self.blocks.contains(&block)
    }
}

/// All loops of one function.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopForest {
    pub loops: Vec<Loop>,
}

impl LoopForest {
    pub fn new(loops: Vec<Loop>) -> Self {
        Self { loops }
    }

    pub fn get(&self, index: usize) -> Option<&Loop> {
        self.loops.get(index)
    }

    /// Innermost loop containing `block`.
    pub fn loop_for(&self, block: BlockId) -> Option<&Loop> {
        self.loops.iter().filter(|l| l.contains(block)).max_by_key(|l| l.depth)
    }

    /// Nesting depth of `block`; 0 outside any loop.
    pub fn loop_depth(&self, block: BlockId) -> u32 {
        self.loop_for(block).map(|l| l.depth).unwrap_or(0)
    }

    pub fn is_loop_header(&self, block: BlockId) -> bool {
        self.loops.iter().any(|l| l.header == block)
    }

    /// Inside a loop, counting headers of loops reported at depth 0.
    pub fn in_loop(&self, block: BlockId) -> bool {
        self.loop_depth(block) > 0 || self.is_loop_header(block)
    }

    pub fn is_empty(&self) -> bool {
        self.loops.is_empty()
    }
}

/// Source of per-function loop facts.
pub trait LoopProvider {
    fn loops_for(&self, func: FuncId) -> &LoopForest;
}

/// Loop facts keyed by function; functions without an entry have no loops.
#[derive(Debug, Clone, Default)]
pub struct LoopTable {
    forests: HashMap<FuncId, LoopForest>,
    empty: LoopForest,
}

impl LoopTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, func: FuncId, forest: LoopForest) -> &mut Self {
        self.forests.insert(func, forest);
        self
    }

    pub fn len(&self) -> usize {
        self.forests.len()
    }

    pub fn is_empty(&self) -> bool {
        self.forests.is_empty()
    }
}

impl LoopProvider for LoopTable {
    fn loops_for(&self, func: FuncId) -> &LoopForest {
        self.forests.get(&func).unwrap_or(&self.empty)
    }
}
