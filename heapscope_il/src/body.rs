use crate::error::HeapscopeIlError;
use crate::ids::{MethodId, Temp};
use crate::instruction::Instruction;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct BlockId(pub u32);

/// A position inside a method body. `index` ranges over `0..=len` of the block: the state
/// at `index` is the state before instruction `index` and after instruction `index - 1`.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct ProgramPoint {
    pub block: BlockId,
    pub index: usize,
}

impl ProgramPoint {
    pub fn new(block: BlockId, index: usize) -> Self {
        Self { block, index }
    }

    pub fn block_entry(block: BlockId) -> Self {
        Self { block, index: 0 }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BasicBlock {
    pub instructions: Vec<Instruction>,
}

/// What has to hold for control to flow along an edge.
#[derive(Debug, Clone, Copy, Default, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum EdgeGuard {
    #[default]
    Always,
    /// The edge is taken when `condition` is non-zero (`truth`) or zero (`!truth`)
    Assume { condition: Temp, truth: bool },
}

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    pub from: BlockId,
    pub to: BlockId,
    #[serde(default)]
    pub guard: EdgeGuard,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodBody {
    pub method: MethodId,
    #[serde(default)]
    pub entry: BlockId,
    pub blocks: Vec<BasicBlock>,
    #[serde(default)]
    pub edges: Vec<Edge>,
}

impl Default for BlockId {
    fn default() -> Self {
        BlockId(0)
    }
}

impl Display for BlockId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "b{}", self.0)
    }
}

impl Display for ProgramPoint {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.block, self.index)
    }
}

impl MethodBody {
    pub fn block(&self, id: BlockId) -> Option<&BasicBlock> {
        self.blocks.get(id.0 as usize)
    }

    pub fn block_ids(&self) -> impl Iterator<Item = BlockId> + '_ {
        (0..self.blocks.len()).map(|i| BlockId(i as u32))
    }

    pub fn successors(&self, block: BlockId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.from == block)
    }

    pub fn predecessors(&self, block: BlockId) -> impl Iterator<Item = &Edge> {
        self.edges.iter().filter(move |e| e.to == block)
    }

    pub fn instruction(&self, pc: ProgramPoint) -> Option<&Instruction> {
        self.block(pc.block)?.instructions.get(pc.index)
    }

    /// Check that the entry and every edge name existing blocks.
    pub fn validate(&self) -> Result<(), HeapscopeIlError> {
        if self.blocks.is_empty() {
            return Err(HeapscopeIlError::EmptyBody(self.method));
        }
        let dangling = std::iter::once(self.entry)
            .chain(self.edges.iter().flat_map(|e| [e.from, e.to]))
            .find(|b| self.block(*b).is_none());
        match dangling {
            Some(block) => Err(HeapscopeIlError::DanglingBlock {
                method: self.method,
                block,
            }),
            None => Ok(()),
        }
    }
}
