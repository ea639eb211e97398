use crate::analysis::cfg::MethodCfg;
use crate::analysis::cpa::ConfigurableProgramAnalysis;
use crate::analysis::cpa::state::MergeOutcome;
use crate::analysis::heap::decoder::AnalysisDecoder;
use crate::analysis::heap::domain::{Domain, FrozenDomain};
use crate::analysis::heap::egraph::MergeInfo;
use crate::analysis::heap::value::SymbolicValue;
use crate::context::HeapContext;
use crate::error::HeapError;
use crate::options::HeapAnalysisOptions;
use heapscope_il::{
    BlockId, ContractProvider, MetadataProvider, MethodBody, MethodId, Program, ProgramPoint,
};
#[cfg(feature = "rayon")]
use rayon::iter::{IntoParallelRefIterator, ParallelIterator};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info};

/// Where a block stands with respect to joins.
#[derive(Debug, Clone, Default)]
pub enum JoinPoint {
    /// No state has reached the block
    #[default]
    Unvisited,
    /// A state has reached the block, but nothing has been joined into it
    PendingJoin,
    /// The block's state is the result of a join
    Resolved {
        info: MergeInfo,
        /// The edge whose state was the right operand of the join
        incoming: usize,
        /// That edge's state at the time of the join
        operand: FrozenDomain,
    },
}

/// Maps values of one state to the values standing for them in another.
pub type Renaming = HashMap<SymbolicValue, Vec<SymbolicValue>>;

/// The heap analysis of one method body.
#[derive(Debug)]
pub struct HeapAnalysis<'a> {
    body: &'a MethodBody,
    cfg: MethodCfg,
    decoder: AnalysisDecoder,
    states: HashMap<ProgramPoint, FrozenDomain>,
    edge_states: HashMap<usize, FrozenDomain>,
    join_points: HashMap<BlockId, JoinPoint>,
    join_counts: HashMap<BlockId, u32>,
}

impl<'a> HeapAnalysis<'a> {
    pub fn new(ctx: Arc<HeapContext>, body: &'a MethodBody) -> Result<Self, HeapError> {
        body.validate()?;
        Ok(Self {
            body,
            cfg: MethodCfg::new(body),
            decoder: AnalysisDecoder::new(ctx)?,
            states: HashMap::new(),
            edge_states: HashMap::new(),
            join_points: HashMap::new(),
            join_counts: HashMap::new(),
        })
    }

    /// Compute the fixpoint and publish the state of every program point.
    pub fn run(mut self) -> Result<HeapAnalysisResult, HeapError> {
        let method = self.body.method;
        debug!(%method, blocks = self.body.blocks.len(), "starting heap analysis");
        let entry = self.decoder.entry_state()?.freeze();
        self.decoder.set_entry(entry.clone());
        let start = self.cfg.entry();
        let blocks = self.run_cpa(start, entry.thaw())?;
        info!(%method, reached = blocks.len(), "heap analysis finished");
        let block_lengths = self
            .body
            .block_ids()
            .filter_map(|b| self.body.block(b).map(|block| (b, block.instructions.len())))
            .collect();
        Ok(HeapAnalysisResult {
            method,
            cfg: self.cfg,
            entry,
            states: self.states,
            block_lengths,
            edge_states: self.edge_states,
            join_points: self.join_points,
        })
    }
}

impl ConfigurableProgramAnalysis for HeapAnalysis<'_> {
    type State = Domain;
    type Location = BlockId;
    type Edge = usize;

    fn successors(&self, location: BlockId) -> Vec<(usize, BlockId)> {
        self.cfg.successors(location)
    }

    fn transfer(&mut self, location: BlockId, state: &Domain) -> Result<Domain, HeapError> {
        let mut d = state.clone();
        let Some(block) = self.body.block(location) else {
            return Ok(d);
        };
        for (index, instruction) in block.instructions.iter().enumerate() {
            let pc = ProgramPoint::new(location, index);
            self.states.insert(pc, d.clone().freeze());
            self.decoder.transfer(pc, instruction, &mut d)?;
        }
        let exit = ProgramPoint::new(location, block.instructions.len());
        self.states.insert(exit, d.clone().freeze());
        Ok(d)
    }

    fn convert_edge(&mut self, edge: usize, state: &Domain) -> Result<Domain, HeapError> {
        let mut d = state.clone();
        if let Some(guard) = self.cfg.guard(edge) {
            self.decoder.apply_guard(guard, &mut d);
        }
        self.edge_states.insert(edge, d.clone().freeze());
        Ok(d)
    }

    fn merge(
        &mut self,
        location: BlockId,
        reached: &mut Domain,
        incoming: &Domain,
        edge: usize,
    ) -> Result<MergeOutcome, HeapError> {
        let count = self.join_counts.entry(location).or_default();
        *count += 1;
        let options = &self.decoder.ctx().options;
        let widen = self.cfg.is_loop_head(location) && *count > options.widen_after;
        let (joined, weaker, info) = reached.join(incoming, widen)?;
        debug!(block = %location, edge, widen, weaker, "join");
        if !weaker {
            return Ok(MergeOutcome::NoOp);
        }
        *reached = joined;
        if let Some(operand) = self.edge_states.get(&edge).cloned() {
            self.join_points.insert(
                location,
                JoinPoint::Resolved {
                    info,
                    incoming: edge,
                    operand,
                },
            );
        }
        Ok(MergeOutcome::Merged)
    }

    fn reached(&mut self, location: BlockId, _edge: usize, _state: &Domain) {
        if self.cfg.is_join_point(location) {
            self.join_points.insert(location, JoinPoint::PendingJoin);
        }
    }

    fn max_iterations(&self) -> usize {
        self.decoder.ctx().options.max_iterations
    }
}

/// The published states of one analyzed method.
#[derive(Debug, Clone)]
pub struct HeapAnalysisResult {
    method: MethodId,
    cfg: MethodCfg,
    entry: FrozenDomain,
    states: HashMap<ProgramPoint, FrozenDomain>,
    block_lengths: HashMap<BlockId, usize>,
    edge_states: HashMap<usize, FrozenDomain>,
    join_points: HashMap<BlockId, JoinPoint>,
}

impl HeapAnalysisResult {
    pub fn method(&self) -> MethodId {
        self.method
    }

    pub fn cfg(&self) -> &MethodCfg {
        &self.cfg
    }

    /// The synthesized state on method entry.
    pub fn entry_state(&self) -> &FrozenDomain {
        &self.entry
    }

    /// The state before the instruction at `pc`.
    pub fn pre_state(&self, pc: ProgramPoint) -> Option<&FrozenDomain> {
        self.states.get(&pc)
    }

    /// The state after the instruction at `pc`.
    pub fn post_state(&self, pc: ProgramPoint) -> Option<&FrozenDomain> {
        self.states.get(&ProgramPoint::new(pc.block, pc.index + 1))
    }

    pub fn block_entry(&self, block: BlockId) -> Option<&FrozenDomain> {
        self.states.get(&ProgramPoint::block_entry(block))
    }

    pub fn block_exit(&self, block: BlockId) -> Option<&FrozenDomain> {
        let len = self.block_lengths.get(&block)?;
        self.states.get(&ProgramPoint::new(block, *len))
    }

    /// The state flowing along an edge, after its guard.
    pub fn edge_state(&self, edge: usize) -> Option<&FrozenDomain> {
        self.edge_states.get(&edge)
    }

    pub fn join_point(&self, block: BlockId) -> &JoinPoint {
        static UNVISITED: JoinPoint = JoinPoint::Unvisited;
        self.join_points.get(&block).unwrap_or(&UNVISITED)
    }

    /// How the values flowing along the edge `from -> to` are named in the entry state of
    /// `to`.
    ///
    /// Edges into blocks that were never joined keep their values. For the edge that
    /// supplied the last join's right operand, the recorded merge info is used; every other
    /// edge is related to the joined state by embedding.
    pub fn edge_renaming(&self, from: BlockId, to: BlockId) -> Option<Renaming> {
        self.edge_renaming_along(self.cfg.edge_between(from, to)?)
    }

    /// [`Self::edge_renaming`] for an edge given by index, which also covers several
    /// edges between the same pair of blocks.
    pub fn edge_renaming_along(&self, edge: usize) -> Option<Renaming> {
        let to = self.cfg.target(edge)?;
        let source = self.edge_states.get(&edge)?;
        let target = self.block_entry(to)?;
        if source.ptr_eq(target) || source.shares_graph_with(target) {
            return Some(
                source
                    .egraph()
                    .values()
                    .map(|v| (v, vec![v]))
                    .collect(),
            );
        }
        if let JoinPoint::Resolved {
            info,
            incoming,
            operand,
        } = self.join_point(to)
            && *incoming == edge
            && operand.ptr_eq(source)
        {
            return Some(info.right_forward().clone());
        }
        Some(
            source
                .less_equal(target)
                .map(|e| e.forward)
                .unwrap_or_default(),
        )
    }
}

/// Run the heap analysis of one method body.
pub fn analyze_method(
    ctx: Arc<HeapContext>,
    body: &MethodBody,
) -> Result<HeapAnalysisResult, HeapError> {
    HeapAnalysis::new(ctx, body)?.run()
}

/// Analyze every method body of `program`. Methods are independent: each gets its own value
/// counter, and a failing method does not affect the others.
pub fn analyze_program(
    program: &Program,
    options: &HeapAnalysisOptions,
) -> Vec<(MethodId, Result<HeapAnalysisResult, HeapError>)> {
    let metadata: Arc<dyn MetadataProvider> = Arc::new(program.metadata.clone());
    let contracts: Arc<dyn ContractProvider> = Arc::new(program.contracts.clone());
    let base = HeapContext::new(metadata, contracts, MethodId(0)).with_options(options.clone());
    let analyze = |body: &MethodBody| {
        let ctx = Arc::new(base.for_method(body.method));
        (body.method, analyze_method(ctx, body))
    };
    #[cfg(feature = "rayon")]
    let results = program.bodies.par_iter().map(analyze).collect();
    #[cfg(not(feature = "rayon"))]
    let results = program.bodies.iter().map(analyze).collect();
    results
}
