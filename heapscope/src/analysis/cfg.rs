use heapscope_il::{BlockId, EdgeGuard, MethodBody};
use petgraph::Direction;
use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::{Control, DfsEvent, EdgeRef, depth_first_search};
use std::collections::{HashMap, HashSet};

/// The control-flow graph of a method body.
///
/// Nodes are blocks; each edge carries the index of the [`heapscope_il::Edge`] it was built
/// from, so guards and per-edge results can be looked up by that index.
#[derive(Debug, Clone)]
pub struct MethodCfg {
    graph: DiGraph<BlockId, usize>,
    nodes: HashMap<BlockId, NodeIndex>,
    guards: Vec<EdgeGuard>,
    entry: BlockId,
    join_points: HashSet<BlockId>,
    loop_heads: HashSet<BlockId>,
}

impl MethodCfg {
    pub fn new(body: &MethodBody) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();
        for block in body.block_ids() {
            nodes.insert(block, graph.add_node(block));
        }
        let mut guards = Vec::with_capacity(body.edges.len());
        for (i, edge) in body.edges.iter().enumerate() {
            guards.push(edge.guard);
            if let (Some(from), Some(to)) = (nodes.get(&edge.from), nodes.get(&edge.to)) {
                graph.add_edge(*from, *to, i);
            }
        }

        let join_points = graph
            .node_indices()
            .filter(|n| graph.edges_directed(*n, Direction::Incoming).count() > 1)
            .map(|n| graph[n])
            .collect();

        let mut loop_heads = HashSet::new();
        if let Some(start) = nodes.get(&body.entry) {
            depth_first_search(&graph, Some(*start), |event| {
                if let DfsEvent::BackEdge(_, head) = event {
                    loop_heads.insert(graph[head]);
                }
                Control::<()>::Continue
            });
        }

        Self {
            graph,
            nodes,
            guards,
            entry: body.entry,
            join_points,
            loop_heads,
        }
    }

    pub fn entry(&self) -> BlockId {
        self.entry
    }

    pub fn graph(&self) -> &DiGraph<BlockId, usize> {
        &self.graph
    }

    /// Outgoing edges of `block` as `(edge index, target)`, in body order.
    pub fn successors(&self, block: BlockId) -> Vec<(usize, BlockId)> {
        let Some(node) = self.nodes.get(&block) else {
            return vec![];
        };
        let mut succ: Vec<(usize, BlockId)> = self
            .graph
            .edges_directed(*node, Direction::Outgoing)
            .map(|e| (*e.weight(), self.graph[e.target()]))
            .collect();
        succ.sort();
        succ
    }

    /// Incoming edges of `block` as `(edge index, source)`, in body order.
    pub fn predecessors(&self, block: BlockId) -> Vec<(usize, BlockId)> {
        let Some(node) = self.nodes.get(&block) else {
            return vec![];
        };
        let mut pred: Vec<(usize, BlockId)> = self
            .graph
            .edges_directed(*node, Direction::Incoming)
            .map(|e| (*e.weight(), self.graph[e.source()]))
            .collect();
        pred.sort();
        pred
    }

    pub fn guard(&self, edge: usize) -> Option<&EdgeGuard> {
        self.guards.get(edge)
    }

    /// The block an edge leads to.
    pub fn target(&self, edge: usize) -> Option<BlockId> {
        self.graph
            .edge_references()
            .find(|e| *e.weight() == edge)
            .map(|e| self.graph[e.target()])
    }

    /// The index of the edge from `from` to `to`, if there is exactly one such edge.
    pub fn edge_between(&self, from: BlockId, to: BlockId) -> Option<usize> {
        let mut edges = self
            .successors(from)
            .into_iter()
            .filter(|(_, t)| *t == to)
            .map(|(i, _)| i);
        let first = edges.next()?;
        edges.next().is_none().then_some(first)
    }

    /// Blocks with more than one incoming edge.
    pub fn is_join_point(&self, block: BlockId) -> bool {
        self.join_points.contains(&block)
    }

    /// Targets of back edges found by a depth-first search from the entry.
    pub fn is_loop_head(&self, block: BlockId) -> bool {
        self.loop_heads.contains(&block)
    }
}
