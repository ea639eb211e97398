mod join;
mod order;
#[cfg(test)]
mod tests;

pub use join::MergeInfo;
pub use order::Embedding;

use crate::analysis::cpa::lattice::MeetSemiLattice;
use crate::analysis::heap::abstract_type::AbstractType;
use crate::analysis::heap::functions::Symbol;
use crate::analysis::heap::value::{SymbolicValue, ValueFactory, ValueSet};
use std::collections::HashMap;
use std::fmt::{Display, Formatter};
use std::mem::take;

/// A function symbol applied to argument values.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub struct Term {
    pub function: Symbol,
    pub args: Box<[SymbolicValue]>,
}

impl Term {
    pub fn new(function: Symbol, args: &[SymbolicValue]) -> Self {
        Self {
            function,
            args: args.into(),
        }
    }

    /// The argument a location-like term hangs off.
    pub fn receiver(&self) -> Option<SymbolicValue> {
        self.args.first().copied()
    }

    fn distinct_args(&self) -> impl Iterator<Item = SymbolicValue> + '_ {
        self.args
            .iter()
            .enumerate()
            .filter(|(i, a)| !self.args[..*i].contains(a))
            .map(|(_, a)| *a)
    }
}

impl Display for Term {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}(", self.function)?;
        for (i, a) in self.args.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{a}")?;
        }
        write!(f, ")")
    }
}

#[derive(Debug, Clone)]
struct Node {
    value: SymbolicValue,
    label: AbstractType,
    /// Union-find parent; `None` for representatives
    parent: Option<u32>,
    /// Terms that mention this node as an argument
    uses: Vec<Term>,
    /// Terms that evaluate to this node
    defs: Vec<Term>,
}

/// A congruence-closed graph of terms over symbolic values, each value labeled with an
/// [`AbstractType`].
///
/// Nodes live in an arena indexed by [`SymbolicValue::index`]. Merged nodes forward to their
/// representative; every public query canonicalizes its arguments first, so callers may
/// hold on to values that were merged away.
#[derive(Debug, Clone)]
pub struct EGraph {
    factory: ValueFactory,
    nodes: Vec<Node>,
    terms: HashMap<Term, SymbolicValue>,
    const_root: SymbolicValue,
    bottom: bool,
}

impl EGraph {
    pub fn new(factory: ValueFactory) -> Self {
        let root = SymbolicValue {
            index: 0,
            uid: factory.next_uid(),
        };
        Self::with_root(factory, root)
    }

    /// An empty graph whose root has the given identity. Graphs built from a common
    /// ancestor share their root.
    fn with_root(factory: ValueFactory, root: SymbolicValue) -> Self {
        let root = SymbolicValue {
            index: 0,
            uid: root.uid,
        };
        Self {
            factory,
            nodes: vec![Node {
                value: root,
                label: AbstractType::TOP,
                parent: None,
                uses: vec![],
                defs: vec![],
            }],
            terms: HashMap::new(),
            const_root: root,
            bottom: false,
        }
    }

    /// The node standing for the static heap; every live value is reachable from it.
    pub fn const_root(&self) -> SymbolicValue {
        self.const_root
    }

    pub fn is_bottom(&self) -> bool {
        self.bottom
    }

    pub fn set_bottom(&mut self) {
        self.bottom = true;
    }

    /// Number of representative nodes.
    pub fn node_count(&self) -> usize {
        self.nodes.iter().filter(|n| n.parent.is_none()).count()
    }

    pub fn term_count(&self) -> usize {
        self.terms.len()
    }

    /// Whether `v` is a node of this graph (rather than of a sibling).
    pub fn contains(&self, v: SymbolicValue) -> bool {
        self.nodes
            .get(v.index as usize)
            .is_some_and(|n| n.value == v)
    }

    fn node(&self, v: SymbolicValue) -> &Node {
        &self.nodes[v.index as usize]
    }

    fn node_mut(&mut self, v: SymbolicValue) -> &mut Node {
        &mut self.nodes[v.index as usize]
    }

    pub fn fresh(&mut self) -> SymbolicValue {
        let value = SymbolicValue {
            index: self.nodes.len() as u32,
            uid: self.factory.next_uid(),
        };
        self.nodes.push(Node {
            value,
            label: AbstractType::TOP,
            parent: None,
            uses: vec![],
            defs: vec![],
        });
        value
    }

    /// The representative of `v`.
    pub fn find(&self, v: SymbolicValue) -> SymbolicValue {
        let mut current = v;
        while let Some(parent) = self.node(current).parent {
            current = self.nodes[parent as usize].value;
        }
        current
    }

    pub fn label(&self, v: SymbolicValue) -> AbstractType {
        self.node(self.find(v)).label
    }

    /// Refine the label of `v` by meeting it with `label`. A bottom label marks the whole
    /// graph as unreachable.
    pub fn set_label(&mut self, v: SymbolicValue, label: AbstractType) {
        let v = self.find(v);
        let node = self.node_mut(v);
        node.label.meet(&label);
        if node.label.is_bottom() {
            self.bottom = true;
        }
    }

    /// Overwrite the label of `v`. Only used where the caller computed a sound label itself.
    pub(crate) fn replace_label(&mut self, v: SymbolicValue, label: AbstractType) {
        let v = self.find(v);
        self.node_mut(v).label = label;
    }

    fn canonical(&self, function: Symbol, args: &[SymbolicValue]) -> Term {
        Term {
            function,
            args: args.iter().map(|a| self.find(*a)).collect(),
        }
    }

    pub fn lookup(&self, function: Symbol, args: &[SymbolicValue]) -> Option<SymbolicValue> {
        self.terms.get(&self.canonical(function, args)).copied()
    }

    /// Return the value of `function(args)`, asserting a fresh `Top` value if the term is
    /// new. The flag tells whether the value was created.
    pub fn lookup_or_create(
        &mut self,
        function: Symbol,
        args: &[SymbolicValue],
    ) -> (SymbolicValue, bool) {
        let term = self.canonical(function, args);
        if let Some(v) = self.terms.get(&term) {
            return (*v, false);
        }
        let v = self.fresh();
        self.insert_term(term, v);
        (v, true)
    }

    /// Rebind `function(args)` to `value`, dropping whatever it evaluated to before.
    pub fn set(&mut self, function: Symbol, args: &[SymbolicValue], value: SymbolicValue) {
        let term = self.canonical(function, args);
        self.remove_term(&term);
        self.insert_term(term, value);
    }

    pub fn eliminate(&mut self, function: Symbol, args: &[SymbolicValue]) {
        let term = self.canonical(function, args);
        self.remove_term(&term);
    }

    /// Remove every term that takes `v` as an argument. Terms evaluating to `v` stay, so a
    /// havocked location remains addressable.
    pub fn eliminate_all(&mut self, v: SymbolicValue) {
        let v = self.find(v);
        for term in self.node(v).uses.clone() {
            self.remove_term(&term);
        }
    }

    fn insert_term(&mut self, term: Term, value: SymbolicValue) {
        let value = self.find(value);
        for a in term.distinct_args() {
            self.node_mut(a).uses.push(term.clone());
        }
        self.node_mut(value).defs.push(term.clone());
        self.terms.insert(term, value);
    }

    fn remove_term(&mut self, term: &Term) -> Option<SymbolicValue> {
        let value = self.terms.remove(term)?;
        for a in term.distinct_args() {
            self.node_mut(a).uses.retain(|t| t != term);
        }
        self.node_mut(value).defs.retain(|t| t != term);
        Some(value)
    }

    /// Merge the classes of `a` and `b` and restore congruence.
    pub fn assume_equal(&mut self, a: SymbolicValue, b: SymbolicValue) {
        let mut pending = vec![(a, b)];
        while let Some((x, y)) = pending.pop() {
            let (rx, ry) = (self.find(x), self.find(y));
            if rx == ry {
                continue;
            }
            // the older node survives
            let (keep, gone) = if rx.index <= ry.index {
                (rx, ry)
            } else {
                (ry, rx)
            };
            let gone_label = self.node(gone).label;
            self.set_label(keep, gone_label);
            self.node_mut(gone).parent = Some(keep.index);

            for term in take(&mut self.node_mut(gone).defs) {
                self.terms.insert(term.clone(), keep);
                self.node_mut(keep).defs.push(term);
            }
            for term in take(&mut self.node_mut(gone).uses) {
                let Some(result) = self.remove_term(&term) else {
                    continue;
                };
                let canonical = self.canonical(term.function, &term.args);
                match self.terms.get(&canonical) {
                    Some(existing) => pending.push((*existing, result)),
                    None => self.insert_term(canonical, result),
                }
            }
        }
    }

    pub fn are_equal(&self, a: SymbolicValue, b: SymbolicValue) -> bool {
        self.find(a) == self.find(b)
    }

    /// Every term that mentions `v`, with the value it evaluates to.
    pub fn uses_of(&self, v: SymbolicValue) -> Vec<(Term, SymbolicValue)> {
        self.node(self.find(v))
            .uses
            .iter()
            .filter_map(|t| self.terms.get(t).map(|r| (t.clone(), *r)))
            .collect()
    }

    /// The unary functions defined on `v`, with their values.
    pub fn functions_of(&self, v: SymbolicValue) -> Vec<(Symbol, SymbolicValue)> {
        let v = self.find(v);
        self.node(v)
            .uses
            .iter()
            .filter(|t| t.args.len() == 1)
            .filter_map(|t| self.terms.get(t).map(|r| (t.function, *r)))
            .collect()
    }

    /// Terms that evaluate to `v`.
    pub fn defs_of(&self, v: SymbolicValue) -> &[Term] {
        &self.node(self.find(v)).defs
    }

    pub fn terms(&self) -> impl Iterator<Item = (&Term, SymbolicValue)> {
        self.terms.iter().map(|(t, v)| (t, *v))
    }

    /// Representative values.
    pub fn values(&self) -> impl Iterator<Item = SymbolicValue> + '_ {
        self.nodes
            .iter()
            .filter(|n| n.parent.is_none())
            .map(|n| n.value)
    }

    /// Values reachable from the root through terms whose arguments are all reachable.
    pub fn reachable(&self) -> ValueSet {
        let mut seen = ValueSet::new();
        seen.insert(self.const_root);
        let mut worklist = vec![self.const_root];
        while let Some(v) = worklist.pop() {
            for (term, result) in self.uses_of(v) {
                if term.args.iter().all(|a| seen.contains(a)) && seen.insert(result) {
                    worklist.push(result);
                }
            }
        }
        seen
    }
}

impl Display for EGraph {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.bottom {
            return writeln!(f, "Bottom");
        }
        let mut lines: Vec<String> = self
            .terms
            .iter()
            .map(|(t, v)| format!("{t} = {v} : {}", self.label(*v)))
            .collect();
        lines.sort();
        for line in lines {
            writeln!(f, "{line}")?;
        }
        Ok(())
    }
}
