use super::{EGraph, Term};
use crate::analysis::cpa::lattice::JoinSemiLattice;
use crate::analysis::heap::value::SymbolicValue;
use itertools::Itertools;
use std::collections::{HashMap, VecDeque};

/// How the values of two joined graphs relate to the values of their join.
///
/// Each triple `(left, right, result)` says that `left` in the first operand and `right`
/// in the second were merged into `result`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MergeInfo {
    triples: Vec<(SymbolicValue, SymbolicValue, SymbolicValue)>,
    /// The result does not hold everything the left operand knew
    pub changed: bool,
    left_forward: HashMap<SymbolicValue, Vec<SymbolicValue>>,
    right_forward: HashMap<SymbolicValue, Vec<SymbolicValue>>,
    backward: HashMap<SymbolicValue, (SymbolicValue, SymbolicValue)>,
}

impl MergeInfo {
    fn record(&mut self, left: SymbolicValue, right: SymbolicValue, result: SymbolicValue) {
        self.triples.push((left, right, result));
        self.left_forward.entry(left).or_default().push(result);
        self.right_forward.entry(right).or_default().push(result);
        self.backward.insert(result, (left, right));
    }

    /// Merge info for a join whose result is the left operand itself.
    pub fn identity_left<I: IntoIterator<Item = SymbolicValue>>(values: I) -> Self {
        let mut info = Self::default();
        for v in values {
            info.left_forward.insert(v, vec![v]);
        }
        info
    }

    /// Merge info for a join whose result is the right operand itself.
    pub fn identity_right<I: IntoIterator<Item = SymbolicValue>>(values: I) -> Self {
        let mut info = Self::default();
        for v in values {
            info.right_forward.insert(v, vec![v]);
        }
        info
    }

    pub fn triples(&self) -> &[(SymbolicValue, SymbolicValue, SymbolicValue)] {
        &self.triples
    }

    pub fn left_forward(&self) -> &HashMap<SymbolicValue, Vec<SymbolicValue>> {
        &self.left_forward
    }

    pub fn right_forward(&self) -> &HashMap<SymbolicValue, Vec<SymbolicValue>> {
        &self.right_forward
    }

    pub fn backward(&self, result: SymbolicValue) -> Option<(SymbolicValue, SymbolicValue)> {
        self.backward.get(&result).copied()
    }
}

impl EGraph {
    /// Join two graphs that descend from a common ancestor.
    ///
    /// Starting from the shared root, nodes are paired whenever the same function applied
    /// to paired arguments is defined in both graphs; every pair becomes a node of the
    /// result labeled with the join of both labels. With `widen`, a left node is paired at
    /// most once and terms that would need a second pairing are dropped, so repeated
    /// widening cannot grow the graph.
    pub fn join(&self, other: &EGraph, widen: bool) -> (EGraph, MergeInfo) {
        if self.is_bottom() {
            let changed = !other.is_bottom();
            let mut info = MergeInfo::identity_right(other.values());
            info.changed = changed;
            return (other.clone(), info);
        }
        if other.is_bottom() {
            return (self.clone(), MergeInfo::identity_left(self.values()));
        }

        let mut result = EGraph::with_root(self.factory.clone(), self.const_root);
        let mut info = MergeInfo::default();
        let mut pairs: HashMap<(SymbolicValue, SymbolicValue), SymbolicValue> = HashMap::new();
        let mut by_left: HashMap<SymbolicValue, Vec<(SymbolicValue, SymbolicValue)>> =
            HashMap::new();

        let (root1, root2, root) = (self.const_root, other.const_root, result.const_root);
        pairs.insert((root1, root2), root);
        by_left.insert(root1, vec![(root2, root)]);
        info.record(root1, root2, root);

        let mut worklist = VecDeque::from([root1]);
        while let Some(v1) = worklist.pop_front() {
            for (term, r1) in self.uses_of(v1) {
                let Some(choices) = term
                    .args
                    .iter()
                    .map(|a| by_left.get(a).cloned())
                    .collect::<Option<Vec<_>>>()
                else {
                    continue;
                };
                for combo in choices
                    .into_iter()
                    .map(|c| c.into_iter())
                    .multi_cartesian_product()
                {
                    let args2: Vec<SymbolicValue> = combo.iter().map(|(b, _)| *b).collect();
                    let Some(r2) = other.lookup(term.function, &args2) else {
                        continue;
                    };
                    let r = match pairs.get(&(r1, r2)) {
                        Some(r) => *r,
                        None => {
                            if widen && by_left.get(&r1).is_some_and(|p| !p.is_empty()) {
                                continue;
                            }
                            let r = result.fresh();
                            let mut label = self.label(r1);
                            if widen {
                                label.widen(&other.label(r2));
                            } else {
                                label.join(&other.label(r2));
                            }
                            result.replace_label(r, label);
                            pairs.insert((r1, r2), r);
                            by_left.entry(r1).or_default().push((r2, r));
                            info.record(r1, r2, r);
                            worklist.push_back(r1);
                            r
                        }
                    };
                    let result_args: Vec<SymbolicValue> = combo.iter().map(|(_, v)| *v).collect();
                    if result.lookup(term.function, &result_args).is_none() {
                        result.insert_term(Term::new(term.function, &result_args), r);
                    }
                }
            }
        }

        info.changed = self.lost_information(&result, &info, &by_left);
        (result, info)
    }

    /// A value defined by a single term that nothing else mentions carries no information.
    pub(super) fn is_unconstrained(&self, v: SymbolicValue) -> bool {
        let v = self.find(v);
        let node = self.node(v);
        self.label(v).is_top() && node.defs.len() == 1 && node.uses.is_empty()
    }

    /// Whether the join result knows less than `self`: a label got weaker, a node was split,
    /// or a reachable term has no image.
    fn lost_information(
        &self,
        result: &EGraph,
        info: &MergeInfo,
        by_left: &HashMap<SymbolicValue, Vec<(SymbolicValue, SymbolicValue)>>,
    ) -> bool {
        if info
            .triples
            .iter()
            .any(|(v1, _, v)| result.label(*v) != self.label(*v1))
        {
            return true;
        }
        if by_left.values().any(|p| p.len() > 1) {
            return true;
        }
        let reachable = self.reachable();
        for (term, r1) in self.terms() {
            if !term.args.iter().all(|a| reachable.contains(a)) || self.is_unconstrained(r1) {
                continue;
            }
            let Some(choices) = term
                .args
                .iter()
                .map(|a| by_left.get(a).cloned())
                .collect::<Option<Vec<_>>>()
            else {
                return true;
            };
            let kept = choices
                .into_iter()
                .map(|c| c.into_iter())
                .multi_cartesian_product()
                .any(|combo| {
                    let args: Vec<SymbolicValue> = combo.iter().map(|(_, v)| *v).collect();
                    result
                        .lookup(term.function, &args)
                        .and_then(|r| info.backward(r))
                        .is_some_and(|(l, _)| l == r1)
                });
            if !kept {
                return true;
            }
        }
        false
    }
}
