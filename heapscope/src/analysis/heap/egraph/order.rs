use super::{EGraph, Term};
use crate::analysis::heap::value::SymbolicValue;
use std::collections::HashMap;

/// The simulation found by [`EGraph::less_equal`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Embedding {
    /// Values of the smaller graph to the values of the larger graph they stand for
    pub forward: HashMap<SymbolicValue, Vec<SymbolicValue>>,
    /// Values of the larger graph to the value of the smaller graph simulating them
    pub backward: HashMap<SymbolicValue, SymbolicValue>,
}

impl EGraph {
    /// Decide whether `self` knows at least everything `other` knows.
    ///
    /// Every term of `other` reachable from the root must be matched by a term of `self`
    /// over the matched arguments, unless its result is unconstrained, each `other` node must match a single class of `self`,
    /// and matched labels must be ordered.
    pub fn less_equal(&self, other: &EGraph) -> Option<Embedding> {
        if self.is_bottom() {
            return Some(Embedding::default());
        }
        if other.is_bottom() {
            return None;
        }
        let mut map: HashMap<SymbolicValue, SymbolicValue> = HashMap::new();
        map.insert(other.const_root, self.const_root);
        let mut worklist = vec![other.const_root];
        while let Some(o) = worklist.pop() {
            for (term, r_o) in other.uses_of(o) {
                let Some(args) = term
                    .args
                    .iter()
                    .map(|a| map.get(a).copied())
                    .collect::<Option<Vec<_>>>()
                else {
                    continue;
                };
                let Some(r_s) = self.lookup(term.function, &args) else {
                    // a bare location says nothing about its contents
                    if other.is_unconstrained(r_o) {
                        continue;
                    }
                    return None;
                };
                match map.get(&r_o) {
                    Some(prev) => {
                        if !self.are_equal(*prev, r_s) {
                            return None;
                        }
                    }
                    None => {
                        if !self.label(r_s).less_equal(&other.label(r_o)) {
                            return None;
                        }
                        map.insert(r_o, r_s);
                        worklist.push(r_o);
                    }
                }
            }
        }
        let mut embedding = Embedding::default();
        for (o, s) in map {
            let s = self.find(s);
            embedding.forward.entry(s).or_default().push(o);
            embedding.backward.insert(o, s);
        }
        Some(embedding)
    }

    /// The conjunction of the facts of both graphs.
    pub fn meet(&self, other: &EGraph) -> EGraph {
        if self.is_bottom() {
            return self.clone();
        }
        if other.is_bottom() {
            return other.clone();
        }
        let mut result = self.clone();
        let mut map: HashMap<SymbolicValue, SymbolicValue> = HashMap::new();
        map.insert(other.const_root, result.const_root);
        let mut worklist = vec![other.const_root];
        while let Some(o) = worklist.pop() {
            for (term, r_o) in other.uses_of(o) {
                let Some(args) = term
                    .args
                    .iter()
                    .map(|a| map.get(a).copied())
                    .collect::<Option<Vec<_>>>()
                else {
                    continue;
                };
                let r = match (result.lookup(term.function, &args), map.get(&r_o).copied()) {
                    (Some(r), Some(prev)) => {
                        result.assume_equal(prev, r);
                        r
                    }
                    (Some(r), None) => {
                        map.insert(r_o, r);
                        worklist.push(r_o);
                        r
                    }
                    (None, prev) => {
                        let r = prev.unwrap_or_else(|| {
                            let r = result.fresh();
                            map.insert(r_o, r);
                            worklist.push(r_o);
                            r
                        });
                        let canonical: Vec<SymbolicValue> =
                            args.iter().map(|a| result.find(*a)).collect();
                        result.insert_term(Term::new(term.function, &canonical), r);
                        r
                    }
                };
                result.set_label(r, other.label(r_o));
            }
        }
        result
    }
}
