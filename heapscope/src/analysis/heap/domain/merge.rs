use super::{Domain, OldFrame};
use crate::analysis::heap::egraph::{Embedding, MergeInfo, Term};
use crate::analysis::heap::value::{SymbolicValue, ValueSet};
use crate::error::HeapError;
use itertools::Itertools;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

impl Domain {
    /// Join two states reaching the same program point.
    ///
    /// Returns the joined state, whether it is weaker than `self`, and how the values of
    /// both operands map to the values of the result. Neither operand is modified.
    pub fn join(
        &self,
        other: &Domain,
        widen: bool,
    ) -> Result<(Domain, bool, MergeInfo), HeapError> {
        if other.is_bottom() {
            return Ok((
                self.clone(),
                false,
                MergeInfo::identity_left(self.egraph().values()),
            ));
        }
        if self.is_bottom() {
            let mut info = MergeInfo::identity_right(other.egraph().values());
            info.changed = true;
            return Ok((other.clone(), true, info));
        }
        if self.old.len() != other.old.len() {
            return Err(HeapError::OldScopeMismatch);
        }

        let (egraph, info) = self.egraph().join(other.egraph(), widen);
        let mut weaker = info.changed;

        let mut unmodified = ValueSet::new();
        let mut unmodified_fields = ValueSet::new();
        let mut modified_at_call = ValueSet::new();
        for (left, right, result) in info.triples().iter().copied() {
            let in_left = self.unmodified_since_entry.contains(&left);
            if in_left && other.unmodified_since_entry.contains(&right) {
                unmodified.insert(result);
            } else if in_left {
                weaker = true;
            }
            let in_left = self.unmodified_fields_since_entry.contains(&left);
            if in_left && other.unmodified_fields_since_entry.contains(&right) {
                unmodified_fields.insert(result);
            } else if in_left {
                weaker = true;
            }
            let in_left = self.modified_at_call.contains(&left);
            if in_left || other.modified_at_call.contains(&right) {
                modified_at_call.insert(result);
                weaker |= !in_left;
            }
        }

        let mut old = Vec::with_capacity(self.old.len());
        for (a, b) in self.old.iter().zip(&other.old) {
            if a.begin != b.begin {
                return Err(HeapError::OldScopeMismatch);
            }
            let (domain, frame_weaker, _) = a.domain.join(&b.domain, widen)?;
            weaker |= frame_weaker;
            old.push(OldFrame {
                begin: a.begin,
                domain,
            });
        }

        debug!(
            widen,
            weaker,
            nodes = egraph.node_count(),
            "joined heap states"
        );
        let mut joined = Domain {
            ctx: self.ctx.clone(),
            egraph: Arc::new(egraph),
            unmodified_since_entry: unmodified,
            unmodified_fields_since_entry: unmodified_fields,
            modified_at_call,
            old,
        };
        joined.keep_modified_locations(self, info.left_forward());
        weaker |= joined.keep_modified_locations(other, info.right_forward());
        Ok((joined, weaker, info))
    }

    /// Re-create locations that `side` wrote but the other operand never materialized, so
    /// that reading them later does not make them look unmodified. Returns whether any
    /// location was added.
    fn keep_modified_locations(
        &mut self,
        side: &Domain,
        forward: &HashMap<SymbolicValue, Vec<SymbolicValue>>,
    ) -> bool {
        let functions = &side.ctx.functions;
        let written: Vec<Term> = side
            .egraph()
            .terms()
            .filter(|(t, r)| {
                functions.acts_as_field(t.function)
                    && !side.is_unmodified(*r)
                    && t.args.iter().all(|a| side.is_unmodified(*a))
            })
            .map(|(t, _)| t.clone())
            .collect();
        let mut added = false;
        for term in written {
            let Some(choices) = term
                .args
                .iter()
                .map(|a| forward.get(&side.find(*a)).cloned())
                .collect::<Option<Vec<_>>>()
            else {
                continue;
            };
            for args in choices.into_iter().multi_cartesian_product() {
                if self.lookup(term.function, &args).is_none() {
                    trace!(function = ?term.function, "keeping written location");
                    self.lookup_or_create(term.function, &args);
                    added = true;
                }
            }
        }
        added
    }

    /// Whether `self` knows at least everything `other` knows. On success the embedding maps
    /// `other`'s values to the values of `self` standing for them.
    pub fn less_equal(&self, other: &Domain) -> Option<Embedding> {
        if self.is_bottom() {
            return Some(Embedding::default());
        }
        if other.is_bottom() || self.old.len() != other.old.len() {
            return None;
        }
        let embedding = self.egraph().less_equal(other.egraph())?;
        for (o, s) in &embedding.backward {
            if other.unmodified_since_entry.contains(o) && !self.unmodified_since_entry.contains(s)
            {
                return None;
            }
            if other.unmodified_fields_since_entry.contains(o)
                && !self.unmodified_fields_since_entry.contains(s)
            {
                return None;
            }
            if self.modified_at_call.contains(s) && !other.modified_at_call.contains(o) {
                return None;
            }
        }
        for (a, b) in self.old.iter().zip(&other.old) {
            if a.begin != b.begin {
                return None;
            }
            a.domain.less_equal(&b.domain)?;
        }
        Some(embedding)
    }

    /// Conjoin the facts of `other`. The auxiliary sets of `self` are kept.
    pub fn meet(&self, other: &Domain) -> Domain {
        let egraph = self.egraph().meet(other.egraph());
        let mut met = Domain {
            egraph: Arc::new(egraph),
            ..self.clone()
        };
        met.canonicalize_sets();
        met
    }
}
