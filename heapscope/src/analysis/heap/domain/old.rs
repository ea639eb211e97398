use super::{Domain, Slot};
use crate::analysis::heap::functions::Symbol;
use crate::analysis::heap::value::SymbolicValue;
use crate::error::HeapError;
use heapscope_il::{ProgramPoint, Temp, TypeId};
use tracing::{debug, warn};

/// An open `old(...)` scope: the entry state the enclosed instructions are evaluated in.
#[derive(Debug, Clone)]
pub struct OldFrame {
    /// Where the scope was opened
    pub begin: ProgramPoint,
    pub domain: Domain,
}

impl Domain {
    pub fn old_depth(&self) -> usize {
        self.old.len()
    }

    pub fn old_frames(&self) -> &[OldFrame] {
        &self.old
    }

    /// Open an `old(...)` scope evaluated in a copy of `entry`.
    pub fn begin_old(&mut self, begin: ProgramPoint, entry: &Domain) {
        let mut snapshot = entry.clone();
        snapshot.old.clear();
        debug!(%begin, depth = self.old.len() + 1, "entering old scope");
        self.old.push(OldFrame {
            begin,
            domain: snapshot,
        });
    }

    /// Close the innermost `old(...)` scope, moving the value of `source` in the entry state
    /// into `dest` of the current state.
    pub fn end_old(&mut self, source: Temp, dest: Temp, ty: TypeId) -> Result<(), HeapError> {
        let mut frame = self.old.pop().ok_or(HeapError::UnbalancedOld)?;
        debug!(depth = self.old.len(), "leaving old scope");
        if frame.domain.is_bottom() {
            self.set_bottom();
            return Ok(());
        }
        let address = frame.domain.address(Slot::Temp(source));
        let old_value = frame.domain.value(address);
        let value = self.transplant(&frame.domain, old_value);
        self.refine_type(value, ty);
        let dest = self.address(Slot::Temp(dest));
        self.assign_value(dest, value);
        Ok(())
    }

    /// Find the value of the current state standing for `v` of the entry snapshot `old`.
    fn transplant(&mut self, old: &Domain, v: SymbolicValue) -> SymbolicValue {
        let v = old.find(v);
        if self.egraph().contains(v) {
            return self.find(v);
        }
        if let Some(path) = old.access_path_terms(v) {
            if let Some(found) = self.follow_unmodified(&path) {
                return found;
            }
        }
        warn!(%v, "entry value is not tracked by the current state, using an unknown value");
        let fresh = self.fresh();
        self.set_label(fresh, old.label(v));
        fresh
    }

    /// Evaluate an access path from the root, only reading locations that still hold their
    /// entry value.
    fn follow_unmodified(&mut self, path: &[Symbol]) -> Option<SymbolicValue> {
        let value_of = self.ctx.functions.value_of;
        let mut current = self.const_root();
        for function in path {
            current = if *function == value_of {
                if !self.is_unmodified(current) {
                    return None;
                }
                self.value(current)
            } else if self.is_unmodified(current) {
                self.location(*function, &[current])
            } else {
                self.lookup(*function, &[current])?
            };
        }
        Some(current)
    }
}
