use super::Domain;
use crate::analysis::heap::functions::{SymbolKind, SyntheticOp};
use crate::analysis::heap::value::{SymbolicValue, ValueSet};
use crate::error::HeapError;
use heapscope_il::{FieldId, MethodId};
use tracing::{debug, trace};

/// What a call may do to the objects handed to it.
#[derive(Debug, Clone, Default)]
pub struct HavocScope {
    /// Forget field contents, not just derived facts
    pub havoc_fields: bool,
    /// Readonly fields may change too (constructors of the object itself)
    pub havoc_readonly: bool,
    /// Restrict field havoc to these fields
    pub modifies: Option<Vec<FieldId>>,
}

impl HavocScope {
    pub fn fields(modifies: Option<&[FieldId]>) -> Self {
        Self {
            havoc_fields: true,
            havoc_readonly: false,
            modifies: modifies.map(|m| m.to_vec()),
        }
    }

    /// The object's own fields are kept; objects reachable from them are still havocked.
    pub fn immutable(modifies: Option<&[FieldId]>) -> Self {
        Self {
            havoc_fields: false,
            ..Self::fields(modifies)
        }
    }

    /// The scope applied to objects reachable from the havocked one.
    fn reachable(&self) -> Self {
        Self {
            havoc_fields: true,
            havoc_readonly: false,
            modifies: self.modifies.clone(),
        }
    }
}

impl Domain {
    fn may_modify(&self, scope: &HavocScope, field: FieldId) -> bool {
        let md = self.metadata();
        scope
            .modifies
            .as_ref()
            .is_none_or(|m| m.iter().any(|f| md.unspecialized(*f) == field))
    }

    /// A getter result survives a call when it declares reads disjoint from the callee's
    /// declared modifications.
    fn pseudo_field_survives(&self, getter: MethodId, scope: &HavocScope) -> bool {
        let md = self.metadata();
        match (self.ctx.contracts().reads(getter), scope.modifies.as_ref()) {
            (Some(reads), Some(modifies)) => !reads.iter().any(|r| {
                modifies
                    .iter()
                    .any(|m| md.unspecialized(*r) == md.unspecialized(*m))
            }),
            _ => false,
        }
    }

    fn havoc_location(&mut self, location: SymbolicValue, modified: &mut ValueSet) {
        let value_of = self.ctx.functions.value_of;
        self.eliminate(value_of, &[location]);
        self.mark_modified(location);
        modified.insert(self.find(location));
    }

    /// Model what a call may do to `object` and everything reachable from it.
    pub fn havoc_object_at_call(
        &mut self,
        object: SymbolicValue,
        modified: &mut ValueSet,
        scope: &HavocScope,
    ) -> Result<(), HeapError> {
        let mut visited = ValueSet::new();
        self.havoc_reachable(object, modified, scope, &mut visited)
    }

    fn havoc_reachable(
        &mut self,
        object: SymbolicValue,
        modified: &mut ValueSet,
        scope: &HavocScope,
        visited: &mut ValueSet,
    ) -> Result<(), HeapError> {
        let object = self.find(object);
        if object == self.const_root() || object == self.null() || object == self.zero() {
            return Ok(());
        }
        if !visited.insert(object) {
            return Ok(());
        }
        trace!(%object, "havoc reachable from");
        self.havoc_uses(object, modified, scope, visited)
    }

    fn havoc_uses(
        &mut self,
        object: SymbolicValue,
        modified: &mut ValueSet,
        scope: &HavocScope,
        visited: &mut ValueSet,
    ) -> Result<(), HeapError> {
        let f = self.ctx.functions.clone();
        let md = self.ctx.metadata.clone();
        let reachable = scope.reachable();

        // array elements
        if let Some(version) = self.lookup(f.object_version, &[object]) {
            for (term, element) in self.egraph().uses_of(version) {
                if term.function != f.element_address {
                    continue;
                }
                if let Some(old) = self.try_value(element) {
                    self.havoc_reachable(old, modified, &reachable, visited)?;
                }
            }
            if scope.havoc_fields {
                self.bump_version(object);
                modified.insert(object);
            }
        }

        for (term, location) in self.egraph().uses_of(object) {
            // facts about `object` itself hold whatever the callee writes
            if term.receiver() != Some(object) || f.keep_as_bottom_field(term.function) {
                continue;
            }
            match &*term.function {
                SymbolKind::Field(field) => {
                    if f.is_static(&*md, term.function)? != (object == self.const_root()) {
                        continue;
                    }
                    let writable = scope.havoc_fields
                        && (!f.is_readonly(&*md, term.function)? || scope.havoc_readonly)
                        && self.may_modify(scope, *field);
                    if md.is_struct(md.field(*field)?.ty) {
                        // struct storage: the inner fields decide for themselves
                        let inner = HavocScope {
                            havoc_fields: writable,
                            ..reachable.clone()
                        };
                        self.havoc_reachable(location, modified, &inner, visited)?;
                        continue;
                    }
                    if let Some(old) = self.try_value(location) {
                        self.havoc_reachable(old, modified, &reachable, visited)?;
                    }
                    if writable {
                        self.havoc_location(location, modified);
                    }
                }
                SymbolKind::PseudoField(getter) => {
                    if !self.pseudo_field_survives(*getter, scope) {
                        self.eliminate(term.function, &term.args);
                    }
                }
                SymbolKind::Synthetic(SyntheticOp::ValueOf) => {
                    // `object` is a pointer; its target is a location
                    if let Some(old) = self.try_value(object) {
                        self.havoc_reachable(old, modified, &reachable, visited)?;
                    }
                    if scope.havoc_fields {
                        self.havoc_location(object, modified);
                    }
                }
                SymbolKind::Synthetic(SyntheticOp::UnboxAddress) => {
                    self.havoc_reachable(location, modified, &reachable, visited)?;
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Model what a call may do to static state.
    pub fn havoc_statics(
        &mut self,
        modified: &mut ValueSet,
        scope: &HavocScope,
    ) -> Result<(), HeapError> {
        let root = self.const_root();
        let mut visited = ValueSet::new();
        visited.insert(root);
        self.havoc_uses(root, modified, scope, &mut visited)
    }

    /// Forget everything that is not provably immutable: whatever the locals, parameters and
    /// evaluation stack point to, and all statics.
    pub fn aggressive_havoc(&mut self) -> Result<(), HeapError> {
        debug!("aggressive havoc");
        let root = self.const_root();
        let scope = HavocScope::fields(None);
        let mut modified = ValueSet::new();
        let slots: Vec<SymbolicValue> = self
            .egraph()
            .uses_of(root)
            .into_iter()
            .filter(|(t, _)| {
                matches!(
                    *t.function,
                    SymbolKind::Local(_) | SymbolKind::Parameter(_) | SymbolKind::Temp(_)
                )
            })
            .map(|(_, address)| address)
            .collect();
        for address in slots {
            if let Some(v) = self.try_value(address) {
                self.havoc_object_at_call(v, &mut modified, &scope)?;
            }
        }
        self.havoc_statics(&mut modified, &scope)?;
        self.set_modified_at_call(modified);
        Ok(())
    }

    /// Drop getter results on `object` that may depend on `field`.
    pub fn invalidate_pseudo_fields(&mut self, object: SymbolicValue, field: FieldId) {
        let object = self.find(object);
        let field = self.metadata().unspecialized(field);
        for (term, _) in self.egraph().uses_of(object) {
            let SymbolKind::PseudoField(getter) = *term.function else {
                continue;
            };
            let independent = self.ctx.contracts().reads(getter).is_some_and(|reads| {
                !reads
                    .iter()
                    .any(|r| self.metadata().unspecialized(*r) == field)
            });
            if !independent {
                self.eliminate(term.function, &term.args);
            }
        }
    }
}
