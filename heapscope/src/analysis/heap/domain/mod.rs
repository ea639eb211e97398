mod calls;
mod merge;
mod old;
mod paths;
#[cfg(test)]
mod tests;

pub use calls::HavocScope;
pub use old::OldFrame;

use crate::analysis::heap::abstract_type::AbstractType;
use crate::analysis::heap::egraph::EGraph;
use crate::analysis::heap::functions::{Symbol, SymbolKind, SyntheticOp};
use crate::analysis::heap::value::{SymbolicValue, ValueSet};
use crate::context::HeapContext;
use crate::error::HeapError;
use heapscope_il::{
    BinaryOperator, FieldId, Local, MetadataProvider, MethodId, Parameter, Temp, TypeId,
};
use std::collections::HashSet;
use std::ops::Deref;
use std::sync::Arc;
use tracing::trace;

/// A storage slot of the analyzed method.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq)]
pub enum Slot {
    Local(Local),
    Parameter(Parameter),
    Temp(Temp),
    /// The method's return value
    Result,
}

/// The abstract heap at one program point.
///
/// The e-graph is shared copy-on-write between clones; the first mutation after a clone
/// copies it. Join operands are taken by reference and never modified.
#[derive(Debug, Clone)]
pub struct Domain {
    ctx: Arc<HeapContext>,
    egraph: Arc<EGraph>,
    /// Locations and values still equal to what they were at method entry
    unmodified_since_entry: ValueSet,
    /// Field locations never stored to since method entry
    unmodified_fields_since_entry: ValueSet,
    /// Locations invalidated by the most recent call
    modified_at_call: ValueSet,
    /// Entry-state snapshots of the open `old(...)` scopes, innermost last
    old: Vec<OldFrame>,
}

impl Domain {
    /// An empty heap with the canonical constants in place.
    pub fn new(ctx: Arc<HeapContext>) -> Self {
        let mut egraph = EGraph::new(ctx.factory.clone());
        let root = egraph.const_root();
        let (null, _) = egraph.lookup_or_create(ctx.functions.null, &[root]);
        egraph.set_label(null, AbstractType::ZERO);
        let (zero, _) = egraph.lookup_or_create(ctx.functions.zero, &[root]);
        egraph.set_label(zero, AbstractType::ZERO);
        let mut unmodified_since_entry = ValueSet::new();
        unmodified_since_entry.insert(root);
        Self {
            ctx,
            egraph: Arc::new(egraph),
            unmodified_since_entry,
            unmodified_fields_since_entry: ValueSet::new(),
            modified_at_call: ValueSet::new(),
            old: vec![],
        }
    }

    /// The unreachable state.
    pub fn bottom(ctx: Arc<HeapContext>) -> Self {
        let mut d = Self::new(ctx);
        d.set_bottom();
        d
    }

    pub fn ctx(&self) -> &HeapContext {
        &self.ctx
    }

    fn metadata(&self) -> &dyn MetadataProvider {
        self.ctx.metadata()
    }

    pub fn egraph(&self) -> &EGraph {
        &self.egraph
    }

    fn egraph_mut(&mut self) -> &mut EGraph {
        Arc::make_mut(&mut self.egraph)
    }

    /// Whether both domains still share their e-graph.
    pub fn shares_graph_with(&self, other: &Domain) -> bool {
        Arc::ptr_eq(&self.egraph, &other.egraph)
    }

    pub fn is_bottom(&self) -> bool {
        self.egraph.is_bottom()
    }

    pub fn set_bottom(&mut self) {
        trace!("heap state became unreachable");
        self.egraph_mut().set_bottom();
    }

    pub fn const_root(&self) -> SymbolicValue {
        self.egraph.const_root()
    }

    fn constant(&self, function: Symbol) -> SymbolicValue {
        // created by `Domain::new` and never eliminated
        self.egraph
            .lookup(function, &[self.const_root()])
            .unwrap_or_else(|| self.const_root())
    }

    pub fn null(&self) -> SymbolicValue {
        self.constant(self.ctx.functions.null)
    }

    pub fn zero(&self) -> SymbolicValue {
        self.constant(self.ctx.functions.zero)
    }

    pub fn find(&self, v: SymbolicValue) -> SymbolicValue {
        self.egraph.find(v)
    }

    pub fn fresh(&mut self) -> SymbolicValue {
        self.egraph_mut().fresh()
    }

    pub fn label(&self, v: SymbolicValue) -> AbstractType {
        self.egraph.label(v)
    }

    pub fn set_label(&mut self, v: SymbolicValue, label: AbstractType) {
        self.egraph_mut().set_label(v, label);
    }

    /// Record the static type of `v` if nothing is known about it yet.
    pub fn refine_type(&mut self, v: SymbolicValue, ty: TypeId) {
        if self.label(v).ty.is_top() {
            self.set_label(v, AbstractType::of_type(ty));
        }
    }

    pub fn lookup(&self, function: Symbol, args: &[SymbolicValue]) -> Option<SymbolicValue> {
        self.egraph.lookup(function, args)
    }

    pub fn lookup_or_create(&mut self, function: Symbol, args: &[SymbolicValue]) -> SymbolicValue {
        self.egraph_mut().lookup_or_create(function, args).0
    }

    pub fn eliminate(&mut self, function: Symbol, args: &[SymbolicValue]) {
        self.egraph_mut().eliminate(function, args);
    }

    /// The constant a value was created from, if any.
    pub fn constant_of(&self, v: SymbolicValue) -> Option<Symbol> {
        let root = self.const_root();
        self.egraph
            .defs_of(v)
            .iter()
            .find(|t| {
                t.args.len() == 1
                    && t.args[0] == root
                    && matches!(
                        *t.function,
                        SymbolKind::Constant { .. }
                            | SymbolKind::Str(_)
                            | SymbolKind::Synthetic(SyntheticOp::Null | SyntheticOp::Zero)
                    )
            })
            .map(|t| t.function)
    }

    /// The storage location of a slot.
    pub fn address(&mut self, slot: Slot) -> SymbolicValue {
        let f = &self.ctx.functions;
        let function = match slot {
            Slot::Local(l) => f.for_local(l),
            Slot::Parameter(p) => f.for_parameter(p),
            Slot::Temp(t) => f.for_temp(t),
            Slot::Result => f.return_value,
        };
        let root = self.const_root();
        self.lookup_or_create(function, &[root])
    }

    /// A location hanging off `base`. Locations of an unmodified base start out unmodified.
    fn location(&mut self, function: Symbol, args: &[SymbolicValue]) -> SymbolicValue {
        let (loc, fresh) = self.egraph_mut().lookup_or_create(function, args);
        if fresh && args.iter().all(|a| self.is_unmodified(*a)) {
            self.unmodified_since_entry.insert(loc);
            self.unmodified_fields_since_entry.insert(loc);
        }
        loc
    }

    /// The contents of a location, materializing an unknown value on first read.
    pub fn value(&mut self, address: SymbolicValue) -> SymbolicValue {
        let value_of = self.ctx.functions.value_of;
        let (v, fresh) = self.egraph_mut().lookup_or_create(value_of, &[address]);
        if fresh && self.is_unmodified(address) {
            self.unmodified_since_entry.insert(v);
        }
        v
    }

    pub fn try_value(&self, address: SymbolicValue) -> Option<SymbolicValue> {
        self.lookup(self.ctx.functions.value_of, &[address])
    }

    pub fn field_address(
        &mut self,
        object: SymbolicValue,
        field: FieldId,
    ) -> Result<SymbolicValue, HeapError> {
        let function = self.ctx.functions.for_field(self.metadata(), field);
        Ok(self.location(function, &[object]))
    }

    pub fn static_field_address(&mut self, field: FieldId) -> Result<SymbolicValue, HeapError> {
        let root = self.const_root();
        self.field_address(root, field)
    }

    /// The location holding the result of a pure method or getter applied to `args`.
    /// Static methods without arguments hang off the root.
    pub fn pseudo_field_address(
        &mut self,
        method: MethodId,
        args: &[SymbolicValue],
    ) -> SymbolicValue {
        let function = self.ctx.functions.for_pseudo_field(method);
        if args.is_empty() {
            let root = self.const_root();
            self.location(function, &[root])
        } else {
            self.location(function, args)
        }
    }

    pub fn object_version(&mut self, object: SymbolicValue) -> SymbolicValue {
        let f = self.ctx.functions.object_version;
        self.lookup_or_create(f, &[object])
    }

    /// Forget which elements `array` holds.
    pub fn bump_version(&mut self, array: SymbolicValue) {
        let f = self.ctx.functions.object_version;
        self.eliminate(f, &[array]);
    }

    pub fn element_address(&mut self, array: SymbolicValue, index: SymbolicValue) -> SymbolicValue {
        let version = self.object_version(array);
        let f = self.ctx.functions.element_address;
        self.lookup_or_create(f, &[version, index])
    }

    pub fn array_length(&mut self, array: SymbolicValue) -> SymbolicValue {
        let f = self.ctx.functions.length;
        let len = self.lookup_or_create(f, &[array]);
        let int32 = self.metadata().system_types().int32;
        self.refine_type(len, int32);
        len
    }

    pub fn unbox_address(&mut self, boxed: SymbolicValue) -> SymbolicValue {
        let f = self.ctx.functions.unbox_address;
        self.lookup_or_create(f, &[boxed])
    }

    /// Store `value` into `address`.
    pub fn assign_value(&mut self, address: SymbolicValue, value: SymbolicValue) {
        let f = self.ctx.functions.value_of;
        self.egraph_mut().set(f, &[address], value);
        self.mark_modified(address);
    }

    /// Copy the contents of `src` into `dest`. Structs are copied field by field; every
    /// other type copies the single value.
    pub fn copy_value(
        &mut self,
        dest: SymbolicValue,
        src: SymbolicValue,
        ty: TypeId,
    ) -> Result<(), HeapError> {
        if self.metadata().is_struct(ty) {
            return self.copy_struct_value(dest, src, ty);
        }
        let v = self.value(src);
        self.assign_value(dest, v);
        Ok(())
    }

    pub fn copy_struct_value(
        &mut self,
        dest: SymbolicValue,
        src: SymbolicValue,
        ty: TypeId,
    ) -> Result<(), HeapError> {
        for field in self.metadata().instance_fields(ty)? {
            let field_ty = self.metadata().field(field)?.ty;
            let d = self.field_address(dest, field)?;
            let s = self.field_address(src, field)?;
            self.copy_value(d, s, field_ty)?;
        }
        let id = self.fresh();
        self.set_label(id, AbstractType::of_type(ty));
        self.assign_value(dest, id);
        Ok(())
    }

    /// Store the default value of `ty` into `address`.
    pub fn assign_zero(&mut self, address: SymbolicValue, ty: TypeId) -> Result<(), HeapError> {
        self.zero_fill(address, ty)?;
        self.mark_modified(address);
        Ok(())
    }

    /// Store the default value of `ty` without touching the unmodified sets.
    pub(crate) fn zero_fill(
        &mut self,
        address: SymbolicValue,
        ty: TypeId,
    ) -> Result<(), HeapError> {
        let md = self.ctx.metadata.clone();
        let value_of = self.ctx.functions.value_of;
        if md.is_struct(ty) {
            for field in md.instance_fields(ty)? {
                let field_ty = md.field(field)?.ty;
                let fa = self.field_address(address, field)?;
                self.zero_fill(fa, field_ty)?;
            }
            let id = self.fresh();
            self.set_label(id, AbstractType::of_type(ty));
            self.egraph_mut().set(value_of, &[address], id);
        } else {
            let zero = if md.has_value_representation(ty) {
                self.zero()
            } else {
                self.null()
            };
            self.egraph_mut().set(value_of, &[address], zero);
        }
        Ok(())
    }

    pub fn assign_null(&mut self, address: SymbolicValue) {
        let null = self.null();
        self.assign_value(address, null);
    }

    /// Forget everything about the contents of `address`.
    pub fn havoc(&mut self, address: SymbolicValue) {
        trace!(%address, "havoc");
        self.egraph_mut().eliminate_all(address);
        self.mark_modified(address);
    }

    pub fn mark_modified(&mut self, address: SymbolicValue) {
        let a = self.find(address);
        self.unmodified_since_entry.remove(&a);
        self.unmodified_fields_since_entry.remove(&a);
    }

    /// Flag a location as unchanged since entry. Only meaningful while building the entry state.
    pub(crate) fn mark_unmodified(&mut self, address: SymbolicValue) {
        let a = self.find(address);
        self.unmodified_since_entry.insert(a);
    }

    pub fn is_unmodified(&self, v: SymbolicValue) -> bool {
        self.unmodified_since_entry.contains(&self.find(v))
    }

    pub fn is_unmodified_field(&self, v: SymbolicValue) -> bool {
        self.unmodified_fields_since_entry.contains(&self.find(v))
    }

    pub fn unmodified_since_entry(&self) -> &ValueSet {
        &self.unmodified_since_entry
    }

    pub fn modified_at_call(&self) -> &ValueSet {
        &self.modified_at_call
    }

    pub fn set_modified_at_call(&mut self, modified: ValueSet) {
        self.modified_at_call = modified;
    }

    pub fn is_zero(&self, v: SymbolicValue) -> bool {
        self.label(v).is_zero
    }

    /// A value is known non-zero when `v == 0` is known to be false.
    pub fn is_non_zero(&self, v: SymbolicValue) -> bool {
        self.lookup(self.ctx.functions.unary_not, &[v])
            .is_some_and(|n| self.is_zero(n))
    }

    pub fn mark_non_zero(&mut self, v: SymbolicValue) {
        if self.is_zero(v) {
            self.set_bottom();
            return;
        }
        let f = self.ctx.functions.unary_not;
        let n = self.lookup_or_create(f, &[v]);
        let boolean = self.metadata().system_types().boolean;
        self.refine_type(n, boolean);
        self.set_label(n, AbstractType::ZERO);
    }

    /// Identify `v` with the canonical null or zero.
    pub fn mark_zero(&mut self, v: SymbolicValue) {
        if self.is_non_zero(v) {
            self.set_bottom();
            return;
        }
        let is_value = self
            .label(v)
            .declared_type()
            .is_some_and(|t| self.metadata().has_value_representation(t));
        let canonical = if is_value { self.zero() } else { self.null() };
        self.assume_equal(v, canonical);
    }

    /// Merge two values, keeping the auxiliary sets canonical.
    pub fn assume_equal(&mut self, a: SymbolicValue, b: SymbolicValue) {
        if self.find(a) == self.find(b) {
            return;
        }
        self.egraph_mut().assume_equal(a, b);
        let merged = self.find(a);
        if self.is_zero(merged) && self.is_non_zero(merged) {
            self.set_bottom();
        }
        self.canonicalize_sets();
    }

    fn canonicalize_sets(&mut self) {
        let g = &self.egraph;
        self.unmodified_since_entry = self
            .unmodified_since_entry
            .iter()
            .map(|v| g.find(*v))
            .collect();
        self.unmodified_fields_since_entry = self
            .unmodified_fields_since_entry
            .iter()
            .map(|v| g.find(*v))
            .collect();
        self.modified_at_call = self.modified_at_call.iter().map(|v| g.find(*v)).collect();
    }

    /// Restrict the state to executions where `condition` is non-zero (`truth`) or zero.
    ///
    /// `x == 0`, `x != 0` and `isinst` wrappers are looked through, so a doubly negated
    /// condition constrains the value it wraps.
    pub fn assume(&mut self, condition: SymbolicValue, truth: bool) {
        let mut work = vec![(condition, truth)];
        let mut seen = HashSet::new();
        while let Some((v, truth)) = work.pop() {
            if self.is_bottom() {
                return;
            }
            if !seen.insert((self.find(v), truth)) {
                continue;
            }
            trace!(%v, truth, "assume");
            if truth {
                self.mark_non_zero(v);
            } else {
                self.mark_zero(v);
            }
            for def in self.egraph.defs_of(v).to_vec() {
                match &*def.function {
                    SymbolKind::Synthetic(SyntheticOp::UnaryNot) => {
                        work.push((def.args[0], !truth))
                    }
                    SymbolKind::Synthetic(SyntheticOp::NeZero) => work.push((def.args[0], truth)),
                    SymbolKind::Synthetic(SyntheticOp::IsInst(_)) if truth => {
                        work.push((def.args[0], true))
                    }
                    SymbolKind::Binary(BinaryOperator::Ceq) if truth => {
                        self.assume_equal(def.args[0], def.args[1])
                    }
                    SymbolKind::Binary(BinaryOperator::Cne | BinaryOperator::CneUn) if !truth => {
                        self.assume_equal(def.args[0], def.args[1])
                    }
                    _ => {}
                }
            }
        }
    }

    /// Apply `f` to this state and, when an `old(...)` scope is open, to the innermost
    /// entry snapshot as well.
    pub fn for_each_state<F>(&mut self, mut f: F) -> Result<(), HeapError>
    where
        F: FnMut(&mut Domain) -> Result<(), HeapError>,
    {
        let mut frames = std::mem::take(&mut self.old);
        let result = f(self).and_then(|_| match frames.last_mut() {
            Some(frame) => f(&mut frame.domain),
            None => Ok(()),
        });
        self.old = frames;
        result
    }

    pub fn freeze(self) -> FrozenDomain {
        FrozenDomain(Arc::new(self))
    }
}

/// A published state. Published states are never mutated; [`FrozenDomain::thaw`] returns a
/// private copy to continue from.
#[derive(Debug, Clone)]
pub struct FrozenDomain(Arc<Domain>);

impl FrozenDomain {
    pub fn thaw(&self) -> Domain {
        self.0.as_ref().clone()
    }

    pub fn ptr_eq(&self, other: &FrozenDomain) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Deref for FrozenDomain {
    type Target = Domain;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}
