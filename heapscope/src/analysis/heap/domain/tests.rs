use super::*;
use crate::analysis::heap::test_support::Fixture;
use heapscope_il::{BlockId, FieldInfo, MethodContract, ProgramPoint, Visibility};

fn domain(fx: &Fixture) -> Domain {
    Domain::new(fx.context(fx.touch))
}

/// A local of type `Node` holding an unknown object.
fn node_local(d: &mut Domain, fx: &Fixture, index: u16) -> (SymbolicValue, SymbolicValue) {
    let address = d.address(Slot::Local(Local(index)));
    let v = d.value(address);
    d.refine_type(v, fx.node);
    d.mark_non_zero(v);
    (address, v)
}

#[test]
fn test_new_state_has_canonical_constants() {
    let fx = Fixture::new();
    let d = domain(&fx);
    assert!(!d.is_bottom());
    assert!(d.is_zero(d.null()));
    assert!(d.is_zero(d.zero()));
    assert_ne!(d.null(), d.zero());
    assert!(d.is_unmodified(d.const_root()));
}

#[test]
fn test_meet_with_bottom_is_bottom() {
    let fx = Fixture::new();
    let mut d = domain(&fx);
    node_local(&mut d, &fx, 0);
    let bottom = Domain::bottom(fx.context(fx.touch));
    assert!(d.meet(&bottom).is_bottom());
    assert!(bottom.meet(&d).is_bottom());
}

#[test]
fn test_join_with_bottom_is_absorbed() {
    let fx = Fixture::new();
    let mut d = domain(&fx);
    let (_, v) = node_local(&mut d, &fx, 0);
    let bottom = Domain::bottom(fx.context(fx.touch));

    let (joined, weaker, _) = d.join(&bottom, false).unwrap();
    assert!(!weaker);
    assert!(joined.egraph().contains(v));
    assert!(joined.is_non_zero(v));

    let (joined, weaker, _) = bottom.join(&d, false).unwrap();
    assert!(weaker);
    assert!(!joined.is_bottom());
    assert!(joined.is_non_zero(v));
}

#[test]
fn test_join_is_upper_bound() {
    let fx = Fixture::new();
    let mut base = domain(&fx);
    let (_, v) = node_local(&mut base, &fx, 0);
    let fa = base.field_address(v, fx.f).unwrap();

    let mut left = base.clone();
    left.assign_zero(fa, fx.int32).unwrap();
    let mut right = base.clone();
    let one = right.fresh();
    right.set_label(one, AbstractType::of_type(fx.int32));
    right.mark_non_zero(one);
    right.assign_value(fa, one);

    let (joined, weaker, _) = left.join(&right, false).unwrap();
    assert!(weaker);
    assert!(left.less_equal(&joined).is_some());
    assert!(right.less_equal(&joined).is_some());
    assert!(joined.less_equal(&left).is_none());
}

#[test]
fn test_join_is_upper_bound_when_one_side_never_read_the_field() {
    let fx = Fixture::new();
    let mut base = domain(&fx);
    let address = base.address(Slot::Parameter(Parameter(1)));
    base.mark_unmodified(address);
    let p = base.value(address);
    base.refine_type(p, fx.node);

    let mut left = base.clone();
    let fa = left.field_address(p, fx.f).unwrap();
    left.assign_zero(fa, fx.int32).unwrap();
    let right = base.clone();
    let function = right.ctx().functions.for_field(right.ctx().metadata(), fx.f);
    assert_eq!(right.lookup(function, &[p]), None);

    let (joined, weaker, info) = left.join(&right, false).unwrap();
    assert!(weaker);
    let jp = joined.find(info.right_forward()[&right.find(p)][0]);
    let location = joined.lookup(function, &[jp]).unwrap();
    assert!(!joined.is_unmodified(location));
    assert!(left.less_equal(&joined).is_some());
    assert!(right.less_equal(&joined).is_some());
}

#[test]
fn test_havoc_forgets_only_the_havocked_location() {
    let fx = Fixture::new();
    let mut d = domain(&fx);
    let (a, va) = node_local(&mut d, &fx, 0);
    let (b, vb) = node_local(&mut d, &fx, 1);
    d.assume_equal(va, vb);
    assert!(d.egraph().are_equal(va, vb));

    d.havoc(a);
    assert_eq!(d.try_value(a), None);
    let fresh = d.value(a);
    assert_ne!(d.find(fresh), d.find(vb));
    assert!(d.label(fresh).is_top());
    // the other local keeps its value and what is known about it
    assert_eq!(d.try_value(b).map(|v| d.find(v)), Some(d.find(vb)));
    assert!(d.is_non_zero(vb));
}

#[test]
fn test_scalar_copy_does_not_touch_fields() {
    let fx = Fixture::new();
    let mut d = domain(&fx);
    let src = d.address(Slot::Local(Local(0)));
    let dest = d.address(Slot::Local(Local(1)));
    let v = d.value(src);
    d.copy_value(dest, src, fx.int32).unwrap();
    assert_eq!(d.try_value(dest), Some(d.find(v)));
    let field = d.ctx().functions.for_field(d.metadata(), fx.pair_a);
    assert_eq!(d.lookup(field, &[dest]), None);
    assert_eq!(d.lookup(field, &[src]), None);
}

#[test]
fn test_struct_copy_copies_every_field() {
    let fx = Fixture::new();
    let mut d = domain(&fx);
    let src = d.address(Slot::Local(Local(0)));
    let dest = d.address(Slot::Local(Local(1)));
    let src_a = d.field_address(src, fx.pair_a).unwrap();
    let a = d.value(src_a);
    d.mark_non_zero(a);
    d.copy_value(dest, src, fx.pair).unwrap();

    for field in [fx.pair_a, fx.pair_b] {
        let s = d.field_address(src, field).unwrap();
        let t = d.field_address(dest, field).unwrap();
        let (sv, tv) = (d.value(s), d.value(t));
        assert_eq!(d.find(sv), d.find(tv));
    }
    let dest_a = d.field_address(dest, fx.pair_a).unwrap();
    let copied = d.value(dest_a);
    assert!(d.is_non_zero(copied));
    let id = d.value(dest);
    assert_eq!(d.label(id).declared_type(), Some(fx.pair));
}

#[test]
fn test_unmodified_is_never_regained() {
    let fx = Fixture::new();
    let mut d = domain(&fx);
    let address = d.address(Slot::Parameter(Parameter(1)));
    d.mark_unmodified(address);
    let entry = d.value(address);
    assert!(d.is_unmodified(address));
    assert!(d.is_unmodified(entry));
    let fa = d.field_address(entry, fx.f).unwrap();
    assert!(d.is_unmodified(fa));
    assert!(d.is_unmodified_field(fa));

    let before = d.clone();
    d.assign_zero(fa, fx.int32).unwrap();
    assert!(!d.is_unmodified(fa));
    assert!(!d.is_unmodified_field(fa));
    // reading does not restore the flag
    d.value(fa);
    d.field_address(entry, fx.f).unwrap();
    assert!(!d.is_unmodified(fa));

    let (joined, weaker, info) = before.join(&d, false).unwrap();
    assert!(weaker);
    let joined_fa = info.left_forward()[&before.find(fa)][0];
    assert!(!joined.is_unmodified(joined_fa));
    let joined_entry = info.left_forward()[&before.find(entry)][0];
    assert!(joined.is_unmodified(joined_entry));
}

#[test]
fn test_zero_facts_contradict() {
    let fx = Fixture::new();
    let mut d = domain(&fx);
    let (_, v) = node_local(&mut d, &fx, 0);
    assert!(d.is_non_zero(v));
    assert!(!d.is_zero(v));
    d.mark_zero(v);
    assert!(d.is_bottom());
}

#[test]
fn test_assume_looks_through_null_checks() {
    let fx = Fixture::new();
    let mut d = domain(&fx);
    let address = d.address(Slot::Local(Local(0)));
    let v = d.value(address);
    d.refine_type(v, fx.object);
    let is_null = d.lookup_or_create(d.ctx().functions.unary_not, &[v]);
    d.refine_type(is_null, fx.boolean);

    let mut taken = d.clone();
    taken.assume(is_null, true);
    assert!(!taken.is_bottom());
    assert!(taken.is_zero(v));
    assert_eq!(taken.find(v), taken.find(taken.null()));

    let mut not_taken = d.clone();
    not_taken.assume(is_null, false);
    assert!(!not_taken.is_bottom());
    assert!(!not_taken.is_zero(v));
    assert!(not_taken.is_non_zero(v));
}

#[test]
fn test_call_havoc_keeps_readonly_fields() {
    let fx = Fixture::new();
    let mut d = domain(&fx);
    let (_, v) = node_local(&mut d, &fx, 0);
    let f = d.field_address(v, fx.f).unwrap();
    let id = d.field_address(v, fx.id).unwrap();
    let (fv, idv) = (d.value(f), d.value(id));

    let mut modified = ValueSet::new();
    d.havoc_object_at_call(v, &mut modified, &HavocScope::fields(None))
        .unwrap();
    assert_eq!(d.try_value(f), None);
    let fresh = d.value(f);
    assert_ne!(d.find(fresh), d.find(fv));
    assert_eq!(d.try_value(id), Some(d.find(idv)));
    assert!(modified.contains(&d.find(f)));
    assert!(!modified.contains(&d.find(id)));
}

#[test]
fn test_call_havoc_respects_modifies() {
    let fx = Fixture::new();
    let mut d = domain(&fx);
    let (_, v) = node_local(&mut d, &fx, 0);
    let f = d.field_address(v, fx.f).unwrap();
    let next = d.field_address(v, fx.next).unwrap();
    let (fv, nextv) = (d.value(f), d.value(next));

    let mut modified = ValueSet::new();
    let modifies = [fx.next];
    d.havoc_object_at_call(v, &mut modified, &HavocScope::fields(Some(&modifies[..])))
        .unwrap();
    assert_eq!(d.try_value(f), Some(d.find(fv)));
    assert_eq!(d.try_value(next), None);
    let fresh = d.value(next);
    assert_ne!(d.find(fresh), d.find(nextv));
}

#[test]
fn test_getter_result_survives_disjoint_call() {
    let mut fx = Fixture::new();
    fx.contracts.insert(MethodContract {
        method: fx.get_name,
        pure: true,
        modifies: None,
        reads: Some(vec![fx.next]),
    });
    let mut d = domain(&fx);
    let (_, v) = node_local(&mut d, &fx, 0);
    let name = d.pseudo_field_address(fx.get_name, &[v]);
    let getter = d.ctx().functions.for_pseudo_field(fx.get_name);

    let mut survives = d.clone();
    let modifies = [fx.f];
    let mut modified = ValueSet::new();
    survives
        .havoc_object_at_call(v, &mut modified, &HavocScope::fields(Some(&modifies[..])))
        .unwrap();
    assert_eq!(survives.lookup(getter, &[v]), Some(name));

    let mut dropped = d.clone();
    let modifies = [fx.next];
    dropped
        .havoc_object_at_call(v, &mut modified, &HavocScope::fields(Some(&modifies[..])))
        .unwrap();
    assert_eq!(dropped.lookup(getter, &[v]), None);
}

#[test]
fn test_field_store_invalidates_dependent_getters() {
    let mut fx = Fixture::new();
    fx.contracts.insert(MethodContract {
        method: fx.get_name,
        pure: true,
        modifies: None,
        reads: Some(vec![fx.next]),
    });
    let mut d = domain(&fx);
    let (_, v) = node_local(&mut d, &fx, 0);
    d.pseudo_field_address(fx.get_name, &[v]);
    let getter = d.ctx().functions.for_pseudo_field(fx.get_name);

    d.invalidate_pseudo_fields(v, fx.f);
    assert!(d.lookup(getter, &[v]).is_some());
    d.invalidate_pseudo_fields(v, fx.next);
    assert!(d.lookup(getter, &[v]).is_none());
}

#[test]
fn test_aggressive_havoc_reaches_locals_and_statics() {
    let fx = Fixture::new();
    let mut d = domain(&fx);
    let (_, v) = node_local(&mut d, &fx, 0);
    let f = d.field_address(v, fx.f).unwrap();
    d.assign_zero(f, fx.int32).unwrap();
    let count = d.static_field_address(fx.count).unwrap();
    d.assign_zero(count, fx.int32).unwrap();

    d.aggressive_havoc().unwrap();
    assert_eq!(d.try_value(f), None);
    assert_eq!(d.try_value(count), None);
    assert!(d.modified_at_call().contains(&d.find(f)));
    assert!(d.modified_at_call().contains(&d.find(count)));
    // the locals themselves still hold the same objects
    assert!(d.is_non_zero(v));
}

#[test]
fn test_old_scope_mirrors_instructions() {
    let fx = Fixture::new();
    let mut entry = domain(&fx);
    let param = entry.address(Slot::Parameter(Parameter(1)));
    entry.mark_unmodified(param);
    let x = entry.value(param);

    let mut d = entry.clone();
    let pc = ProgramPoint::new(BlockId(0), 0);
    d.begin_old(pc, &entry);
    assert_eq!(d.old_depth(), 1);
    d.assign_zero(param, fx.int32).unwrap();
    let stored = d.try_value(param).unwrap();

    let mut writes = 0;
    d.for_each_state(|s| {
        writes += 1;
        let t = s.address(Slot::Temp(Temp(0)));
        let v = s.value(param);
        s.assign_value(t, v);
        Ok(())
    })
    .unwrap();
    assert_eq!(writes, 2);

    d.end_old(Temp(0), Temp(1), fx.int32).unwrap();
    assert_eq!(d.old_depth(), 0);
    let t1 = d.address(Slot::Temp(Temp(1)));
    let old = d.value(t1);
    assert_eq!(d.find(old), d.find(x));
    assert_ne!(d.find(old), d.find(stored));
    assert!(matches!(d.end_old(Temp(0), Temp(1), fx.int32), Err(HeapError::UnbalancedOld)));
}

#[test]
fn test_join_rejects_mismatched_old_scopes() {
    let fx = Fixture::new();
    let entry = domain(&fx);
    let mut inside = entry.clone();
    inside.begin_old(ProgramPoint::new(BlockId(0), 0), &entry);
    assert!(matches!(
        entry.join(&inside, false),
        Err(HeapError::OldScopeMismatch)
    ));
}

#[test]
fn test_access_paths_render_fields() {
    let fx = Fixture::new();
    let mut d = domain(&fx);
    let this = d.address(Slot::Parameter(Parameter(0)));
    let v = d.value(this);
    let f = d.field_address(v, fx.f).unwrap();
    let fv = d.value(f);
    let count = d.static_field_address(fx.count).unwrap();
    let cv = d.value(count);

    assert_eq!(d.access_path(v).as_deref(), Some("this"));
    assert_eq!(d.access_path(fv).as_deref(), Some("this.F"));
    assert_eq!(d.access_path(cv).as_deref(), Some("Test.Node.Count"));
    let paths = d.access_paths();
    assert_eq!(paths.get("this.F"), Some(&fv));
    assert!(d.to_string().contains("this.F = "));
}

#[test]
fn test_caller_visible_paths_skip_private_fields() {
    let mut fx = Fixture::new();
    let secret = fx
        .metadata
        .add_field(FieldInfo {
            name: "secret".into(),
            declaring_type: fx.node,
            ty: fx.int32,
            is_static: false,
            is_readonly: false,
            visibility: Visibility::Private,
            generic_definition: None,
        })
        .unwrap();
    let mut d = domain(&fx);
    let this = d.address(Slot::Parameter(Parameter(0)));
    let v = d.value(this);
    let f = d.field_address(v, fx.f).unwrap();
    let fv = d.value(f);
    let hidden = d.field_address(v, secret).unwrap();
    let hv = d.value(hidden);
    let count = d.static_field_address(fx.count).unwrap();
    let cv = d.value(count);
    let (_, local) = node_local(&mut d, &fx, 0);

    assert_eq!(d.caller_visible_access_path(fv).as_deref(), Some("this.F"));
    assert_eq!(
        d.caller_visible_access_path(cv).as_deref(),
        Some("Test.Node.Count")
    );
    assert_eq!(d.access_path(hv).as_deref(), Some("this.secret"));
    assert_eq!(d.caller_visible_access_path(hv), None);
    assert!(d.access_path(local).is_some());
    assert_eq!(d.caller_visible_access_path(local), None);
}
