use super::*;
use crate::analysis::heap::functions::FunctionsTable;
use heapscope_il::{FieldId, Local, TypeId};

fn graph() -> (EGraph, FunctionsTable) {
    (EGraph::new(ValueFactory::new()), FunctionsTable::new())
}

fn field(n: u32) -> Symbol {
    internment::Intern::new(crate::analysis::heap::functions::SymbolKind::Field(FieldId(n)))
}

#[test]
fn test_lookup_or_create_is_idempotent() {
    let (mut g, f) = graph();
    let root = g.const_root();
    let (a, fresh) = g.lookup_or_create(f.for_local(Local(0)), &[root]);
    assert!(fresh);
    let (b, fresh) = g.lookup_or_create(f.for_local(Local(0)), &[root]);
    assert!(!fresh);
    assert_eq!(a, b);
    assert!(g.label(a).is_top());
    assert_eq!(g.lookup(f.for_local(Local(0)), &[root]), Some(a));
    assert_eq!(g.lookup(f.for_local(Local(1)), &[root]), None);
}

#[test]
fn test_congruence_after_merge() {
    let (mut g, f) = graph();
    let root = g.const_root();
    let (x, _) = g.lookup_or_create(f.for_local(Local(0)), &[root]);
    let (y, _) = g.lookup_or_create(f.for_local(Local(1)), &[root]);
    let (fx, _) = g.lookup_or_create(field(1), &[x]);
    let (fy, _) = g.lookup_or_create(field(1), &[y]);
    assert!(!g.are_equal(fx, fy));
    g.assume_equal(x, y);
    assert!(g.are_equal(fx, fy));
    assert_eq!(g.lookup(field(1), &[x]), g.lookup(field(1), &[y]));

    // congruence propagates through chains
    let (gx, _) = g.lookup_or_create(field(2), &[fx]);
    assert_eq!(g.lookup(field(2), &[fy]), Some(g.find(gx)));
}

#[test]
fn test_congruence_cascades() {
    let (mut g, f) = graph();
    let root = g.const_root();
    let (a, _) = g.lookup_or_create(f.for_local(Local(0)), &[root]);
    let (b, _) = g.lookup_or_create(f.for_local(Local(1)), &[root]);
    let (fa, _) = g.lookup_or_create(field(1), &[a]);
    let (fb, _) = g.lookup_or_create(field(1), &[b]);
    let (ffa, _) = g.lookup_or_create(field(1), &[fa]);
    let (ffb, _) = g.lookup_or_create(field(1), &[fb]);
    g.assume_equal(a, b);
    assert!(g.are_equal(ffa, ffb));
}

#[test]
fn test_merge_meets_labels() {
    let (mut g, f) = graph();
    let root = g.const_root();
    let (x, _) = g.lookup_or_create(f.for_local(Local(0)), &[root]);
    let (z, _) = g.lookup_or_create(f.zero, &[root]);
    g.set_label(z, AbstractType::ZERO);
    g.set_label(x, AbstractType::of_type(TypeId(3)));
    g.assume_equal(x, z);
    assert_eq!(g.label(x), AbstractType::zero_of(TypeId(3)));
    assert!(!g.is_bottom());
}

#[test]
fn test_set_label_bottom_marks_graph() {
    let (mut g, _) = graph();
    let v = g.fresh();
    g.set_label(v, AbstractType::BOTTOM);
    assert!(g.is_bottom());
    g.set_label(v, AbstractType::TOP);
    assert!(g.label(v).is_bottom());
}

#[test]
fn test_eliminate_all_is_local() {
    let (mut g, f) = graph();
    let root = g.const_root();
    let (a, _) = g.lookup_or_create(f.for_local(Local(0)), &[root]);
    let (b, _) = g.lookup_or_create(f.for_local(Local(1)), &[root]);
    let (va, _) = g.lookup_or_create(f.value_of, &[a]);
    let (vb, _) = g.lookup_or_create(f.value_of, &[b]);
    g.eliminate_all(a);
    assert_eq!(g.lookup(f.value_of, &[a]), None);
    assert_eq!(g.lookup(f.value_of, &[b]), Some(vb));
    // the location itself is still addressable
    assert_eq!(g.lookup(f.for_local(Local(0)), &[root]), Some(a));
    let (fresh, created) = g.lookup_or_create(f.value_of, &[a]);
    assert!(created);
    assert_ne!(fresh, va);
    assert!(g.label(fresh).is_top());
}

#[test]
fn test_reachable_skips_garbage() {
    let (mut g, f) = graph();
    let root = g.const_root();
    let (a, _) = g.lookup_or_create(f.for_local(Local(0)), &[root]);
    let (va, _) = g.lookup_or_create(f.value_of, &[a]);
    let (fa, _) = g.lookup_or_create(field(1), &[va]);
    g.eliminate(f.value_of, &[a]);
    let reachable = g.reachable();
    assert!(reachable.contains(&a));
    assert!(!reachable.contains(&va));
    assert!(!reachable.contains(&fa));
}

/// Two graphs that share an ancestor with locals 0 and 1.
fn split() -> (EGraph, EGraph, FunctionsTable, SymbolicValue, SymbolicValue) {
    let (mut g, f) = graph();
    let root = g.const_root();
    let (l0, _) = g.lookup_or_create(f.for_local(Local(0)), &[root]);
    let (l1, _) = g.lookup_or_create(f.for_local(Local(1)), &[root]);
    (g.clone(), g, f, l0, l1)
}

#[test]
fn test_join_keeps_common_facts() {
    let (mut g1, mut g2, f, l0, l1) = split();
    let (v1, _) = g1.lookup_or_create(f.value_of, &[l0]);
    g1.set(f.value_of, &[l1], v1);
    g1.set_label(v1, AbstractType::of_type(TypeId(7)));
    let (v2, _) = g2.lookup_or_create(f.value_of, &[l0]);
    g2.set(f.value_of, &[l1], v2);
    g2.set_label(v2, AbstractType::of_type(TypeId(7)));

    let (joined, info) = g1.join(&g2, false);
    let a = joined.lookup(f.value_of, &[l0]).unwrap();
    let b = joined.lookup(f.value_of, &[l1]).unwrap();
    assert_eq!(a, b);
    assert_eq!(joined.label(a), AbstractType::of_type(TypeId(7)));
    assert_eq!(info.backward(a), Some((v1, v2)));
    assert!(!info.changed);
}

#[test]
fn test_join_drops_one_sided_facts() {
    let (mut g1, mut g2, f, l0, l1) = split();
    let (v1, _) = g1.lookup_or_create(f.value_of, &[l0]);
    g1.set(f.value_of, &[l1], v1);
    g2.lookup_or_create(f.value_of, &[l0]);
    g2.lookup_or_create(f.value_of, &[l1]);

    let (joined, info) = g1.join(&g2, false);
    let a = joined.lookup(f.value_of, &[l0]).unwrap();
    let b = joined.lookup(f.value_of, &[l1]).unwrap();
    assert_ne!(a, b);
    assert!(info.changed);
    assert_eq!(info.left_forward()[&v1].len(), 2);
}

#[test]
fn test_join_is_upper_bound() {
    let (mut g1, mut g2, f, l0, l1) = split();
    let (v1, _) = g1.lookup_or_create(f.value_of, &[l0]);
    g1.set_label(v1, AbstractType::of_type(TypeId(2)));
    let (w1, _) = g1.lookup_or_create(f.value_of, &[l1]);
    g1.lookup_or_create(field(4), &[w1]);
    let (v2, _) = g2.lookup_or_create(f.value_of, &[l0]);
    g2.set_label(v2, AbstractType::zero_of(TypeId(2)));

    let (joined, _) = g1.join(&g2, false);
    assert!(g1.less_equal(&joined).is_some());
    assert!(g2.less_equal(&joined).is_some());
    assert!(joined.less_equal(&g1).is_none());
}

#[test]
fn test_widening_pairs_left_nodes_once() {
    let (mut g1, mut g2, f, l0, l1) = split();
    let (v1, _) = g1.lookup_or_create(f.value_of, &[l0]);
    g1.set(f.value_of, &[l1], v1);
    g2.lookup_or_create(f.value_of, &[l0]);
    g2.lookup_or_create(f.value_of, &[l1]);

    let (widened, info) = g1.join(&g2, true);
    assert_eq!(info.left_forward()[&v1].len(), 1);
    assert!(widened.node_count() <= g1.node_count());
    assert!(info.changed);
}

#[test]
fn test_bottom_absorption() {
    let (g1, mut bottom, f, l0, _) = split();
    bottom.set_bottom();
    let mut g = g1.clone();
    let (v, _) = g.lookup_or_create(f.value_of, &[l0]);

    let (joined, info) = bottom.join(&g, false);
    assert_eq!(joined.lookup(f.value_of, &[l0]), Some(v));
    assert!(info.changed);
    let (joined, info) = g.join(&bottom, false);
    assert_eq!(joined.lookup(f.value_of, &[l0]), Some(v));
    assert!(!info.changed);

    assert!(g.meet(&bottom).is_bottom());
    assert!(bottom.less_equal(&g).is_some());
    assert!(g.less_equal(&bottom).is_none());
}

#[test]
fn test_less_equal_requires_equalities() {
    let (mut g1, mut g2, f, l0, l1) = split();
    let (v, _) = g1.lookup_or_create(f.value_of, &[l0]);
    g1.set(f.value_of, &[l1], v);
    g2.lookup_or_create(f.value_of, &[l0]);
    g2.lookup_or_create(f.value_of, &[l1]);
    // g1 knows l0 and l1 alias, g2 does not
    let embedding = g1.less_equal(&g2).unwrap();
    assert_eq!(embedding.forward[&g1.find(v)].len(), 2);
    assert!(g2.less_equal(&g1).is_none());
}

#[test]
fn test_meet_adds_facts() {
    let (mut g1, mut g2, f, l0, l1) = split();
    g1.lookup_or_create(f.value_of, &[l0]);
    let (v, _) = g2.lookup_or_create(f.value_of, &[l0]);
    g2.set(f.value_of, &[l1], v);
    g2.set_label(v, AbstractType::of_type(TypeId(9)));
    let met = g1.meet(&g2);
    let a = met.lookup(f.value_of, &[l0]).unwrap();
    assert_eq!(met.lookup(f.value_of, &[l1]), Some(met.find(a)));
    assert_eq!(met.label(a), AbstractType::of_type(TypeId(9)));
    assert!(met.less_equal(&g1).is_some());
    assert!(met.less_equal(&g2).is_some());
}
