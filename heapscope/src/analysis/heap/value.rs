use serde::{Deserialize, Serialize};
use sorted_vec::SortedSet;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

/// A node handle in an [`EGraph`](super::egraph::EGraph).
///
/// `index` is the node's slot in the arena of the graph that owns it; `uid` is unique across
/// every graph of one analysis run. Two graphs derived from each other by cloning agree on
/// both, while values created independently in sibling graphs never compare equal.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub struct SymbolicValue {
    pub(crate) index: u32,
    pub(crate) uid: u32,
}

impl SymbolicValue {
    pub fn uid(&self) -> u32 {
        self.uid
    }
}

impl Display for SymbolicValue {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "sv{}", self.uid)
    }
}

/// Hands out run-unique ids for [`SymbolicValue`]s.
///
/// One factory is shared by every graph of a single method analysis, so analyses of
/// different methods never share mutable state.
#[derive(Debug, Clone, Default)]
pub struct ValueFactory {
    next: Arc<AtomicU32>,
}

impl ValueFactory {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn next_uid(&self) -> u32 {
        self.next.fetch_add(1, Ordering::Relaxed)
    }
}

/// An ordered set of symbolic values.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValueSet(SortedSet<SymbolicValue>);

impl ValueSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, v: SymbolicValue) -> bool {
        match self.0.find_or_insert(v) {
            sorted_vec::FindOrInsert::Found(_) => false,
            sorted_vec::FindOrInsert::Inserted(_) => true,
        }
    }

    pub fn remove(&mut self, v: &SymbolicValue) -> bool {
        self.0.remove_item(v).is_some()
    }

    pub fn contains(&self, v: &SymbolicValue) -> bool {
        self.0.binary_search(v).is_ok()
    }

    pub fn is_subset(&self, other: &ValueSet) -> bool {
        self.iter().all(|v| other.contains(v))
    }
}

impl Deref for ValueSet {
    type Target = [SymbolicValue];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl FromIterator<SymbolicValue> for ValueSet {
    fn from_iter<T: IntoIterator<Item = SymbolicValue>>(iter: T) -> Self {
        let mut set = ValueSet::new();
        for v in iter {
            set.insert(v);
        }
        set
    }
}

impl Extend<SymbolicValue> for ValueSet {
    fn extend<T: IntoIterator<Item = SymbolicValue>>(&mut self, iter: T) {
        for v in iter {
            self.insert(v);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_factory_ids_are_unique() {
        let factory = ValueFactory::new();
        let other = factory.clone();
        let a = factory.next_uid();
        let b = other.next_uid();
        assert_ne!(a, b);
    }

    #[test]
    fn test_value_set() {
        let v = |uid| SymbolicValue { index: uid, uid };
        let mut set = ValueSet::new();
        assert!(set.insert(v(3)));
        assert!(set.insert(v(1)));
        assert!(!set.insert(v(3)));
        assert_eq!(&set[..], &[v(1), v(3)]);
        assert!(set.remove(&v(1)));
        assert!(!set.contains(&v(1)));
        let bigger: ValueSet = [v(3), v(4)].into_iter().collect();
        assert!(set.is_subset(&bigger));
    }
}
