use crate::ids::{FieldId, MethodId};
use serde::{Deserialize, Serialize};

/// Purity and frame information the heap analysis uses to narrow call effects.
pub trait ContractProvider: Send + Sync {
    /// Whether the method is known to have no observable side effects.
    fn is_pure(&self, method: MethodId) -> bool;

    /// The fields the method may write, when it declares a frame.
    fn modifies(&self, method: MethodId) -> Option<&[FieldId]>;

    /// The fields the result of the method depends on, when declared.
    fn reads(&self, method: MethodId) -> Option<&[FieldId]>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodContract {
    pub method: MethodId,
    #[serde(default)]
    pub pure: bool,
    #[serde(default)]
    pub modifies: Option<Vec<FieldId>>,
    #[serde(default)]
    pub reads: Option<Vec<FieldId>>,
}

/// A [`ContractProvider`] backed by a list of per-method contracts.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ContractTable {
    contracts: Vec<MethodContract>,
}

impl ContractTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace the contract of `contract.method`.
    pub fn insert(&mut self, contract: MethodContract) {
        match self.contracts.iter_mut().find(|c| c.method == contract.method) {
            Some(existing) => *existing = contract,
            None => self.contracts.push(contract),
        }
    }

    fn get(&self, method: MethodId) -> Option<&MethodContract> {
        self.contracts.iter().find(|c| c.method == method)
    }
}

impl ContractProvider for ContractTable {
    fn is_pure(&self, method: MethodId) -> bool {
        self.get(method).is_some_and(|c| c.pure)
    }

    fn modifies(&self, method: MethodId) -> Option<&[FieldId]> {
        self.get(method)?.modifies.as_deref()
    }

    fn reads(&self, method: MethodId) -> Option<&[FieldId]> {
        self.get(method)?.reads.as_deref()
    }
}

impl FromIterator<MethodContract> for ContractTable {
    fn from_iter<T: IntoIterator<Item = MethodContract>>(iter: T) -> Self {
        let mut table = Self::new();
        for c in iter {
            table.insert(c);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_insert_replaces() {
        let mut table = ContractTable::new();
        table.insert(MethodContract {
            method: MethodId(1),
            pure: false,
            modifies: Some(vec![FieldId(3)]),
            reads: None,
        });
        table.insert(MethodContract {
            method: MethodId(1),
            pure: true,
            modifies: None,
            reads: Some(vec![FieldId(4)]),
        });
        assert!(table.is_pure(MethodId(1)));
        assert_eq!(table.modifies(MethodId(1)), None);
        assert_eq!(table.reads(MethodId(1)), Some(&[FieldId(4)][..]));
        assert!(!table.is_pure(MethodId(2)));
    }
}
