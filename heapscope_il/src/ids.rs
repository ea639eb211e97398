use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// Identity of a type known to a [`MetadataProvider`](crate::MetadataProvider).
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypeId(pub u32);

/// Identity of a field. Fields of generic instantiations point back to their
/// generic definition through [`FieldInfo::generic_definition`](crate::FieldInfo).
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldId(pub u32);

/// Identity of a method, constructor or property accessor.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MethodId(pub u32);

/// A local variable slot of the analyzed method.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Local(pub u16);

/// A parameter slot. For instance methods, parameter 0 is `this`.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Parameter(pub u16);

/// An evaluation-stack slot. Decoded instructions name their operands and results by
/// stack slot instead of pushing and popping.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Temp(pub u16);

#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd, Serialize, Deserialize)]
pub enum Visibility {
    Private,
    FamilyAndAssembly,
    Assembly,
    Family,
    FamilyOrAssembly,
    Public,
}

impl Visibility {
    /// Whether a member with this visibility can be named outside its declaring type.
    pub fn is_externally_visible(&self) -> bool {
        !matches!(self, Visibility::Private)
    }
}

impl Display for TypeId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "type#{}", self.0)
    }
}

impl Display for FieldId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "field#{}", self.0)
    }
}

impl Display for MethodId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "method#{}", self.0)
    }
}

impl Display for Local {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "loc{}", self.0)
    }
}

impl Display for Parameter {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "arg{}", self.0)
    }
}

impl Display for Temp {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "s{}", self.0)
    }
}
