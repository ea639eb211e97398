use heapscope_il::{MetadataProvider, MethodId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::trace;

/// Built-in models for framework methods whose effect the generic call handling would
/// either over- or under-approximate.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum MethodEffect {
    /// Anything not provably immutable may change (monitor operations)
    AggressiveHavoc,
    /// The result is a fresh object of the receiver's type with the receiver's field values
    MemberwiseClone,
    /// The result is the length of the array receiver
    ArrayLength,
    /// The result is the length of the string receiver
    StringLength,
    /// The result is `a == b` on references
    ReferenceEquality,
    /// No side effects; the result is a function of the arguments
    Pure,
}

/// A framework method with a built-in model, registered by name.
pub struct WellKnownMethod {
    pub type_name: &'static str,
    pub method_name: &'static str,
    pub effect: MethodEffect,
}

inventory::collect!(WellKnownMethod);

#[macro_export]
macro_rules! register_well_known {
    ($type_name:literal, $method_name:literal, $effect:ident) => {
        inventory::submit! {
            $crate::analysis::heap::well_known::WellKnownMethod {
                type_name: $type_name,
                method_name: $method_name,
                effect: $crate::analysis::heap::well_known::MethodEffect::$effect,
            }
        }
    };
}

register_well_known!("System.Threading.Monitor", "Exit", AggressiveHavoc);
register_well_known!("System.Threading.Monitor", "Wait", AggressiveHavoc);
register_well_known!("System.Object", "MemberwiseClone", MemberwiseClone);
register_well_known!("System.Array", "get_Length", ArrayLength);
register_well_known!("System.String", "get_Length", StringLength);
register_well_known!("System.Object", "ReferenceEquals", ReferenceEquality);
register_well_known!("System.String", "op_Equality", Pure);
register_well_known!("System.String", "op_Inequality", Pure);
register_well_known!("System.Object", "GetType", Pure);

/// Effects of the well-known methods of one program.
#[derive(Debug, Clone, Default)]
pub struct WellKnownMethods {
    effects: HashMap<MethodId, MethodEffect>,
}

impl WellKnownMethods {
    /// An empty table; every call goes through generic call handling.
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolve every registered method that the program references.
    pub fn with_defaults(metadata: &dyn MetadataProvider) -> Self {
        let mut table = Self::new();
        for entry in inventory::iter::<WellKnownMethod> {
            if let Some(method) = metadata.find_method(entry.type_name, entry.method_name) {
                trace!(
                    type_name = entry.type_name,
                    method_name = entry.method_name,
                    "resolved well-known method"
                );
                table.insert(method, entry.effect);
            }
        }
        table
    }

    pub fn insert(&mut self, method: MethodId, effect: MethodEffect) {
        self.effects.insert(method, effect);
    }

    pub fn effect(&self, method: MethodId) -> Option<MethodEffect> {
        self.effects.get(&method).copied()
    }

    pub fn len(&self) -> usize {
        self.effects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.effects.is_empty()
    }
}
