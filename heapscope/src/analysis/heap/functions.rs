use crate::error::HeapError;
use heapscope_il::{
    BinaryOperator, ConstValue, FieldId, Local, MetadataProvider, MethodId, Parameter, Temp,
    TypeId, UnaryOperator, Visibility,
};
use internment::Intern;
use std::fmt::{Display, Formatter};

/// Operators the heap analysis introduces on its own.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Ord, PartialOrd)]
pub enum SyntheticOp {
    /// Contents of a storage location
    ValueOf,
    /// Identity of the current contents of an array; rebound when elements may change
    ObjectVersion,
    /// The canonical null reference
    Null,
    /// The canonical zero of value types
    Zero,
    /// `x == 0`
    UnaryNot,
    /// `x != 0`
    NeZero,
    /// Address of an element, keyed by the array's version and the index
    ElementAddress,
    /// Length of an array or string
    Length,
    /// Number of writable bytes behind an unmanaged pointer
    WritableBytes,
    /// Address of the value inside a box
    UnboxAddress,
    /// Storage of the method's return value
    ReturnValue,
    /// `x isinst T`
    IsInst(TypeId),
}

/// A function symbol of the e-graph.
#[derive(Debug, Clone, Hash, Eq, PartialEq)]
pub enum SymbolKind {
    Local(Local),
    Parameter(Parameter),
    /// An (unspecialized) field
    Field(FieldId),
    /// A pure method or property getter read as if it were a field
    PseudoField(MethodId),
    Temp(Temp),
    Constant { value: ConstValue, ty: TypeId },
    Str(String),
    Binary(BinaryOperator),
    Unary(UnaryOperator),
    Synthetic(SyntheticOp),
}

/// Interned [`SymbolKind`]. Equality and hashing are by identity.
pub type Symbol = Intern<SymbolKind>;

/// The catalog of function symbols used while analyzing one method.
///
/// Frequently used synthetic symbols are interned once up front; everything else is
/// interned on demand.
#[derive(Debug, Clone)]
pub struct FunctionsTable {
    pub value_of: Symbol,
    pub object_version: Symbol,
    pub null: Symbol,
    pub zero: Symbol,
    pub unary_not: Symbol,
    pub ne_zero: Symbol,
    pub element_address: Symbol,
    pub length: Symbol,
    pub writable_bytes: Symbol,
    pub unbox_address: Symbol,
    pub return_value: Symbol,
}

impl Default for FunctionsTable {
    fn default() -> Self {
        Self::new()
    }
}

impl FunctionsTable {
    pub fn new() -> Self {
        let s = |op| Intern::new(SymbolKind::Synthetic(op));
        Self {
            value_of: s(SyntheticOp::ValueOf),
            object_version: s(SyntheticOp::ObjectVersion),
            null: s(SyntheticOp::Null),
            zero: s(SyntheticOp::Zero),
            unary_not: s(SyntheticOp::UnaryNot),
            ne_zero: s(SyntheticOp::NeZero),
            element_address: s(SyntheticOp::ElementAddress),
            length: s(SyntheticOp::Length),
            writable_bytes: s(SyntheticOp::WritableBytes),
            unbox_address: s(SyntheticOp::UnboxAddress),
            return_value: s(SyntheticOp::ReturnValue),
        }
    }

    pub fn for_local(&self, local: Local) -> Symbol {
        Intern::new(SymbolKind::Local(local))
    }

    pub fn for_parameter(&self, parameter: Parameter) -> Symbol {
        Intern::new(SymbolKind::Parameter(parameter))
    }

    pub fn for_temp(&self, temp: Temp) -> Symbol {
        Intern::new(SymbolKind::Temp(temp))
    }

    /// Fields of generic instantiations share the symbol of their generic definition.
    pub fn for_field(&self, metadata: &dyn MetadataProvider, field: FieldId) -> Symbol {
        Intern::new(SymbolKind::Field(metadata.unspecialized(field)))
    }

    pub fn for_pseudo_field(&self, method: MethodId) -> Symbol {
        Intern::new(SymbolKind::PseudoField(method))
    }

    pub fn for_constant(&self, value: ConstValue, ty: TypeId) -> Symbol {
        Intern::new(SymbolKind::Constant { value, ty })
    }

    pub fn for_string(&self, s: &str) -> Symbol {
        Intern::new(SymbolKind::Str(s.to_string()))
    }

    pub fn for_binary(&self, op: BinaryOperator) -> Symbol {
        Intern::new(SymbolKind::Binary(op))
    }

    pub fn for_unary(&self, op: UnaryOperator) -> Symbol {
        Intern::new(SymbolKind::Unary(op))
    }

    pub fn for_isinst(&self, ty: TypeId) -> Symbol {
        Intern::new(SymbolKind::Synthetic(SyntheticOp::IsInst(ty)))
    }

    /// Symbols that name a storage location hanging off their argument, and therefore
    /// have to be invalidated when the argument's contents change.
    pub fn acts_as_field(&self, f: Symbol) -> bool {
        matches!(
            *f,
            SymbolKind::Field(_)
                | SymbolKind::PseudoField(_)
                | SymbolKind::Synthetic(SyntheticOp::ValueOf | SyntheticOp::UnboxAddress)
        )
    }

    pub fn is_static(&self, metadata: &dyn MetadataProvider, f: Symbol) -> Result<bool, HeapError> {
        Ok(match *f {
            SymbolKind::Field(id) => metadata.field(id)?.is_static,
            SymbolKind::PseudoField(m) => metadata.method(m)?.is_static,
            _ => false,
        })
    }

    pub fn is_readonly(
        &self,
        metadata: &dyn MetadataProvider,
        f: Symbol,
    ) -> Result<bool, HeapError> {
        Ok(match *f {
            SymbolKind::Field(id) => metadata.field(id)?.is_readonly,
            _ => false,
        })
    }

    /// Symbols that are facts about a value rather than locations, and survive havoc of
    /// everything reachable from it.
    pub fn keep_as_bottom_field(&self, f: Symbol) -> bool {
        matches!(
            *f,
            SymbolKind::Synthetic(
                SyntheticOp::Length
                    | SyntheticOp::WritableBytes
                    | SyntheticOp::UnaryNot
                    | SyntheticOp::NeZero
                    | SyntheticOp::IsInst(_)
            ) | SymbolKind::Binary(_)
                | SymbolKind::Unary(_)
        )
    }

    /// Whether the symbol should be rendered as part of an access path.
    pub fn manifest_field(&self, f: Symbol) -> bool {
        matches!(
            *f,
            SymbolKind::Local(_)
                | SymbolKind::Parameter(_)
                | SymbolKind::Field(_)
                | SymbolKind::PseudoField(_)
                | SymbolKind::Synthetic(SyntheticOp::ValueOf | SyntheticOp::Length)
        )
    }

    /// The declared visibility of a field or pseudo-field symbol.
    pub fn visibility(
        &self,
        metadata: &dyn MetadataProvider,
        f: Symbol,
    ) -> Result<Option<Visibility>, HeapError> {
        Ok(match *f {
            SymbolKind::Field(id) => Some(metadata.field(id)?.visibility),
            SymbolKind::PseudoField(m) => Some(metadata.method(m)?.visibility),
            _ => None,
        })
    }

    pub fn is_externally_visible(
        &self,
        metadata: &dyn MetadataProvider,
        f: Symbol,
    ) -> Result<bool, HeapError> {
        Ok(self
            .visibility(metadata, f)?
            .is_some_and(|v| v.is_externally_visible()))
    }
}

impl Display for SymbolKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            SymbolKind::Local(l) => write!(f, "{l}"),
            SymbolKind::Parameter(p) => write!(f, "{p}"),
            SymbolKind::Field(id) => write!(f, "{id}"),
            SymbolKind::PseudoField(m) => write!(f, "{m}()"),
            SymbolKind::Temp(t) => write!(f, "{t}"),
            SymbolKind::Constant {
                value: ConstValue::Int(i),
                ..
            } => write!(f, "{i}"),
            SymbolKind::Constant {
                value: ConstValue::Float(bits),
                ..
            } => write!(f, "{}", f64::from_bits(*bits)),
            SymbolKind::Str(s) => write!(f, "{s:?}"),
            SymbolKind::Binary(op) => write!(f, "{}", op.name()),
            SymbolKind::Unary(op) => write!(f, "{}", op.name()),
            SymbolKind::Synthetic(SyntheticOp::IsInst(ty)) => write!(f, "isinst {ty}"),
            SymbolKind::Synthetic(op) => write!(f, "{op:?}"),
        }
    }
}
