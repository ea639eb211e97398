use crate::error::HeapscopeIlError;
use crate::ids::{FieldId, MethodId, Parameter, TypeId, Visibility};
use serde::{Deserialize, Serialize};

/// The shape of a type, as far as heap modeling cares.
#[derive(Debug, Clone, Copy, Hash, Eq, PartialEq, Serialize, Deserialize)]
pub enum TypeKind {
    Class,
    Interface,
    /// A user-defined value type with fields
    Struct,
    Enum,
    /// Built-in scalars (integers, floats, bool, char, native ints)
    Primitive,
    Array {
        element: TypeId,
    },
    ManagedPointer {
        pointee: TypeId,
    },
    UnmanagedPointer {
        pointee: TypeId,
    },
    /// An unsubstituted generic parameter
    TypeParameter,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeInfo {
    pub name: String,
    pub kind: TypeKind,
    #[serde(default)]
    pub base: Option<TypeId>,
    #[serde(default)]
    pub is_sealed: bool,
    /// Every field declared by this type, static or not
    #[serde(default)]
    pub fields: Vec<FieldId>,
    /// Every method declared by this type
    #[serde(default)]
    pub methods: Vec<MethodId>,
    /// `(virtual method, implementation on this type)` pairs
    #[serde(default)]
    pub overrides: Vec<(MethodId, MethodId)>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldInfo {
    pub name: String,
    pub declaring_type: TypeId,
    pub ty: TypeId,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_readonly: bool,
    pub visibility: Visibility,
    /// For fields of a generic instantiation, the field of the generic definition
    #[serde(default)]
    pub generic_definition: Option<FieldId>,
}

/// The role a method plays for a property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PropertyRole {
    Getter {
        setter: Option<MethodId>,
        /// Present for compiler-generated (auto) properties
        backing_field: Option<FieldId>,
    },
    Setter {
        getter: Option<MethodId>,
        backing_field: Option<FieldId>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MethodInfo {
    pub name: String,
    pub declaring_type: TypeId,
    /// Declared parameter types, not including `this`
    #[serde(default)]
    pub parameters: Vec<TypeId>,
    #[serde(default)]
    pub return_type: Option<TypeId>,
    #[serde(default)]
    pub locals: Vec<TypeId>,
    #[serde(default)]
    pub is_static: bool,
    #[serde(default)]
    pub is_virtual: bool,
    #[serde(default)]
    pub is_constructor: bool,
    pub visibility: Visibility,
    #[serde(default)]
    pub property: Option<PropertyRole>,
    /// Method-level generic arguments of an instantiated generic method
    #[serde(default)]
    pub generic_arguments: Vec<TypeId>,
}

impl MethodInfo {
    pub fn is_property_getter(&self) -> bool {
        matches!(self.property, Some(PropertyRole::Getter { .. }))
    }

    pub fn is_property_setter(&self) -> bool {
        matches!(self.property, Some(PropertyRole::Setter { .. }))
    }

    /// Whether the getter belongs to a compiler-generated property.
    pub fn is_auto_property_getter(&self) -> bool {
        matches!(
            self.property,
            Some(PropertyRole::Getter {
                backing_field: Some(_),
                ..
            })
        )
    }

    /// Number of parameter slots including `this`.
    pub fn parameter_count(&self) -> usize {
        self.parameters.len() + usize::from(!self.is_static)
    }
}

/// The handful of framework types the heap analysis has to name directly.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemTypes {
    pub object: TypeId,
    pub string: TypeId,
    pub int32: TypeId,
    pub boolean: TypeId,
    pub int_ptr: TypeId,
}

/// Read-only oracle over types, fields and methods.
///
/// The heap analysis treats implementors as pure: every query may be repeated
/// arbitrarily and must give consistent answers for the duration of one analysis.
pub trait MetadataProvider: Send + Sync {
    fn type_info(&self, ty: TypeId) -> Result<&TypeInfo, HeapscopeIlError>;

    fn field(&self, field: FieldId) -> Result<&FieldInfo, HeapscopeIlError>;

    fn method(&self, method: MethodId) -> Result<&MethodInfo, HeapscopeIlError>;

    fn system_types(&self) -> &SystemTypes;

    /// The managed pointer type `ref ty`, if the metadata declares one.
    fn managed_pointer(&self, ty: TypeId) -> Option<TypeId>;

    /// Look a method up by the full name of its declaring type and its own name.
    fn find_method(&self, type_name: &str, method_name: &str) -> Option<MethodId>;

    /// The single-dimensional array type of `element`, if the program declares it.
    fn array_type(&self, element: TypeId) -> Option<TypeId>;

    /// The implementation `ty` provides for the virtual `method`, searching base types.
    fn implementing_method(&self, ty: TypeId, method: MethodId) -> Option<MethodId> {
        let mut current = Some(ty);
        while let Some(t) = current {
            let info = self.type_info(t).ok()?;
            if let Some((_, imp)) = info.overrides.iter().find(|(v, _)| *v == method) {
                return Some(*imp);
            }
            if info.methods.contains(&method) {
                return Some(method);
            }
            current = info.base;
        }
        None
    }

    fn type_kind(&self, ty: TypeId) -> Option<TypeKind> {
        self.type_info(ty).ok().map(|t| t.kind)
    }

    fn is_struct(&self, ty: TypeId) -> bool {
        matches!(self.type_kind(ty), Some(TypeKind::Struct))
    }

    fn is_sealed(&self, ty: TypeId) -> bool {
        self.type_info(ty).map(|t| t.is_sealed).unwrap_or(false)
    }

    /// Primitives, enums and pointers are copied as a single value.
    fn has_value_representation(&self, ty: TypeId) -> bool {
        matches!(
            self.type_kind(ty),
            Some(
                TypeKind::Primitive
                    | TypeKind::Enum
                    | TypeKind::ManagedPointer { .. }
                    | TypeKind::UnmanagedPointer { .. }
            )
        )
    }

    fn is_reference_type(&self, ty: TypeId) -> bool {
        matches!(
            self.type_kind(ty),
            Some(TypeKind::Class | TypeKind::Interface | TypeKind::Array { .. })
        )
    }

    fn is_managed_pointer(&self, ty: TypeId) -> bool {
        matches!(self.type_kind(ty), Some(TypeKind::ManagedPointer { .. }))
    }

    fn is_type_parameter(&self, ty: TypeId) -> bool {
        matches!(self.type_kind(ty), Some(TypeKind::TypeParameter))
    }

    fn element_type(&self, ty: TypeId) -> Option<TypeId> {
        match self.type_kind(ty)? {
            TypeKind::Array { element } => Some(element),
            _ => None,
        }
    }

    fn pointee(&self, ty: TypeId) -> Option<TypeId> {
        match self.type_kind(ty)? {
            TypeKind::ManagedPointer { pointee } | TypeKind::UnmanagedPointer { pointee } => {
                Some(pointee)
            }
            _ => None,
        }
    }

    /// Instance fields of `ty` and its base types, base-most first.
    fn instance_fields(&self, ty: TypeId) -> Result<Vec<FieldId>, HeapscopeIlError> {
        let mut chain = vec![];
        let mut current = Some(ty);
        while let Some(t) = current {
            chain.push(t);
            current = self.type_info(t)?.base;
        }
        let mut fields = vec![];
        for t in chain.into_iter().rev() {
            for f in &self.type_info(t)?.fields {
                if !self.field(*f)?.is_static {
                    fields.push(*f);
                }
            }
        }
        Ok(fields)
    }

    /// Getters of compiler-generated instance properties declared on `ty`.
    fn auto_property_getters(&self, ty: TypeId) -> Result<Vec<MethodId>, HeapscopeIlError> {
        let mut getters = vec![];
        for m in &self.type_info(ty)?.methods {
            let info = self.method(*m)?;
            if !info.is_static && info.is_auto_property_getter() {
                getters.push(*m);
            }
        }
        Ok(getters)
    }

    /// The generic definition of a field of an instantiated type.
    fn unspecialized(&self, field: FieldId) -> FieldId {
        self.field(field)
            .ok()
            .and_then(|f| f.generic_definition)
            .unwrap_or(field)
    }

    /// The static type of a parameter slot, `this` included.
    fn parameter_type(
        &self,
        method: MethodId,
        parameter: Parameter,
    ) -> Result<TypeId, HeapscopeIlError> {
        let info = self.method(method)?;
        let index = parameter.0 as usize;
        if info.is_static {
            return info
                .parameters
                .get(index)
                .copied()
                .ok_or(HeapscopeIlError::UnknownMethod(method));
        }
        if index == 0 {
            let declaring = info.declaring_type;
            if self.is_struct(declaring) {
                return Ok(self.managed_pointer(declaring).unwrap_or(declaring));
            }
            return Ok(declaring);
        }
        info.parameters
            .get(index - 1)
            .copied()
            .ok_or(HeapscopeIlError::UnknownMethod(method))
    }

    /// Whether a call to `method` needs generic substitution before its signature
    /// can be interpreted.
    fn needs_specialization(&self, method: MethodId) -> Result<bool, HeapscopeIlError> {
        let info = self.method(method)?;
        if info.generic_arguments.is_empty() {
            return Ok(false);
        }
        Ok(info
            .parameters
            .iter()
            .chain(info.return_type.iter())
            .any(|t| self.is_type_parameter(*t)))
    }
}

/// An in-memory [`MetadataProvider`] built up front or loaded from a program description.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetadataTable {
    types: Vec<TypeInfo>,
    fields: Vec<FieldInfo>,
    methods: Vec<MethodInfo>,
    system: SystemTypes,
}

impl MetadataTable {
    /// Create a table that already declares the system types.
    pub fn new() -> Self {
        let mut table = Self {
            types: vec![],
            fields: vec![],
            methods: vec![],
            system: SystemTypes {
                object: TypeId(0),
                string: TypeId(0),
                int32: TypeId(0),
                boolean: TypeId(0),
                int_ptr: TypeId(0),
            },
        };
        let object = table.add_type("System.Object", TypeKind::Class, None);
        let string = table.add_type("System.String", TypeKind::Class, Some(object));
        table.types[string.0 as usize].is_sealed = true;
        let int32 = table.add_type("System.Int32", TypeKind::Primitive, None);
        let boolean = table.add_type("System.Boolean", TypeKind::Primitive, None);
        let int_ptr = table.add_type("System.IntPtr", TypeKind::Primitive, None);
        table.system = SystemTypes {
            object,
            string,
            int32,
            boolean,
            int_ptr,
        };
        table
    }

    pub fn add_type<S: Into<String>>(
        &mut self,
        name: S,
        kind: TypeKind,
        base: Option<TypeId>,
    ) -> TypeId {
        let id = TypeId(self.types.len() as u32);
        self.types.push(TypeInfo {
            name: name.into(),
            kind,
            base,
            is_sealed: false,
            fields: vec![],
            methods: vec![],
            overrides: vec![],
        });
        id
    }

    /// Mutable access for builders that need to adjust a type after declaring it.
    pub fn type_info_mut(&mut self, ty: TypeId) -> Result<&mut TypeInfo, HeapscopeIlError> {
        self.types
            .get_mut(ty.0 as usize)
            .ok_or(HeapscopeIlError::UnknownType(ty))
    }

    /// Return the `ref ty` type, declaring it on first use.
    pub fn pointer_to(&mut self, ty: TypeId) -> TypeId {
        if let Some(existing) = self.managed_pointer(ty) {
            return existing;
        }
        let name = format!("{}&", self.types[ty.0 as usize].name);
        self.add_type(name, TypeKind::ManagedPointer { pointee: ty }, None)
    }

    /// Return the single-dimensional array type of `element`, declaring it on first use.
    pub fn array_of(&mut self, element: TypeId) -> TypeId {
        if let Some(existing) = self.array_type(element) {
            return existing;
        }
        let name = format!("{}[]", self.types[element.0 as usize].name);
        let object = self.system.object;
        self.add_type(name, TypeKind::Array { element }, Some(object))
    }

    pub fn add_field(&mut self, info: FieldInfo) -> Result<FieldId, HeapscopeIlError> {
        let id = FieldId(self.fields.len() as u32);
        self.type_info_mut(info.declaring_type)?.fields.push(id);
        self.fields.push(info);
        Ok(id)
    }

    pub fn add_method(&mut self, info: MethodInfo) -> Result<MethodId, HeapscopeIlError> {
        let id = MethodId(self.methods.len() as u32);
        self.type_info_mut(info.declaring_type)?.methods.push(id);
        self.methods.push(info);
        Ok(id)
    }

    pub fn types(&self) -> impl Iterator<Item = (TypeId, &TypeInfo)> {
        self.types
            .iter()
            .enumerate()
            .map(|(i, t)| (TypeId(i as u32), t))
    }

    pub fn methods(&self) -> impl Iterator<Item = (MethodId, &MethodInfo)> {
        self.methods
            .iter()
            .enumerate()
            .map(|(i, m)| (MethodId(i as u32), m))
    }
}

impl Default for MetadataTable {
    fn default() -> Self {
        Self::new()
    }
}

impl MetadataProvider for MetadataTable {
    fn type_info(&self, ty: TypeId) -> Result<&TypeInfo, HeapscopeIlError> {
        self.types
            .get(ty.0 as usize)
            .ok_or(HeapscopeIlError::UnknownType(ty))
    }

    fn field(&self, field: FieldId) -> Result<&FieldInfo, HeapscopeIlError> {
        self.fields
            .get(field.0 as usize)
            .ok_or(HeapscopeIlError::UnknownField(field))
    }

    fn method(&self, method: MethodId) -> Result<&MethodInfo, HeapscopeIlError> {
        self.methods
            .get(method.0 as usize)
            .ok_or(HeapscopeIlError::UnknownMethod(method))
    }

    fn system_types(&self) -> &SystemTypes {
        &self.system
    }

    fn managed_pointer(&self, ty: TypeId) -> Option<TypeId> {
        self.types
            .iter()
            .position(|t| t.kind == TypeKind::ManagedPointer { pointee: ty })
            .map(|pos| TypeId(pos as u32))
    }

    fn array_type(&self, element: TypeId) -> Option<TypeId> {
        self.types
            .iter()
            .position(|t| t.kind == TypeKind::Array { element })
            .map(|pos| TypeId(pos as u32))
    }

    fn find_method(&self, type_name: &str, method_name: &str) -> Option<MethodId> {
        self.methods().find_map(|(id, m)| {
            let declaring = self.types.get(m.declaring_type.0 as usize)?;
            (declaring.name == type_name && m.name == method_name).then_some(id)
        })
    }
}
