pub mod body;
pub mod contracts;
pub mod display;
pub(crate) mod error;
pub(crate) mod ids;
pub mod instruction;
pub mod metadata;
pub mod program;

pub use body::{BasicBlock, BlockId, Edge, EdgeGuard, MethodBody, ProgramPoint};
pub use contracts::{ContractProvider, ContractTable, MethodContract};
pub use display::{IlDisplay, IlDisplayWrapper};
pub use error::HeapscopeIlError;
pub use ids::{FieldId, Local, MethodId, Parameter, Temp, TypeId, Visibility};
pub use instruction::{BinaryOperator, ConstValue, Instruction, UnaryOperator};
pub use metadata::{
    FieldInfo, MetadataProvider, MetadataTable, MethodInfo, PropertyRole, SystemTypes, TypeInfo,
    TypeKind,
};
pub use program::Program;
