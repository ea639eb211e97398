use crate::{BlockId, FieldId, MethodId, TypeId};
use thiserror::Error;

/// An error answering a metadata query or loading a program description.
#[derive(Debug, Error)]
pub enum HeapscopeIlError {
    /// A [`TypeId`] was used that the metadata provider never handed out
    #[error("unknown type {0}")]
    UnknownType(TypeId),
    /// A [`FieldId`] was used that the metadata provider never handed out
    #[error("unknown field {0}")]
    UnknownField(FieldId),
    /// A [`MethodId`] was used that the metadata provider never handed out
    #[error("unknown method {0}")]
    UnknownMethod(MethodId),
    /// The metadata does not declare one of the system types the analysis relies on
    #[error("metadata does not declare the system type {0}")]
    MissingSystemType(&'static str),
    /// A method body has no blocks
    #[error("method body of {0} has no blocks")]
    EmptyBody(MethodId),
    /// An edge or entry of a method body references a block that does not exist
    #[error("method body of {method} references missing block {block}")]
    DanglingBlock { method: MethodId, block: BlockId },
    /// A program description could not be decoded
    #[error("failed to decode program description")]
    Decode(#[from] serde_json::Error),
    /// A program description could not be read from disk
    #[error("failed to read program description")]
    Io(#[from] std::io::Error),
}
