use heapscope_il::{HeapscopeIlError, ProgramPoint};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HeapError {
    #[error("Error answering a metadata query")]
    Il(#[from] HeapscopeIlError),
    #[error("Instruction `{opcode}` at {pc} cannot reach the heap analysis; the control-flow graph is malformed")]
    UnexpectedInstruction { pc: ProgramPoint, opcode: &'static str },
    #[error("`end_old` without a matching `begin_old`")]
    UnbalancedOld,
    #[error("The entry state was requested before it was computed")]
    MissingEntryState,
    #[error("Attempted to join states with different `old(...)` scopes")]
    OldScopeMismatch,
    #[error("The heap analysis does not implement {0}")]
    Unimplemented(&'static str),
    #[error("The fixpoint did not stabilize within {0} block visits")]
    IterationLimit(usize),
}
