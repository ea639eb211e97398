pub mod analysis;
mod context;
pub mod display;
mod error;
pub mod options;

pub use heapscope_il as il;

pub use analysis::heap::analysis::{HeapAnalysisResult, analyze_method, analyze_program};
pub use context::HeapContext;
pub use error::HeapError;
pub use options::HeapAnalysisOptions;
