use serde::{Deserialize, Serialize};

/// Knobs of the heap analysis.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HeapAnalysisOptions {
    /// Number of joins at a loop head before widening is used instead
    pub widen_after: u32,
    /// Upper bound on the number of block visits of the fixpoint driver
    pub max_iterations: usize,
    /// Opaque calls invalidate every mutable static field
    pub havoc_statics_at_calls: bool,
    /// Property getters are treated as pure accessors
    pub getters_are_pure: bool,
    /// Resolve virtual calls whose receiver type is known exactly
    pub devirtualize: bool,
}

impl Default for HeapAnalysisOptions {
    fn default() -> Self {
        Self {
            widen_after: 2,
            max_iterations: 10_000,
            havoc_statics_at_calls: true,
            getters_are_pure: true,
            devirtualize: true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_options_use_defaults() {
        let options: HeapAnalysisOptions = serde_json::from_str(r#"{"widen_after": 5}"#).unwrap();
        assert_eq!(options.widen_after, 5);
        assert_eq!(options.max_iterations, 10_000);
        assert!(options.devirtualize);
    }
}
