use crate::body::MethodBody;
use crate::contracts::ContractTable;
use crate::error::HeapscopeIlError;
use crate::ids::MethodId;
use crate::metadata::MetadataTable;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// A self-contained unit of work for the heap analysis: the metadata it needs to
/// answer queries, the method contracts, and the decoded bodies to analyze.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Program {
    pub metadata: MetadataTable,
    #[serde(default)]
    pub contracts: ContractTable,
    #[serde(default)]
    pub bodies: Vec<MethodBody>,
}

impl Program {
    pub fn from_json(json: &str) -> Result<Self, HeapscopeIlError> {
        let program: Program = serde_json::from_str(json)?;
        program.validate()?;
        tracing::debug!(bodies = program.bodies.len(), "loaded program");
        Ok(program)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self, HeapscopeIlError> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn to_json(&self) -> Result<String, HeapscopeIlError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn body(&self, method: MethodId) -> Option<&MethodBody> {
        self.bodies.iter().find(|b| b.method == method)
    }

    pub fn validate(&self) -> Result<(), HeapscopeIlError> {
        use crate::metadata::MetadataProvider;
        for body in &self.bodies {
            self.metadata.method(body.method)?;
            body.validate()?;
        }
        Ok(())
    }
}
