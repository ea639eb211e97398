use crate::analysis::heap::functions::FunctionsTable;
use crate::analysis::heap::value::ValueFactory;
use crate::analysis::heap::well_known::WellKnownMethods;
use crate::options::HeapAnalysisOptions;
use heapscope_il::{ContractProvider, MetadataProvider, MethodId};
use std::fmt::{Debug, Formatter};
use std::sync::Arc;

/// Everything one method analysis reads but never changes.
///
/// Every [`Domain`](crate::analysis::heap::domain::Domain) of the analysis holds an `Arc` to the
/// same context, so values minted by any of them come from the same [`ValueFactory`].
#[derive(Clone)]
pub struct HeapContext {
    pub metadata: Arc<dyn MetadataProvider>,
    pub contracts: Arc<dyn ContractProvider>,
    pub well_known: Arc<WellKnownMethods>,
    pub options: HeapAnalysisOptions,
    pub functions: FunctionsTable,
    pub factory: ValueFactory,
    /// The method being analyzed
    pub method: MethodId,
}

impl HeapContext {
    pub fn new(
        metadata: Arc<dyn MetadataProvider>,
        contracts: Arc<dyn ContractProvider>,
        method: MethodId,
    ) -> Self {
        let well_known = Arc::new(WellKnownMethods::with_defaults(metadata.as_ref()));
        Self {
            metadata,
            contracts,
            well_known,
            options: HeapAnalysisOptions::default(),
            functions: FunctionsTable::new(),
            factory: ValueFactory::new(),
            method,
        }
    }

    pub fn with_options(mut self, options: HeapAnalysisOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_well_known(mut self, well_known: Arc<WellKnownMethods>) -> Self {
        self.well_known = well_known;
        self
    }

    /// A context for another method that shares providers, options and effect table but
    /// mints its values independently.
    pub fn for_method(&self, method: MethodId) -> Self {
        Self {
            factory: ValueFactory::new(),
            method,
            ..self.clone()
        }
    }

    pub fn metadata(&self) -> &dyn MetadataProvider {
        self.metadata.as_ref()
    }

    pub fn contracts(&self) -> &dyn ContractProvider {
        self.contracts.as_ref()
    }
}

impl Debug for HeapContext {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HeapContext")
            .field("method", &self.method)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}
