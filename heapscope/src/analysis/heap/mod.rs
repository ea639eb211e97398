//! An abstract interpretation of method bodies that tracks which heap locations hold equal
//! values, which values are provably zero or non-zero, and what is unchanged since entry.
//!
//! Every program point carries a [`domain::Domain`]: a congruence-closed
//! [`egraph::EGraph`] over the function symbols of [`functions::FunctionsTable`], labeled
//! with [`abstract_type::AbstractType`]s. [`decoder::AnalysisDecoder`] gives instructions
//! their meaning and [`analysis::HeapAnalysis`] drives the fixpoint.
pub mod abstract_type;
pub mod analysis;
pub mod decoder;
pub mod domain;
pub mod egraph;
pub mod functions;
pub mod value;
pub mod well_known;

#[cfg(test)]
pub(crate) mod test_support;
