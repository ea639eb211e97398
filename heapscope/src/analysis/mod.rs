pub mod cfg;
pub mod cpa;
pub mod heap;
