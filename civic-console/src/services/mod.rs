pub mod aggregation;
pub mod crop;
pub mod filter;
pub mod workflow;
