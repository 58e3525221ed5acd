// opchain/src/pipeline/mod.rs

//! Defines the `Pipeline` struct, its chain construction, lifecycle, and
//! materialization of live operator chains.

pub mod definition;
pub mod lifecycle;
pub mod materialize;
pub mod report;

// Re-export the main Pipeline struct
pub use definition::{OperatorTemplatePtr, Pipeline, PipelineState};
pub use materialize::{OperatorChain, MAX_DOP};
pub use report::CloseReport;
