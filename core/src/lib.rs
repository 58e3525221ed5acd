// src/lib.rs

//! opchain: pipeline assembly and lifecycle control for a vectorized query engine.
//!
//! A [`Pipeline`] is a linear chain of operator templates with exactly one
//! source and one sink. It is built once during plan translation and then
//! materialized many times, once per parallel execution instance, into
//! private live [`OperatorChain`]s:
//!  - Chain building enforces its ordering invariants at every call.
//!  - `prepare` runs template-level setup once, fail-fast.
//!  - `build_operators` creates and initializes a live chain; safe to call concurrently.
//!  - `close` releases template-level resources best-effort and reports every failure.

pub mod core;
pub mod error;
pub mod pipeline;

// --- Re-exports for the Public API ---

pub use crate::core::descriptor::OperatorDescriptor;
pub use crate::core::operator::{Operator, OperatorTemplate};
pub use crate::core::options::RuntimeOptions;
pub use crate::core::runtime::{ExecutionContext, RuntimeState};

pub use crate::pipeline::{CloseReport, OperatorChain, OperatorTemplatePtr, Pipeline, PipelineState, MAX_DOP};

pub use crate::error::{CloseFailure, OpchainError, OpchainResult, StructuralViolation};

/*
    Lifecycle of one pipeline:
    1. Plan translation creates `Pipeline::new(id, ctx)` and calls
       `set_source`, then `add_operator` for each mid-chain template, then `set_sink`.
    2. The coordinator awaits `pipeline.prepare(&ctx)` once.
    3. Each execution instance calls `pipeline.build_operators()` and owns the
       returned `OperatorChain`; it closes that chain itself when done.
    4. At shutdown the coordinator awaits `pipeline.close(&ctx)` and inspects
       the `CloseReport`.
*/
