pub mod descriptor;
pub mod operator;
pub mod options;
pub mod runtime;

// Re-export key types for easier access from other opchain modules (and lib.rs)
pub use descriptor::OperatorDescriptor;
pub use operator::{Operator, OperatorTemplate};
pub use options::RuntimeOptions;
pub use runtime::{ExecutionContext, RuntimeState};
