// opchain/src/core/operator.rs

//! Defines the `Operator` trait for live, per-instance operators and the
//! `OperatorTemplate` trait that manufactures them.

use crate::core::descriptor::OperatorDescriptor;
use crate::core::runtime::{ExecutionContext, RuntimeState};
use async_trait::async_trait;

/// A stateful runtime operator owned by exactly one execution instance.
///
/// `Send` so a chain can move onto a worker thread; deliberately not `Sync`.
/// The data-processing surface (push/pull of chunks) belongs to the scheduler
/// and concrete operator crates; this trait only carries what the pipeline
/// needs to materialize and dispose of an instance.
pub trait Operator: Send {
  fn name(&self) -> &str;

  /// Initializes against the originating template's configuration and the runtime state.
  fn init(&mut self, descriptor: &OperatorDescriptor, state: &RuntimeState) -> anyhow::Result<()>;

  fn close(&mut self) -> anyhow::Result<()> {
    Ok(())
  }
}

/// Immutable, shareable descriptor of one relational operator and factory for its live instances.
///
/// Implementations must be safe to call concurrently: many execution instances
/// materialize from the same template at once.
#[async_trait]
pub trait OperatorTemplate: Send + Sync {
  fn name(&self) -> &str;

  fn descriptor(&self) -> &OperatorDescriptor;

  fn is_source(&self) -> bool {
    false
  }

  fn is_sink(&self) -> bool {
    false
  }

  /// Template-level preparation, run once per pipeline before any instance is built.
  async fn prepare(&self, ctx: &ExecutionContext) -> anyhow::Result<()> {
    let _ = ctx;
    Ok(())
  }

  /// Releases template-level resources. Live operators are closed by their instance.
  async fn close(&self, ctx: &ExecutionContext) -> anyhow::Result<()> {
    let _ = ctx;
    Ok(())
  }

  fn create_operator(&self) -> Box<dyn Operator>;
}

impl std::fmt::Debug for dyn OperatorTemplate {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("OperatorTemplate")
      .field("name", &self.name())
      .field("plan_node_id", &self.descriptor().plan_node_id())
      .field("is_source", &self.is_source())
      .field("is_sink", &self.is_sink())
      .finish()
  }
}
