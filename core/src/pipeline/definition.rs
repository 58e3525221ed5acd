// opchain/src/pipeline/definition.rs

//! Contains the `Pipeline` struct definition and the three chain-building
//! operations (`set_source`, `add_operator`, `set_sink`).

use crate::core::operator::OperatorTemplate;
use crate::core::runtime::ExecutionContext;
use crate::error::{OpchainError, OpchainResult, StructuralViolation};
use parking_lot::RwLock;
use std::fmt;
use std::sync::Arc;
use tracing::{event, Level};

pub type OperatorTemplatePtr = Arc<dyn OperatorTemplate>;

/// Where a pipeline is in its life.
///
/// `Empty → SourceSet → Sealed → Prepared → Closed`. A failed `prepare` moves
/// to `PrepareFailed`, from which only `close` is legal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineState {
  Empty,
  SourceSet,
  Sealed,
  Prepared,
  PrepareFailed,
  Closed,
}

impl fmt::Display for PipelineState {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let name = match self {
      PipelineState::Empty => "Empty",
      PipelineState::SourceSet => "SourceSet",
      PipelineState::Sealed => "Sealed",
      PipelineState::Prepared => "Prepared",
      PipelineState::PrepareFailed => "PrepareFailed",
      PipelineState::Closed => "Closed",
    };
    f.write_str(name)
  }
}

/// A linear chain of operator templates: one source, any number of mid-chain
/// operators, one sink.
///
/// Built single-threaded during plan translation, then shared (usually behind
/// an `Arc`) by every execution instance that materializes it.
pub struct Pipeline {
  pub(crate) id: u32,
  /// Source first, then mid-chain operators. The sink is not in here.
  pub(crate) operators: Vec<OperatorTemplatePtr>,
  pub(crate) source: Option<OperatorTemplatePtr>,
  pub(crate) sink: Option<OperatorTemplatePtr>,
  pub(crate) context: Arc<ExecutionContext>,
  pub(crate) state: RwLock<PipelineState>,
}

impl Pipeline {
  pub fn new(id: u32, context: Arc<ExecutionContext>) -> Self {
    Self {
      id,
      operators: Vec::new(),
      source: None,
      sink: None,
      context,
      state: RwLock::new(PipelineState::Empty),
    }
  }

  pub fn id(&self) -> u32 {
    self.id
  }

  pub fn context(&self) -> &Arc<ExecutionContext> {
    &self.context
  }

  pub fn state(&self) -> PipelineState {
    *self.state.read()
  }

  pub fn is_sealed(&self) -> bool {
    self.source.is_some() && self.sink.is_some()
  }

  pub fn source(&self) -> Option<&OperatorTemplatePtr> {
    self.source.as_ref()
  }

  pub fn sink(&self) -> Option<&OperatorTemplatePtr> {
    self.sink.as_ref()
  }

  /// The ordered template sequence: source followed by mid-chain operators.
  pub fn operators(&self) -> &[OperatorTemplatePtr] {
    &self.operators
  }

  /// Number of live operators one `build_operators` call produces.
  pub fn chain_len(&self) -> usize {
    self.operators.len() + usize::from(self.sink.is_some())
  }

  /// Role of the `index`-th live operator: "source", "mid" or "sink".
  pub(crate) fn role_at(&self, index: usize) -> &'static str {
    if index == 0 {
      "source"
    } else if self.sink.is_some() && index + 1 == self.chain_len() {
      "sink"
    } else {
      "mid"
    }
  }

  fn reject(&self, violation: StructuralViolation) -> OpchainError {
    event!(Level::ERROR, pipeline_id = self.id, %violation, "Chain-building call rejected.");
    OpchainError::structural(self.id, violation)
  }

  pub fn set_source(&mut self, source: OperatorTemplatePtr) -> OpchainResult<()> {
    if let Some(existing) = &self.source {
      return Err(self.reject(StructuralViolation::SourceAlreadySet {
        existing: existing.name().to_string(),
        rejected: source.name().to_string(),
      }));
    }
    if !self.operators.is_empty() {
      return Err(self.reject(StructuralViolation::OperatorsBeforeSource {
        rejected: source.name().to_string(),
        existing_len: self.operators.len(),
      }));
    }
    if !source.is_source() {
      return Err(self.reject(StructuralViolation::NotASource {
        operator: source.name().to_string(),
      }));
    }
    if source.is_sink() {
      return Err(self.reject(StructuralViolation::RoleConflict {
        operator: source.name().to_string(),
      }));
    }

    event!(Level::DEBUG, pipeline_id = self.id, operator = source.name(), "Source set.");
    self.operators.push(Arc::clone(&source));
    self.source = Some(source);
    *self.state.get_mut() = PipelineState::SourceSet;
    Ok(())
  }

  pub fn add_operator(&mut self, op: OperatorTemplatePtr) -> OpchainResult<()> {
    if self.source.is_none() {
      return Err(self.reject(StructuralViolation::SourceNotSet {
        operator: op.name().to_string(),
      }));
    }
    if let Some(sink) = &self.sink {
      return Err(self.reject(StructuralViolation::OperatorAfterSink {
        sink: sink.name().to_string(),
        rejected: op.name().to_string(),
      }));
    }
    if op.is_source() || op.is_sink() {
      return Err(self.reject(StructuralViolation::EndpointInMiddle {
        operator: op.name().to_string(),
        role: if op.is_source() { "source" } else { "sink" },
      }));
    }

    event!(
      Level::DEBUG,
      pipeline_id = self.id,
      operator = op.name(),
      position = self.operators.len(),
      "Operator added."
    );
    self.operators.push(op);
    Ok(())
  }

  pub fn set_sink(&mut self, sink: OperatorTemplatePtr) -> OpchainResult<()> {
    if let Some(existing) = &self.sink {
      return Err(self.reject(StructuralViolation::SinkAlreadySet {
        existing: existing.name().to_string(),
        rejected: sink.name().to_string(),
      }));
    }
    if !sink.is_sink() {
      return Err(self.reject(StructuralViolation::NotASink {
        operator: sink.name().to_string(),
      }));
    }
    if sink.is_source() {
      return Err(self.reject(StructuralViolation::RoleConflict {
        operator: sink.name().to_string(),
      }));
    }
    if self.source.is_none() {
      return Err(self.reject(StructuralViolation::SourceNotSet {
        operator: sink.name().to_string(),
      }));
    }

    event!(
      Level::DEBUG,
      pipeline_id = self.id,
      operator = sink.name(),
      chain_len = self.operators.len() + 1,
      "Sink set, pipeline sealed."
    );
    self.sink = Some(sink);
    *self.state.get_mut() = PipelineState::Sealed;
    Ok(())
  }
}

impl fmt::Debug for Pipeline {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let names: Vec<&str> = self
      .operators
      .iter()
      .chain(self.sink.iter())
      .map(|t| t.name())
      .collect();
    f.debug_struct("Pipeline")
      .field("id", &self.id)
      .field("state", &self.state())
      .field("chain", &names.join(" -> "))
      .finish()
  }
}
