// opchain/src/error.rs
use anyhow::Error as AnyhowError;
use std::fmt;
use thiserror::Error;

/// Which chain-building or lifecycle invariant a call violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StructuralViolation {
  #[error("set source twice (existing source '{existing}', rejected '{rejected}')")]
  SourceAlreadySet { existing: String, rejected: String },

  #[error("should set source before other operators ('{rejected}' arrived after {existing_len} operator(s))")]
  OperatorsBeforeSource { rejected: String, existing_len: usize },

  #[error("should set a source operator but '{operator}' is not a source")]
  NotASource { operator: String },

  #[error("should set source first (rejected '{operator}')")]
  SourceNotSet { operator: String },

  #[error("should set sink last (sink '{sink}' already set, rejected '{rejected}')")]
  OperatorAfterSink { sink: String, rejected: String },

  #[error("set sink twice (existing sink '{existing}', rejected '{rejected}')")]
  SinkAlreadySet { existing: String, rejected: String },

  #[error("should set a sink operator but '{operator}' is not a sink")]
  NotASink { operator: String },

  #[error("operator '{operator}' reports both source and sink roles")]
  RoleConflict { operator: String },

  #[error("mid-chain operator '{operator}' reports the {role} role")]
  EndpointInMiddle { operator: String, role: &'static str },

  #[error("pipeline is not sealed (state: {state})")]
  NotSealed { state: String },

  #[error("pipeline has not been prepared (state: {state})")]
  NotPrepared { state: String },

  #[error("cannot {operation} a pipeline in state {state}")]
  IllegalState { operation: &'static str, state: String },
}

/// One template that failed to close. Collected, never fatal on its own.
#[derive(Debug)]
pub struct CloseFailure {
  pub index: usize,
  pub operator: String,
  pub error: AnyhowError,
}

impl fmt::Display for CloseFailure {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    write!(f, "#{} '{}': {}", self.index, self.operator, self.error)
  }
}

fn join_close_failures(failures: &[CloseFailure]) -> String {
  failures.iter().map(ToString::to_string).collect::<Vec<_>>().join("; ")
}

#[derive(Debug, Error)]
pub enum OpchainError {
  #[error("Structural error in pipeline {pipeline_id}: {violation}")]
  Structural {
    pipeline_id: u32,
    violation: StructuralViolation,
  },

  #[error("Prepare failed in pipeline {pipeline_id} at {role} operator #{index} '{operator}'. Source: {source}")]
  PrepareFailure {
    pipeline_id: u32,
    index: usize,
    operator: String,
    role: &'static str,
    #[source]
    source: AnyhowError,
  },

  #[error(
    "Materialization failed in pipeline {pipeline_id} for instance {instance} at {role} operator #{index} '{operator}'. Source: {source}"
  )]
  MaterializationFailure {
    pipeline_id: u32,
    instance: u64,
    index: usize,
    operator: String,
    role: &'static str,
    #[source]
    source: AnyhowError,
  },

  #[error("Close failed in pipeline {pipeline_id} for {} operator(s): {}", .failures.len(), join_close_failures(.failures))]
  CloseFailure {
    pipeline_id: u32,
    failures: Vec<CloseFailure>,
  },

  #[error("Configuration type mismatch for operator '{operator}' (expected {expected_type})")]
  ConfigMismatch { operator: String, expected_type: String },

  #[error("Invalid runtime option {key}: {message}")]
  Configuration { key: String, message: String },

  #[error("Error in operator implementation. Source: {source}")]
  OperatorError {
    #[source]
    source: AnyhowError,
  },

  #[error("Internal opchain error: {0}")]
  Internal(String),
}

impl OpchainError {
  pub(crate) fn structural(pipeline_id: u32, violation: StructuralViolation) -> Self {
    OpchainError::Structural { pipeline_id, violation }
  }

  /// The violated invariant, if this is a structural error.
  pub fn violation(&self) -> Option<&StructuralViolation> {
    match self {
      OpchainError::Structural { violation, .. } => Some(violation),
      _ => None,
    }
  }
}

// Operator code returns anyhow::Error; an OpchainError already inside is kept as-is.
impl From<AnyhowError> for OpchainError {
  fn from(err: AnyhowError) -> Self {
    match err.downcast::<OpchainError>() {
      Ok(inner) => inner,
      Err(err) => OpchainError::OperatorError { source: err },
    }
  }
}

pub type OpchainResult<T, E = OpchainError> = std::result::Result<T, E>;
