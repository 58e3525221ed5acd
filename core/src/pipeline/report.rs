// opchain/src/pipeline/report.rs

//! Aggregated outcome of a best-effort close.

use crate::error::{CloseFailure, OpchainError, OpchainResult};

/// Every close failure of one close pass, in chain order.
///
/// A report is never fatal by itself; the caller decides via
/// [`CloseReport::into_result`] whether leaked resources should fail the query.
#[derive(Debug, Default)]
#[must_use = "close failures are only visible through the report"]
pub struct CloseReport {
  pipeline_id: u32,
  attempted: usize,
  failures: Vec<CloseFailure>,
  already_closed: bool,
}

impl CloseReport {
  pub(crate) fn new(pipeline_id: u32) -> Self {
    Self {
      pipeline_id,
      ..Self::default()
    }
  }

  pub(crate) fn already_closed(pipeline_id: u32) -> Self {
    Self {
      pipeline_id,
      already_closed: true,
      ..Self::default()
    }
  }

  pub(crate) fn record(&mut self, index: usize, operator: &str, outcome: anyhow::Result<()>) {
    self.attempted += 1;
    if let Err(error) = outcome {
      self.failures.push(CloseFailure {
        index,
        operator: operator.to_string(),
        error,
      });
    }
  }

  pub fn pipeline_id(&self) -> u32 {
    self.pipeline_id
  }

  /// How many elements a close was attempted on.
  pub fn attempted(&self) -> usize {
    self.attempted
  }

  pub fn failures(&self) -> &[CloseFailure] {
    &self.failures
  }

  pub fn is_clean(&self) -> bool {
    self.failures.is_empty()
  }

  /// True when the pipeline had been closed before and nothing was attempted.
  pub fn was_already_closed(&self) -> bool {
    self.already_closed
  }

  pub fn into_failures(self) -> Vec<CloseFailure> {
    self.failures
  }

  pub fn into_result(self) -> OpchainResult<()> {
    if self.failures.is_empty() {
      Ok(())
    } else {
      Err(OpchainError::CloseFailure {
        pipeline_id: self.pipeline_id,
        failures: self.failures,
      })
    }
  }
}
