// opchain/src/pipeline/materialize.rs

//! Turns a prepared pipeline into live operator chains, one per execution instance.

use crate::core::operator::Operator;
use crate::error::{OpchainError, OpchainResult, StructuralViolation};
use crate::pipeline::definition::{Pipeline, PipelineState};
use crate::pipeline::report::CloseReport;
use tracing::{event, Level};

/// Upper bound on the `dop` accepted by [`Pipeline::instantiate`].
pub const MAX_DOP: usize = 4096;

/// The private live operator chain of one execution instance.
///
/// Operators are ordered source, mid-chain operators, sink. The chain is
/// exclusively owned: nothing in it is shared with other instances built from
/// the same pipeline.
pub struct OperatorChain {
  pipeline_id: u32,
  instance_id: u64,
  operators: Vec<Box<dyn Operator>>,
}

impl OperatorChain {
  pub fn pipeline_id(&self) -> u32 {
    self.pipeline_id
  }

  pub fn instance_id(&self) -> u64 {
    self.instance_id
  }

  pub fn len(&self) -> usize {
    self.operators.len()
  }

  pub fn is_empty(&self) -> bool {
    self.operators.is_empty()
  }

  pub fn operators(&self) -> &[Box<dyn Operator>] {
    &self.operators
  }

  pub fn operators_mut(&mut self) -> &mut [Box<dyn Operator>] {
    &mut self.operators
  }

  pub fn source_mut(&mut self) -> Option<&mut Box<dyn Operator>> {
    self.operators.first_mut()
  }

  pub fn sink_mut(&mut self) -> Option<&mut Box<dyn Operator>> {
    self.operators.last_mut()
  }

  pub fn into_operators(self) -> Vec<Box<dyn Operator>> {
    self.operators
  }

  /// Closes every live operator front to back, collecting failures.
  pub fn close(mut self) -> CloseReport {
    let mut report = CloseReport::new(self.pipeline_id);
    for (index, op) in self.operators.iter_mut().enumerate() {
      let outcome = op.close();
      if let Err(e) = &outcome {
        event!(
          Level::WARN,
          pipeline_id = self.pipeline_id,
          instance_id = self.instance_id,
          index,
          operator = op.name(),
          error = %e,
          "Live operator close failed."
        );
      }
      report.record(index, op.name(), outcome);
    }
    report
  }
}

impl std::fmt::Debug for OperatorChain {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    let names: Vec<&str> = self.operators.iter().map(|op| op.name()).collect();
    f.debug_struct("OperatorChain")
      .field("pipeline_id", &self.pipeline_id)
      .field("instance_id", &self.instance_id)
      .field("operators", &names)
      .finish()
  }
}

impl Pipeline {
  /// Materializes one fresh live chain for a new execution instance.
  ///
  /// Safe to call concurrently from many instances once the pipeline is
  /// prepared; the templates are only read. Every operator is created and then
  /// initialized against its template's descriptor and the runtime state. If
  /// any initialization fails, the operators already initialized for this
  /// instance are closed and dropped and the failure is returned; no partial
  /// chain ever reaches the caller.
  pub fn build_operators(&self) -> OpchainResult<OperatorChain> {
    let state = self.state();
    if state != PipelineState::Prepared {
      event!(Level::ERROR, pipeline_id = self.id, %state, "build_operators on an unprepared pipeline.");
      return Err(OpchainError::structural(
        self.id,
        StructuralViolation::NotPrepared {
          state: state.to_string(),
        },
      ));
    }

    let instance_id = self.context.next_instance_id();
    let runtime_state = self.context.runtime_state();
    let mut operators: Vec<Box<dyn Operator>> = Vec::with_capacity(self.chain_len());

    for (index, template) in self.operators.iter().chain(self.sink.iter()).enumerate() {
      let mut op = template.create_operator();
      if let Err(source) = op.init(template.descriptor(), runtime_state) {
        event!(
          Level::ERROR,
          pipeline_id = self.id,
          instance_id,
          index,
          operator = template.name(),
          error = %source,
          "Live operator init failed, discarding partial chain."
        );
        discard_partial_chain(self.id, instance_id, op, operators);
        return Err(OpchainError::MaterializationFailure {
          pipeline_id: self.id,
          instance: instance_id,
          index,
          operator: template.name().to_string(),
          role: self.role_at(index),
          source,
        });
      }
      operators.push(op);
    }

    event!(
      Level::DEBUG,
      pipeline_id = self.id,
      instance_id,
      chain_len = operators.len(),
      "Live operator chain built."
    );
    Ok(OperatorChain {
      pipeline_id: self.id,
      instance_id,
      operators,
    })
  }

  /// Builds `dop` live chains at once, for schedulers with a fixed degree of parallelism.
  ///
  /// `dop` is clamped to at least 1; more than [`MAX_DOP`] is rejected with
  /// [`OpchainError::Configuration`] before anything is built. Stops at the
  /// first failure, closing the chains already built by this call.
  pub fn instantiate(&self, dop: usize) -> OpchainResult<Vec<OperatorChain>> {
    if dop > MAX_DOP {
      event!(Level::ERROR, pipeline_id = self.id, dop, max = MAX_DOP, "Degree of parallelism out of range.");
      return Err(OpchainError::Configuration {
        key: "dop".to_string(),
        message: format!("{} exceeds the maximum of {}", dop, MAX_DOP),
      });
    }
    let dop = dop.max(1);
    let mut chains = Vec::with_capacity(dop);
    for _ in 0..dop {
      match self.build_operators() {
        Ok(chain) => chains.push(chain),
        Err(e) => {
          for chain in chains {
            let report = chain.close();
            if !report.is_clean() {
              event!(
                Level::WARN,
                pipeline_id = self.id,
                failed = report.failures().len(),
                "Closing sibling chain after failed instantiation reported failures."
              );
            }
          }
          return Err(e);
        }
      }
    }
    event!(Level::DEBUG, pipeline_id = self.id, dop, "Pipeline instantiated.");
    Ok(chains)
  }
}

// The operator whose init failed is closed first, then the initialized ones in reverse.
fn discard_partial_chain(
  pipeline_id: u32,
  instance_id: u64,
  failed: Box<dyn Operator>,
  initialized: Vec<Box<dyn Operator>>,
) {
  for mut op in std::iter::once(failed).chain(initialized.into_iter().rev()) {
    if let Err(e) = op.close() {
      event!(
        Level::WARN,
        pipeline_id,
        instance_id,
        operator = op.name(),
        error = %e,
        "Close of partially built operator failed."
      );
    }
  }
}
