// opchain/src/pipeline/lifecycle.rs

//! Template-level `prepare` and `close`.

use crate::core::runtime::ExecutionContext;
use std::sync::Arc;
use crate::error::{OpchainError, OpchainResult, StructuralViolation};
use crate::pipeline::definition::{Pipeline, PipelineState};
use crate::pipeline::report::CloseReport;
use tracing::{event, instrument, span, Instrument, Level};

impl Pipeline {
  /// Prepares every template against `ctx`: the ordered sequence first, the sink last.
  ///
  /// `ctx` must be the pipeline's own [`Pipeline::context`]; live operators
  /// built later only ever see that one.
  ///
  /// Fail-fast. The first failing template stops the pass, the pipeline moves
  /// to [`PipelineState::PrepareFailed`] and the failure is returned verbatim
  /// as [`OpchainError::PrepareFailure`]. There is no rollback; callers are
  /// expected to `close` the pipeline. A `close` that lands while templates
  /// are still preparing wins: the pipeline stays closed.
  #[instrument(
        name = "Pipeline::prepare",
        skip_all,
        fields(
            pipeline_id = self.id,
            chain_len = self.chain_len(),
        ),
        err(Display)
    )]
  pub async fn prepare(&self, ctx: &ExecutionContext) -> OpchainResult<()> {
    self.debug_assert_own_context(ctx);
    let state = self.state();
    match state {
      PipelineState::Sealed => {}
      PipelineState::Empty | PipelineState::SourceSet => {
        return Err(OpchainError::structural(
          self.id,
          StructuralViolation::NotSealed {
            state: state.to_string(),
          },
        ));
      }
      _ => {
        return Err(OpchainError::structural(
          self.id,
          StructuralViolation::IllegalState {
            operation: "prepare",
            state: state.to_string(),
          },
        ));
      }
    }

    event!(Level::DEBUG, "Pipeline prepare starting.");

    for (index, template) in self.operators.iter().chain(self.sink.iter()).enumerate() {
      let op_span = span!(Level::DEBUG, "prepare_operator", index, operator = template.name());

      if let Err(source) = template.prepare(ctx).instrument(op_span).await {
        event!(Level::ERROR, index, operator = template.name(), error = %source, "Operator prepare failed.");
        // A concurrent close keeps Closed.
        let _ = self.advance_from_sealed(PipelineState::PrepareFailed);
        let err = OpchainError::PrepareFailure {
          pipeline_id: self.id,
          index,
          operator: template.name().to_string(),
          role: self.role_at(index),
          source,
        };
        self.context.runtime_state().set_error(err.to_string());
        return Err(err);
      }
      event!(Level::TRACE, index, operator = template.name(), "Operator prepared.");
    }

    if let Err(state) = self.advance_from_sealed(PipelineState::Prepared) {
      event!(Level::WARN, %state, "Pipeline left Sealed while preparing, not marking it prepared.");
      return Err(OpchainError::structural(
        self.id,
        StructuralViolation::IllegalState {
          operation: "prepare",
          state: state.to_string(),
        },
      ));
    }
    event!(Level::DEBUG, "Pipeline prepared.");
    Ok(())
  }

  // Only Sealed may move on; anything else (a concurrent close) is kept and returned.
  fn advance_from_sealed(&self, next: PipelineState) -> Result<(), PipelineState> {
    let mut guard = self.state.write();
    if *guard != PipelineState::Sealed {
      return Err(*guard);
    }
    *guard = next;
    Ok(())
  }

  fn debug_assert_own_context(&self, ctx: &ExecutionContext) {
    debug_assert!(
      std::ptr::eq(ctx, Arc::as_ptr(&self.context)),
      "pipeline {} driven with an ExecutionContext other than its own",
      self.id
    );
  }

  /// Closes every template-level operator, then the sink.
  ///
  /// Best-effort: every element is attempted regardless of earlier failures
  /// and all failures come back in the [`CloseReport`]. Legal in any state,
  /// including after a failed or skipped `prepare`. Closing twice is a no-op.
  /// `ctx` must be the pipeline's own [`Pipeline::context`].
  #[instrument(
        name = "Pipeline::close",
        skip_all,
        fields(
            pipeline_id = self.id,
            chain_len = self.chain_len(),
        )
    )]
  pub async fn close(&self, ctx: &ExecutionContext) -> CloseReport {
    self.debug_assert_own_context(ctx);
    let previous = {
      let mut guard = self.state.write();
      let previous = *guard;
      *guard = PipelineState::Closed;
      previous
    };
    if previous == PipelineState::Closed {
      event!(Level::DEBUG, "Pipeline already closed, nothing to do.");
      return CloseReport::already_closed(self.id);
    }

    event!(Level::DEBUG, previous_state = %previous, "Pipeline close starting.");
    let mut report = CloseReport::new(self.id);

    for (index, template) in self.operators.iter().chain(self.sink.iter()).enumerate() {
      let outcome = template.close(ctx).await;
      if let Err(e) = &outcome {
        event!(Level::WARN, index, operator = template.name(), error = %e, "Operator close failed.");
      }
      report.record(index, template.name(), outcome);
    }

    if report.is_clean() {
      event!(Level::DEBUG, closed = report.attempted(), "Pipeline closed.");
    } else {
      event!(
        Level::WARN,
        closed = report.attempted(),
        failed = report.failures().len(),
        "Pipeline closed with failures."
      );
    }
    report
  }
}
