// opchain/src/core/runtime.rs

//! Runtime state and the fragment-scoped execution context pipelines are bound to.

use crate::core::options::RuntimeOptions;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Per-query state every template and live operator initializes against.
#[derive(Debug, Default)]
pub struct RuntimeState {
  query_id: Option<String>,
  options: RuntimeOptions,
  first_error: Mutex<Option<String>>,
}

impl RuntimeState {
  pub fn new(query_id: impl Into<String>, options: RuntimeOptions) -> Self {
    Self {
      query_id: Some(query_id.into()),
      options,
      first_error: Mutex::new(None),
    }
  }

  pub fn query_id(&self) -> Option<&str> {
    self.query_id.as_deref()
  }

  pub fn options(&self) -> &RuntimeOptions {
    &self.options
  }

  pub fn chunk_size(&self) -> usize {
    self.options.chunk_size
  }

  /// Records `err` unless an earlier error is already recorded. Returns whether it was stored.
  pub fn set_error(&self, err: impl Into<String>) -> bool {
    let mut guard = self.first_error.lock();
    if guard.is_some() {
      return false;
    }
    *guard = Some(err.into());
    true
  }

  pub fn error(&self) -> Option<String> {
    self.first_error.lock().clone()
  }
}

/// Fragment-scoped context shared by a pipeline and every execution instance built from it.
#[derive(Debug)]
pub struct ExecutionContext {
  runtime_state: Arc<RuntimeState>,
  fragment_instance_id: Option<(i64, i64)>,
  next_instance_id: AtomicU64,
}

impl ExecutionContext {
  pub fn new(runtime_state: Arc<RuntimeState>) -> Self {
    Self {
      runtime_state,
      fragment_instance_id: None,
      next_instance_id: AtomicU64::new(0),
    }
  }

  pub fn with_fragment_instance_id(mut self, hi: i64, lo: i64) -> Self {
    self.fragment_instance_id = Some((hi, lo));
    self
  }

  pub fn runtime_state(&self) -> &Arc<RuntimeState> {
    &self.runtime_state
  }

  pub fn fragment_instance_id(&self) -> Option<(i64, i64)> {
    self.fragment_instance_id
  }

  /// Hands out a fresh execution-instance id.
  pub fn next_instance_id(&self) -> u64 {
    self.next_instance_id.fetch_add(1, Ordering::Relaxed)
  }
}

impl Default for ExecutionContext {
  fn default() -> Self {
    Self::new(Arc::new(RuntimeState::default()))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_the_first_error_is_kept() {
    let state = RuntimeState::new("q1", RuntimeOptions::default());
    assert!(state.set_error("first"));
    assert!(!state.set_error("second"));
    assert_eq!(state.error().as_deref(), Some("first"));
  }

  #[test]
  fn instance_ids_are_unique_across_threads() {
    let ctx = Arc::new(ExecutionContext::default());
    let mut ids: Vec<u64> = std::thread::scope(|s| {
      let handles: Vec<_> = (0..4)
        .map(|_| {
          let ctx = Arc::clone(&ctx);
          s.spawn(move || (0..100).map(|_| ctx.next_instance_id()).collect::<Vec<_>>())
        })
        .collect();
      handles.into_iter().flat_map(|h| h.join().unwrap()).collect()
    });
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 400);
  }
}
