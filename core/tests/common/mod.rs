// tests/common/mod.rs
#![allow(dead_code)] // Allow unused code in this common test module

use async_trait::async_trait;
use opchain::{
  ExecutionContext, Operator, OperatorDescriptor, OperatorTemplate, OperatorTemplatePtr, Pipeline,
  RuntimeOptions, RuntimeState,
};
use parking_lot::Mutex;
use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};
use std::time::Duration;
use tracing::Level;

// --- Recorded lifecycle events ---
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Event {
  Prepare(String),
  Close(String),
  Init {
    name: String,
    serial: usize,
    label: String,
    chunk_size: usize,
  },
  OpClose {
    name: String,
    serial: usize,
  },
}

#[derive(Debug, Default)]
pub struct Recorder {
  events: Mutex<Vec<Event>>,
}

impl Recorder {
  pub fn new() -> Arc<Self> {
    Arc::new(Self::default())
  }

  pub fn push(&self, event: Event) {
    self.events.lock().push(event);
  }

  pub fn events(&self) -> Vec<Event> {
    self.events.lock().clone()
  }

  pub fn clear(&self) {
    self.events.lock().clear();
  }

  pub fn prepared(&self) -> Vec<String> {
    self
      .events()
      .into_iter()
      .filter_map(|e| match e {
        Event::Prepare(name) => Some(name),
        _ => None,
      })
      .collect()
  }

  pub fn closed(&self) -> Vec<String> {
    self
      .events()
      .into_iter()
      .filter_map(|e| match e {
        Event::Close(name) => Some(name),
        _ => None,
      })
      .collect()
  }

  /// (name, serial) of every successful live-operator init, in order.
  pub fn inits(&self) -> Vec<(String, usize)> {
    self
      .events()
      .into_iter()
      .filter_map(|e| match e {
        Event::Init { name, serial, .. } => Some((name, serial)),
        _ => None,
      })
      .collect()
  }

  pub fn op_closes(&self) -> Vec<(String, usize)> {
    self
      .events()
      .into_iter()
      .filter_map(|e| match e {
        Event::OpClose { name, serial } => Some((name, serial)),
        _ => None,
      })
      .collect()
  }
}

// --- Template configuration carried in the descriptor ---
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TestConfig {
  pub label: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
  Source,
  Mid,
  Sink,
  Both,
}

static NEXT_SERIAL: AtomicUsize = AtomicUsize::new(0);

/// A template that records everything done to it and can be told to fail.
pub struct TestTemplate {
  descriptor: OperatorDescriptor,
  role: Role,
  recorder: Arc<Recorder>,
  fail_prepare: bool,
  prepare_delay: Option<Duration>,
  fail_close: bool,
  fail_op_close: bool,
  /// Live operators created at or after this count fail `init`.
  fail_init_from: Option<usize>,
  created: AtomicUsize,
}

impl TestTemplate {
  pub fn new(name: &str, role: Role, recorder: &Arc<Recorder>) -> Self {
    Self {
      descriptor: OperatorDescriptor::new(
        0,
        name,
        TestConfig {
          label: format!("{}-config", name),
        },
      ),
      role,
      recorder: Arc::clone(recorder),
      fail_prepare: false,
      prepare_delay: None,
      fail_close: false,
      fail_op_close: false,
      fail_init_from: None,
      created: AtomicUsize::new(0),
    }
  }

  pub fn with_plan_node_id(mut self, id: i32) -> Self {
    let label = format!("{}-config", self.descriptor.name());
    self.descriptor = OperatorDescriptor::new(id, self.descriptor.name().to_string(), TestConfig { label });
    self
  }

  pub fn with_descriptor(mut self, descriptor: OperatorDescriptor) -> Self {
    self.descriptor = descriptor;
    self
  }

  pub fn failing_prepare(mut self) -> Self {
    self.fail_prepare = true;
    self
  }

  pub fn with_prepare_delay(mut self, delay: Duration) -> Self {
    self.prepare_delay = Some(delay);
    self
  }

  pub fn failing_close(mut self) -> Self {
    self.fail_close = true;
    self
  }

  pub fn failing_op_close(mut self) -> Self {
    self.fail_op_close = true;
    self
  }

  pub fn failing_init(self) -> Self {
    self.failing_init_from(0)
  }

  pub fn failing_init_from(mut self, nth: usize) -> Self {
    self.fail_init_from = Some(nth);
    self
  }

  pub fn created(&self) -> usize {
    self.created.load(Ordering::SeqCst)
  }

  pub fn into_ptr(self) -> OperatorTemplatePtr {
    Arc::new(self)
  }
}

#[async_trait]
impl OperatorTemplate for TestTemplate {
  fn name(&self) -> &str {
    self.descriptor.name()
  }

  fn descriptor(&self) -> &OperatorDescriptor {
    &self.descriptor
  }

  fn is_source(&self) -> bool {
    matches!(self.role, Role::Source | Role::Both)
  }

  fn is_sink(&self) -> bool {
    matches!(self.role, Role::Sink | Role::Both)
  }

  async fn prepare(&self, _ctx: &ExecutionContext) -> anyhow::Result<()> {
    self.recorder.push(Event::Prepare(self.name().to_string()));
    if let Some(delay) = self.prepare_delay {
      tokio::time::sleep(delay).await;
    }
    if self.fail_prepare {
      anyhow::bail!("prepare of {} failed", self.name());
    }
    Ok(())
  }

  async fn close(&self, _ctx: &ExecutionContext) -> anyhow::Result<()> {
    self.recorder.push(Event::Close(self.name().to_string()));
    if self.fail_close {
      anyhow::bail!("close of {} failed", self.name());
    }
    Ok(())
  }

  fn create_operator(&self) -> Box<dyn Operator> {
    let nth = self.created.fetch_add(1, Ordering::SeqCst);
    let fail_init = self.fail_init_from.map_or(false, |from| nth >= from);
    Box::new(TestOperator {
      name: self.name().to_string(),
      serial: NEXT_SERIAL.fetch_add(1, Ordering::SeqCst),
      recorder: Arc::clone(&self.recorder),
      fail_init,
      fail_close: self.fail_op_close,
      config: None,
    })
  }
}

pub struct TestOperator {
  name: String,
  serial: usize,
  recorder: Arc<Recorder>,
  fail_init: bool,
  fail_close: bool,
  config: Option<Arc<TestConfig>>,
}

impl Operator for TestOperator {
  fn name(&self) -> &str {
    &self.name
  }

  fn init(&mut self, descriptor: &OperatorDescriptor, state: &RuntimeState) -> anyhow::Result<()> {
    if self.fail_init {
      anyhow::bail!("init of {}#{} failed", self.name, self.serial);
    }
    let config = descriptor.shared_config::<TestConfig>()?;
    self.recorder.push(Event::Init {
      name: self.name.clone(),
      serial: self.serial,
      label: config.label.clone(),
      chunk_size: state.chunk_size(),
    });
    self.config = Some(config);
    Ok(())
  }

  fn close(&mut self) -> anyhow::Result<()> {
    self.recorder.push(Event::OpClose {
      name: self.name.clone(),
      serial: self.serial,
    });
    if self.fail_close {
      anyhow::bail!("live close of {}#{} failed", self.name, self.serial);
    }
    Ok(())
  }
}

// --- Pipeline helpers ---
pub fn test_context() -> Arc<ExecutionContext> {
  let state = RuntimeState::new("test-query", RuntimeOptions::default().with_chunk_size(1024));
  Arc::new(ExecutionContext::new(Arc::new(state)).with_fragment_instance_id(1, 2))
}

pub fn source(name: &str, recorder: &Arc<Recorder>) -> OperatorTemplatePtr {
  TestTemplate::new(name, Role::Source, recorder).into_ptr()
}

pub fn mid(name: &str, recorder: &Arc<Recorder>) -> OperatorTemplatePtr {
  TestTemplate::new(name, Role::Mid, recorder).into_ptr()
}

pub fn sink(name: &str, recorder: &Arc<Recorder>) -> OperatorTemplatePtr {
  TestTemplate::new(name, Role::Sink, recorder).into_ptr()
}

/// Source "SCAN", the given mid-chain names, sink "RESULT_SINK"; sealed, not prepared.
pub fn sealed_pipeline(id: u32, mids: &[&str], recorder: &Arc<Recorder>) -> Pipeline {
  let mut pipeline = Pipeline::new(id, test_context());
  pipeline.set_source(source("SCAN", recorder)).unwrap();
  for name in mids {
    pipeline.add_operator(mid(name, recorder)).unwrap();
  }
  pipeline.set_sink(sink("RESULT_SINK", recorder)).unwrap();
  pipeline
}

pub fn names(templates: &[OperatorTemplatePtr]) -> Vec<String> {
  templates.iter().map(|t| t.name().to_string()).collect()
}

// --- Helper for Tracing Setup (call once per test run if needed) ---
use once_cell::sync::Lazy;
static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer() // Important for tests to capture output
    .try_init()
    .ok(); // Allow multiple initializations in tests (ok if fails)
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}
