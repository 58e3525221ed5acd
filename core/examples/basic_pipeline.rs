// opchain/examples/basic_pipeline.rs

use async_trait::async_trait;
use opchain::{
  ExecutionContext, OpchainError, Operator, OperatorDescriptor, OperatorTemplate, Pipeline, RuntimeOptions,
  RuntimeState,
};
use std::sync::Arc;
use tracing::info;

// 1. Configuration payloads the planner attaches to each template.
#[derive(Debug)]
struct ScanConfig {
  table: String,
}

#[derive(Debug)]
struct LimitConfig {
  limit: usize,
}

// 2. One generic template type is enough for the demo; real engines have one per operator.
struct DemoTemplate {
  descriptor: OperatorDescriptor,
  source: bool,
  sink: bool,
}

#[async_trait]
impl OperatorTemplate for DemoTemplate {
  fn name(&self) -> &str {
    self.descriptor.name()
  }

  fn descriptor(&self) -> &OperatorDescriptor {
    &self.descriptor
  }

  fn is_source(&self) -> bool {
    self.source
  }

  fn is_sink(&self) -> bool {
    self.sink
  }

  async fn prepare(&self, ctx: &ExecutionContext) -> anyhow::Result<()> {
    info!(operator = self.name(), query = ?ctx.runtime_state().query_id(), "template prepared");
    Ok(())
  }

  fn create_operator(&self) -> Box<dyn Operator> {
    Box::new(DemoOperator {
      name: self.name().to_string(),
      budget: 0,
    })
  }
}

struct DemoOperator {
  name: String,
  budget: usize,
}

impl Operator for DemoOperator {
  fn name(&self) -> &str {
    &self.name
  }

  fn init(&mut self, descriptor: &OperatorDescriptor, state: &RuntimeState) -> anyhow::Result<()> {
    self.budget = if descriptor.holds::<LimitConfig>() {
      descriptor.config::<LimitConfig>()?.limit
    } else if descriptor.holds::<ScanConfig>() {
      info!(table = %descriptor.config::<ScanConfig>()?.table, "scan bound");
      state.chunk_size()
    } else {
      state.chunk_size()
    };
    Ok(())
  }
}

fn template<C: std::any::Any + Send + Sync>(id: i32, name: &str, config: C, source: bool, sink: bool) -> Arc<DemoTemplate> {
  Arc::new(DemoTemplate {
    descriptor: OperatorDescriptor::new(id, name, config),
    source,
    sink,
  })
}

#[tokio::main]
async fn main() -> Result<(), OpchainError> {
  tracing_subscriber::fmt().with_max_level(tracing::Level::INFO).init();

  info!("--- Basic Pipeline Example ---");

  // 3. Runtime state for the query, with options taken from the environment.
  let options = RuntimeOptions::from_env()?;
  let ctx = Arc::new(ExecutionContext::new(Arc::new(RuntimeState::new("demo-query", options))));

  // 4. Build the chain: source, mid-chain operators, sink.
  let mut pipeline = Pipeline::new(0, Arc::clone(&ctx));
  pipeline.set_source(template(1, "OLAP_SCAN", ScanConfig { table: "orders".to_string() }, true, false))?;
  pipeline.add_operator(template(2, "LIMIT", LimitConfig { limit: 10 }, false, false))?;
  pipeline.set_sink(template(3, "RESULT_SINK", (), false, true))?;

  // 5. Prepare once, then fan out over four execution instances.
  pipeline.prepare(&ctx).await?;
  let pipeline = Arc::new(pipeline);

  let mut tasks = Vec::new();
  for _ in 0..4 {
    let pipeline = Arc::clone(&pipeline);
    tasks.push(tokio::task::spawn_blocking(move || pipeline.build_operators()));
  }
  for task in tasks {
    let chain = task
      .await
      .map_err(|e| OpchainError::Internal(format!("instance task panicked: {}", e)))??;
    info!(instance = chain.instance_id(), chain = ?chain, "instance ready");
    chain.close().into_result()?;
  }

  // 6. Tear down template-level resources.
  pipeline.close(&ctx).await.into_result()?;
  info!("Pipeline closed.");
  Ok(())
}
