// opchain/src/core/descriptor.rs

//! The configuration payload a template hands to every live operator it creates.

use crate::error::{OpchainError, OpchainResult};
use std::any::{Any, TypeId};
use std::sync::Arc;

/// Plan-time description of one relational operator.
///
/// The configuration value is type-erased so the pipeline never has to know
/// about join keys, scan ranges or aggregate functions. A live operator
/// recovers its concrete configuration with [`OperatorDescriptor::config`].
#[derive(Clone)]
pub struct OperatorDescriptor {
  plan_node_id: i32,
  name: String,
  config: Arc<dyn Any + Send + Sync>,
  config_type_name: &'static str,
}

impl OperatorDescriptor {
  pub fn new<C: Any + Send + Sync>(plan_node_id: i32, name: impl Into<String>, config: C) -> Self {
    Self {
      plan_node_id,
      name: name.into(),
      config: Arc::new(config),
      config_type_name: std::any::type_name::<C>(),
    }
  }

  /// A descriptor for operators that need no configuration beyond their name.
  pub fn unit(plan_node_id: i32, name: impl Into<String>) -> Self {
    Self::new(plan_node_id, name, ())
  }

  pub fn plan_node_id(&self) -> i32 {
    self.plan_node_id
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  pub fn config_type_name(&self) -> &'static str {
    self.config_type_name
  }

  pub fn holds<C: Any>(&self) -> bool {
    (*self.config).type_id() == TypeId::of::<C>()
  }

  /// Borrows the configuration as `C`.
  ///
  /// Fails with [`OpchainError::ConfigMismatch`] when the template was built
  /// with a different configuration type.
  pub fn config<C: Any>(&self) -> OpchainResult<&C> {
    self.config.downcast_ref::<C>().ok_or_else(|| OpchainError::ConfigMismatch {
      operator: self.name.clone(),
      expected_type: format!(
        "{} (descriptor holds {})",
        std::any::type_name::<C>(),
        self.config_type_name
      ),
    })
  }

  /// Shares the configuration with a live operator that keeps it past `init`.
  pub fn shared_config<C: Any + Send + Sync>(&self) -> OpchainResult<Arc<C>> {
    Arc::clone(&self.config)
      .downcast::<C>()
      .map_err(|_| OpchainError::ConfigMismatch {
        operator: self.name.clone(),
        expected_type: format!(
          "{} (descriptor holds {})",
          std::any::type_name::<C>(),
          self.config_type_name
        ),
      })
  }
}

impl std::fmt::Debug for OperatorDescriptor {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("OperatorDescriptor")
      .field("plan_node_id", &self.plan_node_id)
      .field("name", &self.name)
      .field("config_type", &self.config_type_name)
      .finish()
  }
}
