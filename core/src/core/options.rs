// opchain/src/core/options.rs

//! Per-query runtime options handed to operators through the runtime state.

use crate::error::{OpchainError, OpchainResult};
use std::env;
use std::time::Duration;

pub const DEFAULT_CHUNK_SIZE: usize = 4096;

pub const ENV_CHUNK_SIZE: &str = "OPCHAIN_CHUNK_SIZE";
pub const ENV_ENABLE_PROFILE: &str = "OPCHAIN_ENABLE_PROFILE";
pub const ENV_QUERY_TIMEOUT_MS: &str = "OPCHAIN_QUERY_TIMEOUT_MS";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RuntimeOptions {
  /// Rows per chunk an operator should aim for.
  pub chunk_size: usize,
  pub enable_profile: bool,
  pub query_timeout: Option<Duration>,
}

impl Default for RuntimeOptions {
  fn default() -> Self {
    Self {
      chunk_size: DEFAULT_CHUNK_SIZE,
      enable_profile: false,
      query_timeout: None,
    }
  }
}

impl RuntimeOptions {
  pub fn with_chunk_size(mut self, chunk_size: usize) -> Self {
    self.chunk_size = chunk_size;
    self
  }

  pub fn with_profile(mut self, enable_profile: bool) -> Self {
    self.enable_profile = enable_profile;
    self
  }

  pub fn with_query_timeout(mut self, timeout: Duration) -> Self {
    self.query_timeout = Some(timeout);
    self
  }

  /// Reads overrides from the process environment; unset variables keep their defaults.
  pub fn from_env() -> OpchainResult<Self> {
    Self::from_lookup(|key| env::var(key).ok())
  }

  pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> OpchainResult<Self> {
    let mut options = Self::default();

    if let Some(raw) = lookup(ENV_CHUNK_SIZE) {
      let chunk_size = raw.trim().parse::<usize>().map_err(|e| invalid(ENV_CHUNK_SIZE, &raw, e))?;
      if chunk_size == 0 {
        return Err(OpchainError::Configuration {
          key: ENV_CHUNK_SIZE.to_string(),
          message: "chunk size must be positive".to_string(),
        });
      }
      options.chunk_size = chunk_size;
    }

    if let Some(raw) = lookup(ENV_ENABLE_PROFILE) {
      options.enable_profile = raw
        .trim()
        .parse::<bool>()
        .map_err(|e| invalid(ENV_ENABLE_PROFILE, &raw, e))?;
    }

    if let Some(raw) = lookup(ENV_QUERY_TIMEOUT_MS) {
      let millis = raw.trim().parse::<u64>().map_err(|e| invalid(ENV_QUERY_TIMEOUT_MS, &raw, e))?;
      options.query_timeout = Some(Duration::from_millis(millis));
    }

    tracing::debug!(?options, "Runtime options loaded.");
    Ok(options)
  }
}

fn invalid(key: &str, raw: &str, err: impl std::fmt::Display) -> OpchainError {
  OpchainError::Configuration {
    key: key.to_string(),
    message: format!("cannot parse '{}': {}", raw, err),
  }
}
