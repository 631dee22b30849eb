use std::time::Duration;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// `execute(diagram_id, options)` input (§6 "Scheduler input"). Field names
/// match the options map a caller passes in; defaults match §4.7/§5.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RunOptions {
  pub debug_mode: bool,
  pub max_iterations: u64,
  pub timeout_seconds: u64,
  pub max_parallel_nodes: usize,
  pub variables: Map<String, Value>,
  /// How long the step loop sleeps between polls when no node is ready
  /// (§4.7: "configurable; default on the order of 10-50 ms").
  pub poll_interval_ms: u64,
  /// Consecutive empty polls with no state change before the run is
  /// declared deadlocked (§4.7).
  pub max_poll_retries: u32,
}

impl Default for RunOptions {
  fn default() -> Self {
    Self {
      debug_mode: false,
      max_iterations: 10_000,
      timeout_seconds: 300,
      max_parallel_nodes: 10,
      variables: Map::new(),
      poll_interval_ms: 25,
      max_poll_retries: 200,
    }
  }
}

impl RunOptions {
  pub fn poll_interval(&self) -> Duration {
    Duration::from_millis(self.poll_interval_ms)
  }

  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_seconds)
  }
}
