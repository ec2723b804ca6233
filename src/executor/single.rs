use std::sync::Arc;

use super::{lane::LanePool, ExecutorConfig, ExecutorService, Worker};

/// Runs every worker's actions on one dedicated thread, earliest due time
/// first and in submission order for equal due times.
pub struct SingleExecutor {
  pool: LanePool,
}

impl SingleExecutor {
  pub fn new(config: ExecutorConfig) -> Self { Self { pool: LanePool::new(&config, "single", 1) } }
}

impl ExecutorService for SingleExecutor {
  fn create_worker(&self) -> Arc<dyn Worker> { self.pool.create_worker() }

  fn start(&self) { self.pool.start() }

  fn shutdown(&self) { self.pool.shutdown() }
}
