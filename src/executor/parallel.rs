use std::sync::Arc;

use super::{lane::LanePool, ExecutorConfig, ExecutorService, Worker};

/// A fixed pool of single-thread lanes. Each worker is pinned to one lane,
/// chosen round-robin, so a worker's actions never run concurrently.
pub struct ParallelExecutor {
  pool: LanePool,
}

impl ParallelExecutor {
  pub fn new(config: ExecutorConfig) -> Self {
    let parallelism = config.get_parallelism();
    Self { pool: LanePool::new(&config, "computation", parallelism) }
  }

  pub fn parallelism(&self) -> usize { self.pool.size() }
}

impl ExecutorService for ParallelExecutor {
  fn create_worker(&self) -> Arc<dyn Worker> { self.pool.create_worker() }

  fn start(&self) { self.pool.start() }

  fn shutdown(&self) { self.pool.shutdown() }
}

#[cfg(test)]
mod test {
  use std::{
    collections::HashSet,
    sync::{mpsc, Mutex},
    thread,
    time::Duration,
  };

  use super::*;

  fn thread_name() -> String { thread::current().name().unwrap_or_default().to_owned() }

  #[test]
  fn workers_spread_over_lanes() {
    let executor = ParallelExecutor::new(
      ExecutorConfig::new()
        .name("parallel-spread")
        .parallelism(3)
        .daemon(false),
    );
    assert_eq!(executor.parallelism(), 3);
    let names = Arc::new(Mutex::new(HashSet::new()));
    let (tx, rx) = mpsc::channel();
    for _ in 0..3 {
      let worker = executor.create_worker();
      let c_names = names.clone();
      let c_tx = tx.clone();
      worker.schedule(Box::new(move || {
        c_names.lock().unwrap().insert(thread_name());
        c_tx.send(()).unwrap();
      }));
    }
    for _ in 0..3 {
      rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }
    executor.shutdown();
    assert_eq!(names.lock().unwrap().len(), 3);
  }

  #[test]
  fn worker_is_pinned() {
    let executor = ParallelExecutor::new(ExecutorConfig::new().name("parallel-pin").parallelism(4));
    let worker = executor.create_worker();
    let names = Arc::new(Mutex::new(HashSet::new()));
    let (tx, rx) = mpsc::channel();
    for _ in 0..20 {
      let c_names = names.clone();
      let c_tx = tx.clone();
      worker.schedule(Box::new(move || {
        c_names.lock().unwrap().insert(thread_name());
        c_tx.send(()).unwrap();
      }));
    }
    for _ in 0..20 {
      rx.recv_timeout(Duration::from_secs(5)).unwrap();
    }
    executor.shutdown();
    assert_eq!(names.lock().unwrap().len(), 1);
  }
}
