use std::{sync::Arc, time::Instant};

use futures::executor::ThreadPool;

use super::{
  action::Dispatch,
  lane::{Timed, Timer},
  worker::TrackedWorker,
  Action, ExecutorConfig, ExecutorContext, ExecutorService, Worker,
};

/// Spawns each action as a task of a thread pool.
///
/// Actions of one worker may run concurrently and in any order. By default
/// the tasks go to a `futures` [`ThreadPool`]; with the `tokio-scheduler`
/// feature [`TaskExecutor::tokio`] runs them on a tokio runtime instead.
pub struct TaskExecutor {
  spawn: Arc<Spawn>,
  timer: Arc<Timer>,
}

enum Spawn {
  Pool(ThreadPool),
  #[cfg(feature = "tokio-scheduler")]
  Tokio(tokio::runtime::Handle),
}

impl TaskExecutor {
  pub fn new(config: ExecutorConfig) -> Self {
    Self::with_timer(config, ExecutorContext::global().timer())
  }

  pub(crate) fn with_timer(config: ExecutorConfig, timer: Arc<Timer>) -> Self {
    let name = config.name_or("task").to_owned();
    let pool = ThreadPool::builder()
      .pool_size(config.get_parallelism())
      .name_prefix(format!("{name}-"))
      .create()
      .expect("failed to build the task thread pool");
    Self { spawn: Arc::new(Spawn::Pool(pool)), timer }
  }

  /// Spawns the tasks on the runtime behind `handle`.
  #[cfg(feature = "tokio-scheduler")]
  pub fn tokio(handle: tokio::runtime::Handle) -> Self {
    Self {
      spawn: Arc::new(Spawn::Tokio(handle)),
      timer: ExecutorContext::global().timer(),
    }
  }
}

impl ExecutorService for TaskExecutor {
  fn create_worker(&self) -> Arc<dyn Worker> {
    Arc::new(TrackedWorker::new(Arc::new(Timed::new(self.spawn.clone(), self.timer.clone()))))
  }
}

impl Dispatch for Spawn {
  fn dispatch(&self, job: Action) {
    match self {
      Spawn::Pool(pool) => pool.spawn_ok(futures::future::lazy(move |_| job())),
      #[cfg(feature = "tokio-scheduler")]
      Spawn::Tokio(handle) => {
        handle.spawn(async move { job() });
      }
    }
  }

  fn dispatch_at(&self, job: Action, _due: Instant) { self.dispatch(job) }
}
