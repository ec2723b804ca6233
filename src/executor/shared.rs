use std::{sync::Arc, time::Instant};

use super::{action::Dispatch, worker::TrackedWorker, Action, ExecutorService, Worker};

/// Hands every worker's actions to one existing worker.
///
/// Each worker only tracks its own actions: disposing it cancels those and
/// leaves the backing worker, and the other workers sharing it, alone.
pub struct SharedExecutor {
  backing: Arc<dyn Worker>,
}

impl SharedExecutor {
  pub fn new(backing: Arc<dyn Worker>) -> Self { Self { backing } }
}

impl ExecutorService for SharedExecutor {
  fn create_worker(&self) -> Arc<dyn Worker> {
    Arc::new(TrackedWorker::new(Arc::new(Backed(self.backing.clone()))))
  }

  fn now(&self) -> Instant { self.backing.now() }
}

struct Backed(Arc<dyn Worker>);

impl Dispatch for Backed {
  fn dispatch(&self, job: Action) { self.0.schedule(job); }

  fn dispatch_at(&self, job: Action, due: Instant) {
    let delay = due.saturating_duration_since(self.0.now());
    self.0.schedule_after(job, delay);
  }

  fn now(&self) -> Instant { self.0.now() }
}

#[cfg(test)]
mod test {
  use std::{
    sync::atomic::{AtomicUsize, Ordering},
    time::Duration,
  };

  use super::*;
  use crate::{executor::TestExecutor, subscription::Disposable};

  #[test]
  fn dispose_only_cancels_own_actions() {
    let clock = TestExecutor::new();
    let executor = SharedExecutor::new(clock.create_worker());
    let first = executor.create_worker();
    let second = executor.create_worker();
    let hits = Arc::new(AtomicUsize::new(0));
    for worker in [&first, &second] {
      let c_hits = hits.clone();
      worker.schedule_after(
        Box::new(move || {
          c_hits.fetch_add(1, Ordering::SeqCst);
        }),
        Duration::from_millis(10),
      );
    }

    first.dispose();
    clock.advance_by(Duration::from_millis(10));
    assert_eq!(hits.load(Ordering::SeqCst), 1);

    let third = executor.create_worker();
    let c_hits = hits.clone();
    third.schedule(Box::new(move || {
      c_hits.fetch_add(1, Ordering::SeqCst);
    }));
    clock.trigger_actions();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
  }

  #[test]
  fn uses_backing_clock() {
    let clock = TestExecutor::new();
    let executor = SharedExecutor::new(clock.create_worker());
    clock.advance_by(Duration::from_secs(3));
    assert_eq!(executor.now(), clock.now());
    assert_eq!(executor.create_worker().now(), clock.now());
  }
}
