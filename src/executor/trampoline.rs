use std::{
  collections::VecDeque,
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
  },
  time::Instant,
};

use super::{
  action::Dispatch,
  lane::{Timed, Timer},
  worker::TrackedWorker,
  Action, ExecutorContext, ExecutorService, Worker,
};

/// Runs a worker's actions on the thread submitting them.
///
/// Only one thread drains a worker's queue at a time: an action scheduled
/// while the worker is draining, from inside an action or from another
/// thread, is queued and run by the draining thread before it returns.
pub struct TrampolineExecutor {
  timer: Arc<Timer>,
}

impl TrampolineExecutor {
  pub fn new() -> Self { Self::with_timer(ExecutorContext::global().timer()) }

  pub(crate) fn with_timer(timer: Arc<Timer>) -> Self { Self { timer } }
}

impl Default for TrampolineExecutor {
  fn default() -> Self { Self::new() }
}

impl ExecutorService for TrampolineExecutor {
  fn create_worker(&self) -> Arc<dyn Worker> {
    let drain = Arc::new(Drain::default());
    Arc::new(TrackedWorker::new(Arc::new(Timed::new(drain, self.timer.clone()))))
  }
}

/// Queue drained by whichever thread finds it idle.
#[derive(Default)]
struct Drain {
  queue: Mutex<VecDeque<Action>>,
  wip: AtomicUsize,
}

impl Dispatch for Drain {
  fn dispatch(&self, job: Action) {
    self.queue.lock().unwrap().push_back(job);
    if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
      return;
    }
    let mut missed = 1;
    loop {
      loop {
        let job = self.queue.lock().unwrap().pop_front();
        match job {
          Some(job) => job(),
          None => break,
        }
      }
      missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
      if missed == 0 {
        break;
      }
    }
  }

  fn dispatch_at(&self, job: Action, _due: Instant) { self.dispatch(job) }
}

#[cfg(test)]
mod test {
  use std::{
    sync::mpsc,
    thread,
    time::Duration,
  };

  use super::*;

  #[test]
  fn nested_schedule_runs_after_current() {
    let executor = TrampolineExecutor::new();
    let worker = executor.create_worker();
    let log = Arc::new(Mutex::new(vec![]));

    let c_worker = worker.clone();
    let c_log = log.clone();
    worker.schedule(Box::new(move || {
      c_log.lock().unwrap().push("outer start");
      let c_log2 = c_log.clone();
      c_worker.schedule(Box::new(move || c_log2.lock().unwrap().push("inner")));
      c_log.lock().unwrap().push("outer end");
    }));

    assert_eq!(*log.lock().unwrap(), vec!["outer start", "outer end", "inner"]);
  }

  #[test]
  fn runs_on_caller_thread() {
    let executor = TrampolineExecutor::new();
    let caller = thread::current().id();
    let seen = Arc::new(Mutex::new(None));
    let c_seen = seen.clone();
    executor.schedule(Box::new(move || *c_seen.lock().unwrap() = Some(thread::current().id())));
    assert_eq!(*seen.lock().unwrap(), Some(caller));
  }

  #[test]
  fn deep_recursion_is_flattened() {
    fn again(worker: Arc<dyn Worker>, left: usize, hits: Arc<AtomicUsize>) {
      hits.fetch_add(1, Ordering::Relaxed);
      if left > 0 {
        let c_worker = worker.clone();
        worker.schedule(Box::new(move || again(c_worker, left - 1, hits)));
      }
    }
    let worker = TrampolineExecutor::new().create_worker();
    let hits = Arc::new(AtomicUsize::new(0));
    let c_worker = worker.clone();
    let c_hits = hits.clone();
    worker.schedule(Box::new(move || again(c_worker, 100_000, c_hits)));
    assert_eq!(hits.load(Ordering::Relaxed), 100_001);
  }

  #[test]
  fn delayed_runs_later() {
    let worker = TrampolineExecutor::new().create_worker();
    let (tx, rx) = mpsc::channel();
    let start = Instant::now();
    worker.schedule_after(
      Box::new(move || tx.send(Instant::now()).unwrap()),
      Duration::from_millis(20),
    );
    let ran_at = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(ran_at >= start + Duration::from_millis(20));
  }
}
