//! Virtual time executor for deterministic tests of timed behaviour.

use std::{
  collections::BinaryHeap,
  sync::{Arc, Mutex},
  time::{Duration, Instant},
};

use super::{action::Dispatch, lane::Entry, worker::TrackedWorker, Action, ExecutorService, Worker};

/// Runs actions on the test thread, on a clock that only moves when told to.
///
/// Actions become due as the clock is advanced and run in due time order,
/// with the clock set to each action's due time while it runs.
///
/// ```rust
/// use std::{
///   sync::{
///     atomic::{AtomicUsize, Ordering},
///     Arc,
///   },
///   time::Duration,
/// };
///
/// use rxstreams::executor::{ExecutorService, TestExecutor};
///
/// let executor = TestExecutor::new();
/// let ticks = Arc::new(AtomicUsize::new(0));
/// let c_ticks = ticks.clone();
/// executor.schedule_periodically(
///   Box::new(move || {
///     c_ticks.fetch_add(1, Ordering::SeqCst);
///   }),
///   Duration::from_secs(1),
///   Duration::from_secs(1),
/// );
/// executor.advance_by(Duration::from_millis(3500));
/// assert_eq!(ticks.load(Ordering::SeqCst), 3);
/// ```
#[derive(Clone)]
pub struct TestExecutor {
  clock: Arc<VirtualClock>,
}

struct VirtualClock {
  state: Mutex<ClockState>,
}

struct ClockState {
  now: Instant,
  seq: u64,
  queue: BinaryHeap<Entry>,
}

impl TestExecutor {
  pub fn new() -> Self { Self::starting_at(Instant::now()) }

  pub fn starting_at(now: Instant) -> Self {
    Self {
      clock: Arc::new(VirtualClock {
        state: Mutex::new(ClockState { now, seq: 0, queue: BinaryHeap::new() }),
      }),
    }
  }

  pub fn now(&self) -> Instant { self.clock.now() }

  /// Moves the clock forward by `delay`, running what becomes due.
  pub fn advance_by(&self, delay: Duration) { self.advance_to(self.now() + delay) }

  /// Moves the clock to `target`, running what becomes due. The clock never
  /// moves backwards.
  pub fn advance_to(&self, target: Instant) {
    while let Some(job) = self.clock.next_until(target) {
      job();
    }
  }

  /// Runs the actions due at the current time.
  pub fn trigger_actions(&self) { self.advance_to(self.now()) }

  /// Number of queued jobs, disposed ones included.
  pub fn pending(&self) -> usize { self.clock.state.lock().unwrap().queue.len() }
}

impl Default for TestExecutor {
  fn default() -> Self { Self::new() }
}

impl VirtualClock {
  fn next_until(&self, target: Instant) -> Option<Action> {
    let mut state = self.state.lock().unwrap();
    match state.queue.peek().map(|entry| entry.due) {
      Some(due) if due <= target => {
        let entry = state.queue.pop()?;
        state.now = state.now.max(due);
        Some(entry.job)
      }
      _ => {
        state.now = state.now.max(target);
        None
      }
    }
  }
}

impl Dispatch for VirtualClock {
  fn dispatch(&self, job: Action) {
    let now = self.now();
    self.dispatch_at(job, now)
  }

  fn dispatch_at(&self, job: Action, due: Instant) {
    let mut state = self.state.lock().unwrap();
    let seq = state.seq;
    state.seq += 1;
    state.queue.push(Entry { due, seq, job });
  }

  fn now(&self) -> Instant { self.state.lock().unwrap().now }
}

impl ExecutorService for TestExecutor {
  fn create_worker(&self) -> Arc<dyn Worker> {
    let dispatcher: Arc<dyn Dispatch> = self.clock.clone();
    Arc::new(TrackedWorker::new(dispatcher))
  }

  fn now(&self) -> Instant { self.clock.now() }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::subscription::Disposable;

  fn recorder(executor: &TestExecutor) -> (Arc<Mutex<Vec<Duration>>>, impl FnMut() + Send + 'static) {
    let start = executor.now();
    let log = Arc::new(Mutex::new(vec![]));
    let c_log = log.clone();
    let c_executor = executor.clone();
    (log, move || c_log.lock().unwrap().push(c_executor.now() - start))
  }

  #[test]
  fn nothing_runs_before_due() {
    let executor = TestExecutor::new();
    let (log, mut record) = recorder(&executor);
    executor.schedule_after(Box::new(move || record()), Duration::from_millis(10));
    executor.advance_by(Duration::from_millis(9));
    assert!(log.lock().unwrap().is_empty());
    executor.advance_by(Duration::from_millis(1));
    assert_eq!(*log.lock().unwrap(), vec![Duration::from_millis(10)]);
  }

  #[test]
  fn periodic_due_times_do_not_drift() {
    let executor = TestExecutor::new();
    let (log, record) = recorder(&executor);
    let handle = executor.schedule_periodically(
      Box::new(record),
      Duration::from_millis(5),
      Duration::from_millis(10),
    );
    executor.advance_by(Duration::from_millis(36));
    assert_eq!(
      *log.lock().unwrap(),
      [5, 15, 25, 35].map(Duration::from_millis).to_vec()
    );
    handle.dispose();
    executor.advance_by(Duration::from_millis(100));
    assert_eq!(log.lock().unwrap().len(), 4);
  }

  #[test]
  fn equal_due_times_keep_submission_order() {
    let executor = TestExecutor::new();
    let worker = executor.create_worker();
    let order = Arc::new(Mutex::new(vec![]));
    for i in 0..5 {
      let c_order = order.clone();
      worker.schedule_after(Box::new(move || c_order.lock().unwrap().push(i)), Duration::from_secs(1));
    }
    executor.advance_by(Duration::from_secs(1));
    assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
  }

  #[test]
  fn disposed_worker_cancels_pending() {
    let executor = TestExecutor::new();
    let worker = executor.create_worker();
    let (log, mut record) = recorder(&executor);
    worker.schedule_after(Box::new(move || record()), Duration::from_millis(1));
    worker.dispose();
    executor.advance_by(Duration::from_secs(1));
    assert!(log.lock().unwrap().is_empty());
    assert_eq!(executor.pending(), 0);
  }

  #[test]
  fn dispose_after_some_ran_leaves_them_alone() {
    let executor = TestExecutor::new();
    let worker = executor.create_worker();
    let (log, record) = recorder(&executor);
    let record = Arc::new(Mutex::new(record));
    let handles: Vec<_> = (1..=5)
      .map(|i| {
        let record = record.clone();
        worker.schedule_after(
          Box::new(move || (*record.lock().unwrap())()),
          Duration::from_millis(10 * i),
        )
      })
      .collect();

    executor.advance_by(Duration::from_millis(25));
    assert_eq!(log.lock().unwrap().len(), 2);
    assert!(handles[..2].iter().all(|h| h.is_disposed()));
    assert!(!handles[2].is_disposed());

    worker.dispose();
    worker.dispose();
    handles[0].dispose();
    assert!(handles.iter().all(|h| h.is_disposed()));
    executor.advance_by(Duration::from_millis(100));
    assert_eq!(
      *log.lock().unwrap(),
      vec![Duration::from_millis(10), Duration::from_millis(20)]
    );
    assert_eq!(executor.pending(), 0);
  }
}
