//! Executor threads: a due-time ordered job queue and the threads draining it.

use std::{
  cmp::Ordering as CmpOrdering,
  collections::BinaryHeap,
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Condvar, Mutex,
  },
  thread::{self, JoinHandle},
  time::Instant,
};

use super::{action::Dispatch, worker::TrackedWorker, Action, ExecutorConfig, Worker};

// ============================================================================
// JobQueue
// ============================================================================

pub(crate) struct Entry {
  pub(crate) due: Instant,
  pub(crate) seq: u64,
  pub(crate) job: Action,
}

// Reversed so the max-heap pops the earliest due time, ties in submission
// order.
impl Ord for Entry {
  fn cmp(&self, other: &Self) -> CmpOrdering {
    other
      .due
      .cmp(&self.due)
      .then_with(|| other.seq.cmp(&self.seq))
  }
}

impl PartialOrd for Entry {
  fn partial_cmp(&self, other: &Self) -> Option<CmpOrdering> { Some(self.cmp(other)) }
}

impl PartialEq for Entry {
  fn eq(&self, other: &Self) -> bool { self.due == other.due && self.seq == other.seq }
}

impl Eq for Entry {}

#[derive(Default)]
struct QueueState {
  heap: BinaryHeap<Entry>,
  seq: u64,
  shutdown: bool,
}

/// Jobs ordered by due time, run by whichever thread calls [`JobQueue::run`].
#[derive(Default)]
pub(crate) struct JobQueue {
  state: Mutex<QueueState>,
  ready: Condvar,
}

impl JobQueue {
  pub(crate) fn new() -> Arc<Self> { Arc::new(Self::default()) }

  /// Queues `job` to run at `due`. Returns `false`, dropping the job, once
  /// the queue is shut down.
  pub(crate) fn push(&self, job: Action, due: Instant) -> bool {
    let mut state = self.state.lock().unwrap();
    if state.shutdown {
      drop(state);
      drop(job);
      return false;
    }
    let seq = state.seq;
    state.seq += 1;
    state.heap.push(Entry { due, seq, job });
    drop(state);
    self.ready.notify_one();
    true
  }

  /// Runs due jobs on the current thread until the queue is shut down.
  pub(crate) fn run(&self) {
    while let Some(job) = self.next_due() {
      job();
    }
  }

  fn next_due(&self) -> Option<Action> {
    let mut state = self.state.lock().unwrap();
    loop {
      if state.shutdown {
        return None;
      }
      let now = Instant::now();
      match state.heap.peek().map(|entry| entry.due) {
        None => state = self.ready.wait(state).unwrap(),
        Some(due) if due <= now => return state.heap.pop().map(|entry| entry.job),
        Some(due) => state = self.ready.wait_timeout(state, due - now).unwrap().0,
      }
    }
  }

  /// Stops `run` and drops the pending jobs.
  pub(crate) fn shutdown(&self) {
    let pending = {
      let mut state = self.state.lock().unwrap();
      state.shutdown = true;
      std::mem::take(&mut state.heap)
    };
    self.ready.notify_all();
    drop(pending);
  }

  /// Accepts jobs again after a `shutdown`.
  pub(crate) fn reopen(&self) { self.state.lock().unwrap().shutdown = false; }

  #[cfg(test)]
  pub(crate) fn is_shutdown(&self) -> bool { self.state.lock().unwrap().shutdown }

  #[cfg(test)]
  pub(crate) fn len(&self) -> usize { self.state.lock().unwrap().heap.len() }
}

impl Dispatch for JobQueue {
  fn dispatch(&self, job: Action) { self.push(job, Instant::now()); }

  fn dispatch_at(&self, job: Action, due: Instant) { self.push(job, due); }
}

// ============================================================================
// Lane
// ============================================================================

/// One named thread draining its own [`JobQueue`].
pub(crate) struct Lane {
  name: String,
  queue: Arc<JobQueue>,
  thread: Mutex<Option<JoinHandle<()>>>,
}

impl Lane {
  pub(crate) fn spawn(name: String) -> Arc<Self> {
    let queue = JobQueue::new();
    let c_queue = queue.clone();
    let c_name = name.clone();
    let handle = thread::Builder::new()
      .name(name.clone())
      .spawn(move || {
        tracing::debug!(lane = %c_name, "executor thread started");
        c_queue.run();
        tracing::debug!(lane = %c_name, "executor thread stopped");
      })
      .expect("failed to spawn executor thread");
    Arc::new(Self { name, queue, thread: Mutex::new(Some(handle)) })
  }

  #[inline]
  pub(crate) fn name(&self) -> &str { &self.name }

  pub(crate) fn dispatcher(&self) -> Arc<dyn Dispatch> { self.queue.clone() }

  pub(crate) fn shutdown(&self) { self.queue.shutdown(); }

  #[cfg(test)]
  pub(crate) fn is_shutdown(&self) -> bool { self.queue.is_shutdown() }

  /// Waits for the thread to exit, unless called from that thread.
  pub(crate) fn join(&self) {
    let handle = self.thread.lock().unwrap().take();
    if let Some(handle) = handle {
      if handle.thread().id() != thread::current().id() {
        let _ = handle.join();
      }
    }
  }
}

// ============================================================================
// LanePool
// ============================================================================

/// A fixed set of lanes handed to workers round-robin.
pub(crate) struct LanePool {
  name: String,
  size: usize,
  daemon: bool,
  lanes: Mutex<Option<Vec<Arc<Lane>>>>,
  next: AtomicUsize,
}

impl LanePool {
  /// Creates and starts a pool of `size` lanes.
  pub(crate) fn new(config: &ExecutorConfig, default_name: &str, size: usize) -> Self {
    let pool = Self {
      name: config.name_or(default_name).to_owned(),
      size: size.max(1),
      daemon: config.is_daemon(),
      lanes: Mutex::new(None),
      next: AtomicUsize::new(0),
    };
    pool.start();
    pool
  }

  pub(crate) fn start(&self) {
    let mut lanes = self.lanes.lock().unwrap();
    if lanes.is_none() {
      *lanes = Some(
        (0..self.size)
          .map(|i| Lane::spawn(format!("{}-{}", self.name, i)))
          .collect(),
      );
    }
  }

  pub(crate) fn shutdown(&self) {
    let lanes = self.lanes.lock().unwrap().take();
    let Some(lanes) = lanes else { return };
    tracing::debug!(executor = %self.name, lanes = lanes.len(), "shutting down");
    lanes.iter().for_each(|lane| lane.shutdown());
    if !self.daemon {
      lanes.iter().for_each(|lane| lane.join());
    }
  }

  /// Next lane in round-robin order, `None` while shut down.
  pub(crate) fn pick(&self) -> Option<Arc<Lane>> {
    let lanes = self.lanes.lock().unwrap();
    let lanes = lanes.as_ref()?;
    let idx = self.next.fetch_add(1, Ordering::Relaxed) % lanes.len();
    Some(lanes[idx].clone())
  }

  pub(crate) fn create_worker(&self) -> Arc<dyn Worker> {
    match self.pick() {
      Some(lane) => Arc::new(TrackedWorker::new(lane.dispatcher())),
      None => Arc::new(TrackedWorker::rejected()),
    }
  }

  #[inline]
  pub(crate) fn size(&self) -> usize { self.size }
}

// ============================================================================
// Timer
// ============================================================================

/// A lane that only waits: it hands each job to its target dispatcher once
/// the job is due.
pub(crate) struct Timer {
  lane: Arc<Lane>,
}

impl Timer {
  pub(crate) fn spawn(name: &str) -> Self { Self { lane: Lane::spawn(name.to_owned()) } }

  pub(crate) fn relay(&self, target: Arc<dyn Dispatch>, job: Action, due: Instant) {
    self
      .lane
      .queue
      .push(Box::new(move || target.dispatch(job)), due);
  }

  pub(crate) fn shutdown(&self) { self.lane.shutdown(); }

  pub(crate) fn join(&self) { self.lane.join(); }
}

/// Runs jobs on `target`, holding back the ones not yet due on a [`Timer`].
pub(crate) struct Timed<D> {
  target: Arc<D>,
  timer: Arc<Timer>,
}

impl<D> Timed<D> {
  pub(crate) fn new(target: Arc<D>, timer: Arc<Timer>) -> Self { Self { target, timer } }
}

impl<D: Dispatch + 'static> Dispatch for Timed<D> {
  fn dispatch(&self, job: Action) { self.target.dispatch(job) }

  fn dispatch_at(&self, job: Action, due: Instant) {
    if due <= Instant::now() {
      self.target.dispatch(job)
    } else {
      self.timer.relay(self.target.clone(), job, due)
    }
  }
}

#[cfg(test)]
mod test {
  use std::{sync::mpsc, time::Duration};

  use super::*;
  use crate::subscription::Disposable;

  #[test]
  fn earliest_due_first_then_fifo() {
    let queue = JobQueue::new();
    let order = Arc::new(Mutex::new(vec![]));
    let base = Instant::now();
    for (label, offset) in [("c", 20), ("a", 0), ("b", 0), ("d", 20)] {
      let c_order = order.clone();
      queue.push(
        Box::new(move || c_order.lock().unwrap().push(label)),
        base + Duration::from_millis(offset),
      );
    }
    let c_queue = queue.clone();
    queue.push(Box::new(move || c_queue.shutdown()), base + Duration::from_millis(30));
    queue.run();
    assert_eq!(*order.lock().unwrap(), vec!["a", "b", "c", "d"]);
  }

  #[test]
  fn push_after_shutdown_is_refused() {
    let queue = JobQueue::new();
    queue.shutdown();
    assert!(!queue.push(Box::new(|| {}), Instant::now()));
    assert_eq!(queue.len(), 0);
    queue.reopen();
    assert!(queue.push(Box::new(|| {}), Instant::now()));
  }

  #[test]
  fn lane_runs_on_named_thread() {
    let lane = Lane::spawn("lane-test-0".to_owned());
    let (tx, rx) = mpsc::channel();
    lane.dispatcher().dispatch(Box::new(move || {
      tx.send(thread::current().name().map(str::to_owned)).unwrap();
    }));
    let name = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert_eq!(name.as_deref(), Some(lane.name()));
    lane.shutdown();
    lane.join();
    assert!(lane.is_shutdown());
  }

  #[test]
  fn pool_hands_out_lanes_round_robin() {
    let pool = LanePool::new(&ExecutorConfig::new().daemon(false), "pool-test", 2);
    let first = pool.pick().unwrap();
    let second = pool.pick().unwrap();
    let third = pool.pick().unwrap();
    assert_ne!(first.name(), second.name());
    assert_eq!(first.name(), third.name());
    assert_eq!(pool.size(), 2);

    pool.shutdown();
    assert!(pool.pick().is_none());
    assert!(pool.create_worker().is_disposed());
  }

  #[test]
  fn timer_relays_when_due() {
    let timer = Timer::spawn("timer-test");
    let target = JobQueue::new();
    let (tx, rx) = mpsc::channel();
    let start = Instant::now();
    timer.relay(
      target.clone(),
      Box::new(move || tx.send(Instant::now()).unwrap()),
      start + Duration::from_millis(20),
    );
    let c_target = target.clone();
    let runner = thread::spawn(move || c_target.run());
    let ran_at = rx.recv_timeout(Duration::from_secs(5)).unwrap();
    assert!(ran_at >= start + Duration::from_millis(20));
    target.shutdown();
    runner.join().unwrap();
    timer.shutdown();
    timer.join();
  }
}
