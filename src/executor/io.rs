use std::{
  collections::VecDeque,
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
  },
  time::{Duration, Instant},
};

use super::{lane::Lane, worker::TrackedWorker, ExecutorConfig, ExecutorService, Worker};

/// How long an idle IO thread waits for a new worker before it exits.
pub const IO_KEEP_ALIVE: Duration = Duration::from_secs(60);

/// An unbounded pool of cached threads for blocking work.
///
/// A worker takes an idle thread or starts a new one; disposing the worker
/// hands the thread back. Threads idle for longer than the keep-alive are
/// evicted the next time the pool is touched.
pub struct IoExecutor {
  pool: Arc<IoPool>,
}

struct IoPool {
  name: String,
  keep_alive: Duration,
  daemon: bool,
  spawned: AtomicUsize,
  state: Mutex<IoState>,
}

#[derive(Default)]
struct IoState {
  shutdown: bool,
  // every live lane, idle or in use
  lanes: Vec<Arc<Lane>>,
  // idle lanes with their expiry, most recently released last
  idle: VecDeque<(Arc<Lane>, Instant)>,
}

impl IoExecutor {
  pub fn new(config: ExecutorConfig) -> Self { Self::with_keep_alive(config, IO_KEEP_ALIVE) }

  pub fn with_keep_alive(config: ExecutorConfig, keep_alive: Duration) -> Self {
    Self {
      pool: Arc::new(IoPool {
        name: config.name_or("io").to_owned(),
        keep_alive,
        daemon: config.is_daemon(),
        spawned: AtomicUsize::new(0),
        state: Mutex::new(IoState::default()),
      }),
    }
  }

  /// Number of live threads, idle or in use.
  pub fn thread_count(&self) -> usize { self.pool.state.lock().unwrap().lanes.len() }

  pub fn idle_count(&self) -> usize { self.pool.state.lock().unwrap().idle.len() }
}

impl IoState {
  fn evict_expired(&mut self, now: Instant) -> Vec<Arc<Lane>> {
    let mut evicted = vec![];
    while let Some((_, expiry)) = self.idle.front() {
      if *expiry > now {
        break;
      }
      if let Some((lane, _)) = self.idle.pop_front() {
        self.lanes.retain(|l| !Arc::ptr_eq(l, &lane));
        evicted.push(lane);
      }
    }
    evicted
  }
}

impl IoPool {
  fn acquire(&self) -> Option<Arc<Lane>> {
    let (lane, evicted) = {
      let mut state = self.state.lock().unwrap();
      if state.shutdown {
        return None;
      }
      let evicted = state.evict_expired(Instant::now());
      let lane = match state.idle.pop_back() {
        Some((lane, _)) => lane,
        None => {
          let n = self.spawned.fetch_add(1, Ordering::Relaxed);
          let lane = Lane::spawn(format!("{}-{}", self.name, n));
          state.lanes.push(lane.clone());
          lane
        }
      };
      (lane, evicted)
    };
    retire(&evicted, &self.name);
    Some(lane)
  }

  fn release(&self, lane: Arc<Lane>) {
    let evicted = {
      let mut state = self.state.lock().unwrap();
      if state.shutdown {
        vec![lane]
      } else {
        let now = Instant::now();
        state.idle.push_back((lane, now + self.keep_alive));
        state.evict_expired(now)
      }
    };
    retire(&evicted, &self.name);
  }
}

fn retire(lanes: &[Arc<Lane>], executor: &str) {
  for lane in lanes {
    tracing::debug!(executor, lane = lane.name(), "evicting idle io thread");
    lane.shutdown();
  }
}

impl ExecutorService for IoExecutor {
  fn create_worker(&self) -> Arc<dyn Worker> {
    let Some(lane) = self.pool.acquire() else {
      return Arc::new(TrackedWorker::rejected());
    };
    let pool = self.pool.clone();
    let c_lane = lane.clone();
    Arc::new(TrackedWorker::with_release(lane.dispatcher(), move || {
      pool.release(c_lane)
    }))
  }

  fn start(&self) { self.pool.state.lock().unwrap().shutdown = false; }

  fn shutdown(&self) {
    let lanes = {
      let mut state = self.pool.state.lock().unwrap();
      state.shutdown = true;
      state.idle.clear();
      std::mem::take(&mut state.lanes)
    };
    tracing::debug!(executor = %self.pool.name, lanes = lanes.len(), "shutting down");
    lanes.iter().for_each(|lane| lane.shutdown());
    if !self.pool.daemon {
      lanes.iter().for_each(|lane| lane.join());
    }
  }
}
