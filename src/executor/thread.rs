use std::{
  collections::HashMap,
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
  },
};

use super::{lane::Lane, worker::TrackedWorker, ExecutorConfig, ExecutorService, Worker};

/// Gives every worker a thread of its own, ended when the worker is
/// disposed.
pub struct ThreadExecutor {
  inner: Arc<Inner>,
}

struct Inner {
  name: String,
  daemon: bool,
  spawned: AtomicUsize,
  // live lanes by spawn number; `None` once shut down
  lanes: Mutex<Option<HashMap<usize, Arc<Lane>>>>,
}

impl ThreadExecutor {
  pub fn new(config: ExecutorConfig) -> Self {
    Self {
      inner: Arc::new(Inner {
        name: config.name_or("thread").to_owned(),
        daemon: config.is_daemon(),
        spawned: AtomicUsize::new(0),
        lanes: Mutex::new(Some(HashMap::new())),
      }),
    }
  }

  /// Number of threads of workers not yet disposed.
  pub fn thread_count(&self) -> usize {
    self
      .inner
      .lanes
      .lock()
      .unwrap()
      .as_ref()
      .map_or(0, HashMap::len)
  }
}

impl ExecutorService for ThreadExecutor {
  fn create_worker(&self) -> Arc<dyn Worker> {
    let n = self.inner.spawned.fetch_add(1, Ordering::Relaxed);
    let lane = {
      let mut lanes = self.inner.lanes.lock().unwrap();
      let Some(lanes) = lanes.as_mut() else {
        return Arc::new(TrackedWorker::rejected());
      };
      let lane = Lane::spawn(format!("{}-{}", self.inner.name, n));
      lanes.insert(n, lane.clone());
      lane
    };
    let inner = self.inner.clone();
    Arc::new(TrackedWorker::with_release(lane.dispatcher(), move || {
      let lane = inner
        .lanes
        .lock()
        .unwrap()
        .as_mut()
        .and_then(|lanes| lanes.remove(&n));
      if let Some(lane) = lane {
        lane.shutdown();
      }
    }))
  }

  fn start(&self) {
    let mut lanes = self.inner.lanes.lock().unwrap();
    if lanes.is_none() {
      *lanes = Some(HashMap::new());
    }
  }

  fn shutdown(&self) {
    let lanes = self.inner.lanes.lock().unwrap().take();
    let Some(lanes) = lanes else { return };
    tracing::debug!(executor = %self.inner.name, lanes = lanes.len(), "shutting down");
    lanes.values().for_each(|lane| lane.shutdown());
    if !self.inner.daemon {
      lanes.values().for_each(|lane| lane.join());
    }
  }
}

#[cfg(test)]
mod test {
  use std::{sync::mpsc, thread, time::Duration};

  use super::*;
  use crate::subscription::Disposable;

  #[test]
  fn thread_per_worker() {
    let executor = ThreadExecutor::new(ExecutorConfig::new().name("thread-each"));
    let (tx, rx) = mpsc::channel();
    let workers: Vec<_> = (0..3).map(|_| executor.create_worker()).collect();
    for worker in &workers {
      let c_tx = tx.clone();
      worker.schedule(Box::new(move || {
        c_tx.send(thread::current().name().unwrap_or_default().to_owned())
          .unwrap();
      }));
    }
    let mut names: Vec<_> = (0..3)
      .map(|_| rx.recv_timeout(Duration::from_secs(5)).unwrap())
      .collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), 3);
    assert_eq!(executor.thread_count(), 3);

    workers[0].dispose();
    assert_eq!(executor.thread_count(), 2);
    executor.shutdown();
    assert_eq!(executor.thread_count(), 0);
    assert!(executor.create_worker().is_disposed());
  }

  #[test]
  fn direct_schedule_releases_its_thread() {
    let executor = ThreadExecutor::new(ExecutorConfig::new().name("thread-direct"));
    let (tx, rx) = mpsc::channel();
    executor.schedule(Box::new(move || tx.send(()).unwrap()));
    rx.recv_timeout(Duration::from_secs(5)).unwrap();
    // the ephemeral worker is disposed right after the action returns
    let deadline = std::time::Instant::now() + Duration::from_secs(5);
    while executor.thread_count() > 0 && std::time::Instant::now() < deadline {
      thread::sleep(Duration::from_millis(1));
    }
    assert_eq!(executor.thread_count(), 0);
  }
}
