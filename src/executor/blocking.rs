use std::{
  sync::{Arc, Mutex},
  time::Instant,
};

use super::{
  action::Dispatch,
  lane::{JobQueue, Timer},
  worker::TrackedWorker,
  Action, ExecutorConfig, ExecutorContext, ExecutorService, Worker,
};

/// Work run first by [`BlockingExecutor::start`], handed the executor it
/// bootstraps.
pub type Bootstrap = Box<dyn FnOnce(&BlockingExecutor) + Send>;

/// An executor run by a thread of the caller's choosing.
///
/// `start` turns the calling thread into the executor thread: it runs the
/// initial action first, then every scheduled action, and only returns once
/// `shutdown` is called (typically from one of the actions). Actions
/// scheduled before `start` wait for it.
///
/// ```rust
/// use std::sync::{
///   atomic::{AtomicUsize, Ordering},
///   Arc,
/// };
///
/// use rxstreams::executor::{BlockingExecutor, ExecutorConfig, ExecutorService};
///
/// let executor = BlockingExecutor::new(None, ExecutorConfig::new());
/// let hits = Arc::new(AtomicUsize::new(0));
/// let c_hits = hits.clone();
/// let c_executor = executor.clone();
/// executor.schedule(Box::new(move || {
///   c_hits.fetch_add(1, Ordering::SeqCst);
///   c_executor.shutdown();
/// }));
/// executor.start();
/// assert_eq!(hits.load(Ordering::SeqCst), 1);
/// ```
#[derive(Clone)]
pub struct BlockingExecutor {
  inner: Arc<Inner>,
}

struct Inner {
  name: String,
  queue: Arc<JobQueue>,
  initial: Mutex<Option<Bootstrap>>,
  own_timer: bool,
  daemon: bool,
  timer: Mutex<Option<Arc<Timer>>>,
}

impl BlockingExecutor {
  pub fn new(initial: Option<Bootstrap>, config: ExecutorConfig) -> Self {
    Self {
      inner: Arc::new(Inner {
        name: config.name_or("blocking").to_owned(),
        queue: JobQueue::new(),
        initial: Mutex::new(initial),
        own_timer: config.has_own_timer(),
        daemon: config.is_daemon(),
        timer: Mutex::new(None),
      }),
    }
  }
}

impl Inner {
  fn timer(&self) -> Arc<Timer> {
    if !self.own_timer {
      return ExecutorContext::global().timer();
    }
    self
      .timer
      .lock()
      .unwrap()
      .get_or_insert_with(|| Arc::new(Timer::spawn(&format!("{}-timer", self.name))))
      .clone()
  }
}

impl Dispatch for Inner {
  fn dispatch(&self, job: Action) { self.queue.push(job, Instant::now()); }

  fn dispatch_at(&self, job: Action, due: Instant) {
    if due <= Instant::now() {
      self.dispatch(job)
    } else {
      self.timer().relay(self.queue.clone(), job, due)
    }
  }
}

impl ExecutorService for BlockingExecutor {
  fn create_worker(&self) -> Arc<dyn Worker> {
    let dispatcher: Arc<dyn Dispatch> = self.inner.clone();
    Arc::new(TrackedWorker::new(dispatcher))
  }

  /// Runs the executor on the current thread until `shutdown`.
  fn start(&self) {
    let inner = &self.inner;
    inner.queue.reopen();
    tracing::debug!(executor = %inner.name, "blocking executor started");
    let initial = inner.initial.lock().unwrap().take();
    if let Some(initial) = initial {
      initial(self);
    }
    inner.queue.run();
    tracing::debug!(executor = %inner.name, "blocking executor stopped");
  }

  fn shutdown(&self) {
    let inner = &self.inner;
    inner.queue.shutdown();
    let timer = inner.timer.lock().unwrap().take();
    if let Some(timer) = timer {
      timer.shutdown();
      if !inner.daemon {
        timer.join();
      }
    }
  }
}

#[cfg(test)]
mod test {
  use std::{
    sync::{
      atomic::{AtomicUsize, Ordering},
      mpsc,
    },
    thread,
    time::Duration,
  };

  use super::*;

  #[test]
  fn initial_action_runs_first() {
    let log = Arc::new(Mutex::new(vec![]));
    let c_log = log.clone();
    let executor = BlockingExecutor::new(
      Some(Box::new(move |_: &BlockingExecutor| c_log.lock().unwrap().push("initial"))),
      ExecutorConfig::new(),
    );
    let c_log = log.clone();
    let c_executor = executor.clone();
    executor.schedule(Box::new(move || {
      c_log.lock().unwrap().push("queued");
      c_executor.shutdown();
    }));
    executor.start();
    assert_eq!(*log.lock().unwrap(), vec!["initial", "queued"]);
  }

  #[test]
  fn initial_action_drives_its_executor() {
    let log = Arc::new(Mutex::new(vec![]));
    let c_log = log.clone();
    let executor = BlockingExecutor::new(
      Some(Box::new(move |executor: &BlockingExecutor| {
        c_log.lock().unwrap().push("initial");
        let c_executor = executor.clone();
        let c_log = c_log.clone();
        executor.schedule_after(
          Box::new(move || {
            c_log.lock().unwrap().push("scheduled by initial");
            c_executor.shutdown();
          }),
          Duration::from_millis(5),
        );
      })),
      ExecutorConfig::new().own_timer(true).daemon(false),
    );
    executor.start();
    assert_eq!(*log.lock().unwrap(), vec!["initial", "scheduled by initial"]);
  }

  #[test]
  fn runs_on_starting_thread() {
    let executor = BlockingExecutor::new(None, ExecutorConfig::new());
    let starter = thread::current().id();
    let ran_on = Arc::new(Mutex::new(None));
    let c_ran_on = ran_on.clone();
    let c_executor = executor.clone();
    executor.schedule(Box::new(move || {
      *c_ran_on.lock().unwrap() = Some(thread::current().id());
      c_executor.shutdown();
    }));
    executor.start();
    assert_eq!(*ran_on.lock().unwrap(), Some(starter));
  }

  #[test]
  fn shutdown_from_another_thread() {
    let executor = BlockingExecutor::new(None, ExecutorConfig::new().own_timer(true).daemon(false));
    let hits = Arc::new(AtomicUsize::new(0));
    let c_hits = hits.clone();
    executor.schedule_periodically(
      Box::new(move || {
        c_hits.fetch_add(1, Ordering::SeqCst);
      }),
      Duration::ZERO,
      Duration::from_millis(5),
    );
    let (tx, rx) = mpsc::channel();
    let c_executor = executor.clone();
    let runner = thread::spawn(move || {
      c_executor.start();
      tx.send(()).unwrap();
    });
    let deadline = Instant::now() + Duration::from_secs(5);
    while hits.load(Ordering::SeqCst) < 2 && Instant::now() < deadline {
      thread::sleep(Duration::from_millis(1));
    }
    executor.shutdown();
    rx.recv_timeout(Duration::from_secs(5)).unwrap();
    runner.join().unwrap();
    assert!(hits.load(Ordering::SeqCst) >= 2);
  }
}
