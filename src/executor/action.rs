use std::{
  any::Any,
  panic::{catch_unwind, AssertUnwindSafe},
  sync::{
    atomic::{AtomicU8, Ordering},
    Arc, Mutex, Weak,
  },
  time::{Duration, Instant},
};

use super::{worker::ActionSet, Action, PeriodicAction};
use crate::{error::FlowError, subscription::Disposable};

/// Where a tracked action is handed over to run.
///
/// Implemented by every queue a worker can run on. A dispatcher that no
/// longer accepts work drops the job, which disposes the action the job
/// would have run.
pub(crate) trait Dispatch: Send + Sync {
  fn dispatch(&self, job: Action);

  fn dispatch_at(&self, job: Action, due: Instant);

  fn now(&self) -> Instant { Instant::now() }
}

pub(crate) enum Body {
  Once(Action),
  Periodic { action: PeriodicAction, period: Duration, due: Instant },
}

const READY: u8 = 0;
const RUNNING: u8 = 1;
const FINISHED: u8 = 2;
const DISPOSED: u8 = 3;

/// One action tracked by a worker, from submission until it finished or was
/// disposed.
pub(crate) struct ScheduledAction {
  id: usize,
  state: AtomicU8,
  body: Mutex<Option<Body>>,
  parent: Weak<ActionSet>,
  dispatcher: Arc<dyn Dispatch>,
}

impl ScheduledAction {
  pub(crate) fn new(
    id: usize,
    body: Body,
    parent: Weak<ActionSet>,
    dispatcher: Arc<dyn Dispatch>,
  ) -> Self {
    Self {
      id,
      state: AtomicU8::new(READY),
      body: Mutex::new(Some(body)),
      parent,
      dispatcher,
    }
  }

  /// Hands the action to its dispatcher, to run at `due` if given.
  pub(crate) fn submit(self: &Arc<Self>, due: Option<Instant>) {
    let mut pending = Pending(Some(self.clone()));
    let job: Action = Box::new(move || {
      if let Some(this) = pending.0.take() {
        this.run()
      }
    });
    match due {
      Some(due) => self.dispatcher.dispatch_at(job, due),
      None => self.dispatcher.dispatch(job),
    }
  }

  fn run(self: Arc<Self>) {
    if self
      .state
      .compare_exchange(READY, RUNNING, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      return;
    }
    let body = self.body.lock().unwrap().take();
    match body {
      Some(Body::Once(action)) => {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(action)) {
          report_panic(payload);
        }
        self.finish();
      }
      Some(Body::Periodic { mut action, period, due }) => {
        if let Err(payload) = catch_unwind(AssertUnwindSafe(&mut action)) {
          report_panic(payload);
          self.finish();
          return;
        }
        let next = (due + period).max(self.dispatcher.now());
        *self.body.lock().unwrap() = Some(Body::Periodic { action, period, due: next });
        if self
          .state
          .compare_exchange(RUNNING, READY, Ordering::AcqRel, Ordering::Acquire)
          .is_ok()
        {
          self.submit(Some(next));
        } else {
          // disposed while running
          let body = self.body.lock().unwrap().take();
          drop(body);
        }
      }
      None => self.finish(),
    }
  }

  fn finish(&self) {
    let _ = self
      .state
      .compare_exchange(RUNNING, FINISHED, Ordering::AcqRel, Ordering::Acquire);
    self.unregister();
  }

  fn unregister(&self) {
    if let Some(parent) = self.parent.upgrade() {
      parent.delete(self.id);
    }
  }
}

/// The action carried by a dispatched job. Dropping a job that never ran,
/// refused or discarded by a shut down queue, disposes its action.
struct Pending(Option<Arc<ScheduledAction>>);

impl Drop for Pending {
  fn drop(&mut self) {
    if let Some(action) = self.0.take() {
      action.dispose();
    }
  }
}

impl Disposable for ScheduledAction {
  fn dispose(&self) {
    let mut state = self.state.load(Ordering::Acquire);
    loop {
      if state == FINISHED || state == DISPOSED {
        return;
      }
      match self
        .state
        .compare_exchange_weak(state, DISPOSED, Ordering::AcqRel, Ordering::Acquire)
      {
        Ok(_) => break,
        Err(actual) => state = actual,
      }
    }
    if state == READY {
      let body = self.body.lock().unwrap().take();
      drop(body);
    }
    self.unregister();
  }

  fn is_disposed(&self) -> bool {
    matches!(self.state.load(Ordering::Acquire), FINISHED | DISPOSED)
  }
}

fn report_panic(payload: Box<dyn Any + Send>) {
  let message = payload
    .downcast_ref::<&str>()
    .map(|s| s.to_string())
    .or_else(|| payload.downcast_ref::<String>().cloned())
    .unwrap_or_else(|| "non-string panic payload".to_owned());
  let error = FlowError::SchedulingFailure(message);
  tracing::error!(label = error.as_label(), %error, "scheduled action panicked");
}

#[cfg(test)]
mod test {
  use std::sync::atomic::AtomicUsize;

  use super::*;

  /// Keeps jobs until the test runs them by hand.
  #[derive(Default)]
  struct Manual {
    jobs: Mutex<Vec<(Action, Option<Instant>)>>,
  }

  impl Manual {
    fn run_all(&self) -> usize {
      let jobs = std::mem::take(&mut *self.jobs.lock().unwrap());
      let n = jobs.len();
      jobs.into_iter().for_each(|(job, _)| job());
      n
    }
  }

  impl Dispatch for Manual {
    fn dispatch(&self, job: Action) { self.jobs.lock().unwrap().push((job, None)); }

    fn dispatch_at(&self, job: Action, due: Instant) {
      self.jobs.lock().unwrap().push((job, Some(due)));
    }
  }

  fn scheduled(body: Body, dispatcher: &Arc<Manual>) -> Arc<ScheduledAction> {
    let dispatcher: Arc<dyn Dispatch> = dispatcher.clone();
    Arc::new(ScheduledAction::new(0, body, Weak::new(), dispatcher))
  }

  #[test]
  fn once_runs_once() {
    let manual = Arc::new(Manual::default());
    let hits = Arc::new(AtomicUsize::new(0));
    let c_hits = hits.clone();
    let action = scheduled(
      Body::Once(Box::new(move || {
        c_hits.fetch_add(1, Ordering::SeqCst);
      })),
      &manual,
    );
    action.submit(None);
    action.submit(None);
    assert_eq!(manual.run_all(), 2);
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    assert!(action.is_disposed());
  }

  #[test]
  fn dispose_before_run() {
    let manual = Arc::new(Manual::default());
    let action = scheduled(Body::Once(Box::new(|| panic!("must not run"))), &manual);
    action.submit(None);
    action.dispose();
    assert!(action.is_disposed());
    manual.run_all();
  }

  #[test]
  fn periodic_resubmits_with_next_due() {
    let manual = Arc::new(Manual::default());
    let hits = Arc::new(AtomicUsize::new(0));
    let c_hits = hits.clone();
    let due = Instant::now();
    let period = Duration::from_secs(3600);
    let action = scheduled(
      Body::Periodic {
        action: Box::new(move || {
          c_hits.fetch_add(1, Ordering::SeqCst);
        }),
        period,
        due,
      },
      &manual,
    );
    action.submit(Some(due));
    manual.run_all();
    manual.run_all();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    let next = manual.jobs.lock().unwrap()[0].1;
    assert_eq!(next, Some(due + period * 2));

    action.dispose();
    manual.run_all();
    assert_eq!(hits.load(Ordering::SeqCst), 2);
    assert!(manual.jobs.lock().unwrap().is_empty());
  }

  #[test]
  fn dropped_job_disposes_the_action() {
    let manual = Arc::new(Manual::default());
    let action = scheduled(Body::Once(Box::new(|| panic!("must not run"))), &manual);
    action.submit(None);
    assert!(!action.is_disposed());
    manual.jobs.lock().unwrap().clear();
    assert!(action.is_disposed());
  }

  #[test]
  fn periodic_dropped_between_runs_is_disposed() {
    let manual = Arc::new(Manual::default());
    let hits = Arc::new(AtomicUsize::new(0));
    let c_hits = hits.clone();
    let action = scheduled(
      Body::Periodic {
        action: Box::new(move || {
          c_hits.fetch_add(1, Ordering::SeqCst);
        }),
        period: Duration::from_millis(1),
        due: Instant::now(),
      },
      &manual,
    );
    action.submit(None);
    manual.run_all();
    assert_eq!(hits.load(Ordering::SeqCst), 1);
    manual.jobs.lock().unwrap().clear();
    assert!(action.is_disposed());
  }

  #[test]
  fn panic_is_contained() {
    let manual = Arc::new(Manual::default());
    let action = scheduled(
      Body::Periodic {
        action: Box::new(|| panic!("boom")),
        period: Duration::from_millis(1),
        due: Instant::now(),
      },
      &manual,
    );
    action.submit(None);
    manual.run_all();
    assert!(action.is_disposed());
    assert!(manual.jobs.lock().unwrap().is_empty());
  }
}
