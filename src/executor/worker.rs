use std::{
  collections::HashMap,
  sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
  },
  time::{Duration, Instant},
};

use super::{
  action::{Body, Dispatch, ScheduledAction},
  Action, PeriodicAction, Worker,
};
use crate::subscription::{Disposable, DisposableRef, Disposed};

/// The actions a worker still tracks.
///
/// The `disposed` flag is checked before and the map state inside the lock,
/// so an action added concurrently with `dispose` is either disposed with
/// the rest or rejected.
pub(crate) struct ActionSet {
  disposed: AtomicBool,
  next_id: AtomicUsize,
  actions: Mutex<Option<HashMap<usize, Arc<ScheduledAction>>>>,
}

impl ActionSet {
  pub(crate) fn new() -> Arc<Self> {
    Arc::new(Self {
      disposed: AtomicBool::new(false),
      next_id: AtomicUsize::new(0),
      actions: Mutex::new(Some(HashMap::new())),
    })
  }

  /// Tracks `body`, or returns `None` once the set is disposed.
  pub(crate) fn add(
    self: &Arc<Self>,
    body: Body,
    dispatcher: &Arc<dyn Dispatch>,
  ) -> Option<Arc<ScheduledAction>> {
    if self.is_disposed() {
      return None;
    }
    let id = self.next_id.fetch_add(1, Ordering::Relaxed);
    let action = Arc::new(ScheduledAction::new(
      id,
      body,
      Arc::downgrade(self),
      dispatcher.clone(),
    ));
    let added = match self.actions.lock().unwrap().as_mut() {
      Some(actions) => {
        actions.insert(id, action.clone());
        true
      }
      None => false,
    };
    added.then_some(action)
  }

  pub(crate) fn delete(&self, id: usize) {
    if self.is_disposed() {
      return;
    }
    let removed = self
      .actions
      .lock()
      .unwrap()
      .as_mut()
      .and_then(|actions| actions.remove(&id));
    drop(removed);
  }

  #[cfg(test)]
  pub(crate) fn len(&self) -> usize {
    self.actions.lock().unwrap().as_ref().map_or(0, HashMap::len)
  }

  pub(crate) fn dispose(&self) {
    if self.disposed.swap(true, Ordering::AcqRel) {
      return;
    }
    let actions = self.actions.lock().unwrap().take();
    for action in actions.into_iter().flat_map(HashMap::into_values) {
      action.dispose();
    }
  }

  #[inline]
  pub(crate) fn is_disposed(&self) -> bool { self.disposed.load(Ordering::Acquire) }
}

/// A worker tracking its actions in an [`ActionSet`] and running them through
/// a dispatcher.
///
/// Every strategy builds its workers from this one; they differ in the
/// dispatcher and in what happens on disposal.
pub(crate) struct TrackedWorker {
  actions: Arc<ActionSet>,
  dispatcher: Arc<dyn Dispatch>,
  on_dispose: Mutex<Option<Box<dyn FnOnce() + Send>>>,
}

impl TrackedWorker {
  pub(crate) fn new(dispatcher: Arc<dyn Dispatch>) -> Self {
    Self {
      actions: ActionSet::new(),
      dispatcher,
      on_dispose: Mutex::new(None),
    }
  }

  /// A worker that runs `release` once it is disposed.
  pub(crate) fn with_release(
    dispatcher: Arc<dyn Dispatch>,
    release: impl FnOnce() + Send + 'static,
  ) -> Self {
    let worker = Self::new(dispatcher);
    *worker.on_dispose.lock().unwrap() = Some(Box::new(release));
    worker
  }

  /// A worker of a shut down executor: rejects every action.
  pub(crate) fn rejected() -> Self {
    let worker = Self::new(Arc::new(Rejected));
    worker.actions.dispose();
    worker
  }

  /// Number of actions not yet finished or disposed.
  #[cfg(test)]
  pub(crate) fn pending(&self) -> usize { self.actions.len() }

  fn submit(&self, body: Body, due: Option<Instant>) -> DisposableRef {
    match self.actions.add(body, &self.dispatcher) {
      Some(action) => {
        action.submit(due);
        let handle: DisposableRef = action;
        handle
      }
      None => Disposed::shared(),
    }
  }
}

impl Disposable for TrackedWorker {
  fn dispose(&self) {
    self.actions.dispose();
    let release = self.on_dispose.lock().unwrap().take();
    if let Some(release) = release {
      release();
    }
  }

  fn is_disposed(&self) -> bool { self.actions.is_disposed() }
}

impl Worker for TrackedWorker {
  fn now(&self) -> Instant { self.dispatcher.now() }

  fn schedule(&self, action: Action) -> DisposableRef { self.submit(Body::Once(action), None) }

  fn schedule_after(&self, action: Action, delay: Duration) -> DisposableRef {
    let due = self.dispatcher.now() + delay;
    self.submit(Body::Once(action), Some(due))
  }

  fn schedule_periodically(
    &self,
    action: PeriodicAction,
    initial_delay: Duration,
    period: Duration,
  ) -> DisposableRef {
    let due = self.dispatcher.now() + initial_delay;
    self.submit(Body::Periodic { action, period, due }, Some(due))
  }
}

struct Rejected;

impl Dispatch for Rejected {
  fn dispatch(&self, _job: Action) {}

  fn dispatch_at(&self, _job: Action, _due: Instant) {}
}
