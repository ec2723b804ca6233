use std::{cell::RefCell, collections::VecDeque, sync::Arc, time::Instant};

use super::{
  action::Dispatch,
  lane::{Timed, Timer},
  worker::TrackedWorker,
  Action, ExecutorContext, ExecutorService, Worker,
};

/// Runs actions on the calling thread before `schedule` returns.
///
/// An action scheduled from inside a running action runs right after it,
/// still before the outermost `schedule` returns.
///
/// Timed actions run on the shared timer thread once due.
pub struct ImmediateExecutor {
  timer: Arc<Timer>,
}

impl ImmediateExecutor {
  pub fn new() -> Self { Self::with_timer(ExecutorContext::global().timer()) }

  pub(crate) fn with_timer(timer: Arc<Timer>) -> Self { Self { timer } }
}

impl Default for ImmediateExecutor {
  fn default() -> Self { Self::new() }
}

impl ExecutorService for ImmediateExecutor {
  fn create_worker(&self) -> Arc<dyn Worker> {
    Arc::new(TrackedWorker::new(Arc::new(Timed::new(Arc::new(RunNow), self.timer.clone()))))
  }
}

thread_local! {
  /// Jobs dispatched on this thread while one of its jobs is running.
  static NESTED: RefCell<Option<VecDeque<Action>>> = const { RefCell::new(None) };
}

/// Runs jobs on the dispatching thread. A job dispatched from inside a
/// running job is queued and run once the outer job returns, so the stack
/// does not grow with the nesting depth.
struct RunNow;

impl Dispatch for RunNow {
  fn dispatch(&self, job: Action) {
    let job = NESTED.with(|nested| match nested.borrow_mut().as_mut() {
      Some(queue) => {
        queue.push_back(job);
        None
      }
      None => Some(job),
    });
    let Some(job) = job else { return };

    NESTED.with(|nested| *nested.borrow_mut() = Some(VecDeque::new()));
    let mut next = Some(job);
    while let Some(job) = next {
      job();
      next = NESTED.with(|nested| nested.borrow_mut().as_mut().and_then(VecDeque::pop_front));
    }
    NESTED.with(|nested| *nested.borrow_mut() = None);
  }

  fn dispatch_at(&self, job: Action, _due: Instant) { self.dispatch(job) }
}
