//! Executors: where and when work runs.
//!
//! An [`ExecutorService`] hands out [`Worker`]s. A worker accepts one-shot,
//! delayed and periodic actions and keeps track of them, so disposing the
//! worker cancels everything it still holds. The strategies differ only in
//! which threads run the actions:
//!
//! | Strategy | Threads |
//! |---|---|
//! | [`SingleExecutor`] | one thread shared by every worker |
//! | [`ParallelExecutor`] | fixed pool, each worker pinned to one thread |
//! | [`IoExecutor`] | cached threads, reused after a worker is disposed |
//! | [`ThreadExecutor`] | one fresh thread per worker |
//! | [`TrampolineExecutor`] | the submitting thread, queued while busy |
//! | [`TaskExecutor`] | a `futures` thread pool (or a tokio runtime) |
//! | [`ImmediateExecutor`] | the submitting thread, right away |
//! | [`SharedExecutor`] | the thread of an existing worker |
//! | [`BlockingExecutor`] | the thread that calls `start` |
//! | [`TestExecutor`] | the test thread, on virtual time |
//!
//! Timed work of the strategies without their own queue thread is relayed
//! through a shared timer thread, owned by the [`ExecutorContext`].
//!
//! A panicking action never takes its thread down: the panic is caught,
//! reported through `tracing` as [`FlowError::SchedulingFailure`](crate::FlowError)
//! and, for periodic actions, ends the repetition.

use std::{
  sync::Arc,
  time::{Duration, Instant},
};

use crate::subscription::{Disposable, DisposableRef};

mod action;
mod blocking;
mod config;
mod context;
mod immediate;
mod io;
mod lane;
mod parallel;
mod shared;
mod single;
mod task;
mod test_executor;
mod thread;
mod trampoline;
mod worker;

pub use blocking::{BlockingExecutor, Bootstrap};
pub use config::ExecutorConfig;
pub use context::{ExecutorContext, Executors};
pub use immediate::ImmediateExecutor;
pub use io::IoExecutor;
pub use parallel::ParallelExecutor;
pub use shared::SharedExecutor;
pub use single::SingleExecutor;
pub use task::TaskExecutor;
pub use test_executor::TestExecutor;
pub use thread::ThreadExecutor;
pub use trampoline::TrampolineExecutor;

/// A one-shot unit of work.
pub type Action = Box<dyn FnOnce() + Send>;

/// A unit of work run repeatedly.
pub type PeriodicAction = Box<dyn FnMut() + Send>;

/// Runs actions and tracks them until they finish.
///
/// Disposing a worker cancels every action it still tracks; actions offered
/// afterwards are rejected with an already disposed handle.
pub trait Worker: Disposable {
  /// The worker's notion of the current time.
  fn now(&self) -> Instant { Instant::now() }

  /// Runs `action` as soon as possible.
  fn schedule(&self, action: Action) -> DisposableRef;

  /// Runs `action` once `delay` has elapsed.
  fn schedule_after(&self, action: Action, delay: Duration) -> DisposableRef;

  /// Runs `action` after `initial_delay`, then every `period`.
  ///
  /// The k-th run is due `initial_delay + (k - 1) * period` after the call.
  /// A run that overruns its period delays the next one instead of
  /// overlapping it, and missed deadlines are not made up for.
  fn schedule_periodically(
    &self,
    action: PeriodicAction,
    initial_delay: Duration,
    period: Duration,
  ) -> DisposableRef;
}

/// Source of [`Worker`]s.
///
/// The `schedule*` conveniences run the action on a fresh worker: the
/// returned handle disposes that worker, and a one-shot action disposes it
/// itself once it ran.
pub trait ExecutorService: Send + Sync {
  fn create_worker(&self) -> Arc<dyn Worker>;

  fn now(&self) -> Instant { Instant::now() }

  fn schedule(&self, action: Action) -> DisposableRef {
    let worker = self.create_worker();
    let release = DisposeOnDrop(worker.clone());
    worker.schedule(Box::new(move || {
      let _release = release;
      action()
    }));
    Arc::new(WorkerHandle(worker))
  }

  fn schedule_after(&self, action: Action, delay: Duration) -> DisposableRef {
    let worker = self.create_worker();
    let release = DisposeOnDrop(worker.clone());
    worker.schedule_after(
      Box::new(move || {
        let _release = release;
        action()
      }),
      delay,
    );
    Arc::new(WorkerHandle(worker))
  }

  fn schedule_periodically(
    &self,
    action: PeriodicAction,
    initial_delay: Duration,
    period: Duration,
  ) -> DisposableRef {
    let worker = self.create_worker();
    worker.schedule_periodically(action, initial_delay, period);
    Arc::new(WorkerHandle(worker))
  }

  /// Starts (or restarts) the threads backing the executor.
  fn start(&self) {}

  /// Stops the threads backing the executor. Workers created afterwards
  /// reject every action until the next `start`.
  fn shutdown(&self) {}
}

/// Disposable view of a worker.
struct WorkerHandle(Arc<dyn Worker>);

impl Disposable for WorkerHandle {
  fn dispose(&self) { self.0.dispose() }

  fn is_disposed(&self) -> bool { self.0.is_disposed() }
}

/// Disposes the worker once the action owning it is done, panicking or not.
struct DisposeOnDrop(Arc<dyn Worker>);

impl Drop for DisposeOnDrop {
  fn drop(&mut self) { self.0.dispose() }
}
