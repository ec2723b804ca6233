use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};

use super::{
  lane::Timer, BlockingExecutor, Bootstrap, ExecutorConfig, ExecutorService, ImmediateExecutor,
  IoExecutor, ParallelExecutor, SharedExecutor, SingleExecutor, TaskExecutor, ThreadExecutor,
  TrampolineExecutor, Worker,
};

static GLOBAL: Lazy<ExecutorContext> = Lazy::new(ExecutorContext::default);

/// Owner of the process-wide executors and the shared timer thread.
///
/// Each default executor is created on first use and lives for the rest of
/// the process.
#[derive(Default)]
pub struct ExecutorContext {
  timer: OnceCell<Arc<Timer>>,
  single: OnceCell<Arc<dyn ExecutorService>>,
  computation: OnceCell<Arc<dyn ExecutorService>>,
  io: OnceCell<Arc<dyn ExecutorService>>,
  thread: OnceCell<Arc<dyn ExecutorService>>,
  trampoline: OnceCell<Arc<dyn ExecutorService>>,
  task: OnceCell<Arc<dyn ExecutorService>>,
  immediate: OnceCell<Arc<dyn ExecutorService>>,
}

fn shared(
  cell: &OnceCell<Arc<dyn ExecutorService>>,
  init: impl FnOnce() -> Arc<dyn ExecutorService>,
) -> Arc<dyn ExecutorService> {
  cell.get_or_init(init).clone()
}

impl ExecutorContext {
  pub fn global() -> &'static ExecutorContext { &GLOBAL }

  pub(crate) fn timer(&self) -> Arc<Timer> {
    self
      .timer
      .get_or_init(|| Arc::new(Timer::spawn("rx-timer")))
      .clone()
  }

  pub fn single(&self) -> Arc<dyn ExecutorService> {
    shared(&self.single, || Arc::new(SingleExecutor::new(ExecutorConfig::new())))
  }

  pub fn computation(&self) -> Arc<dyn ExecutorService> {
    shared(&self.computation, || Arc::new(ParallelExecutor::new(ExecutorConfig::new())))
  }

  pub fn io(&self) -> Arc<dyn ExecutorService> {
    shared(&self.io, || Arc::new(IoExecutor::new(ExecutorConfig::new())))
  }

  pub fn thread(&self) -> Arc<dyn ExecutorService> {
    shared(&self.thread, || Arc::new(ThreadExecutor::new(ExecutorConfig::new())))
  }

  pub fn trampoline(&self) -> Arc<dyn ExecutorService> {
    shared(&self.trampoline, || {
      Arc::new(TrampolineExecutor::with_timer(self.timer()))
    })
  }

  pub fn task(&self) -> Arc<dyn ExecutorService> {
    shared(&self.task, || {
      Arc::new(TaskExecutor::with_timer(ExecutorConfig::new(), self.timer()))
    })
  }

  pub fn immediate(&self) -> Arc<dyn ExecutorService> {
    shared(&self.immediate, || Arc::new(ImmediateExecutor::with_timer(self.timer())))
  }
}

/// Factory of executors: the process-wide defaults and freshly configured
/// instances.
///
/// ```rust
/// use std::sync::mpsc;
///
/// use rxstreams::executor::{ExecutorConfig, Executors};
///
/// let executor = Executors::new_single(ExecutorConfig::new().name("example"));
/// let (tx, rx) = mpsc::channel();
/// executor.schedule(Box::new(move || tx.send(42).unwrap()));
/// assert_eq!(rx.recv().unwrap(), 42);
/// executor.shutdown();
/// ```
pub struct Executors;

impl Executors {
  /// The process-wide single-thread executor.
  pub fn single() -> Arc<dyn ExecutorService> { ExecutorContext::global().single() }

  /// The process-wide parallel executor, one thread per available core.
  pub fn computation() -> Arc<dyn ExecutorService> { ExecutorContext::global().computation() }

  pub fn io() -> Arc<dyn ExecutorService> { ExecutorContext::global().io() }

  pub fn thread() -> Arc<dyn ExecutorService> { ExecutorContext::global().thread() }

  pub fn trampoline() -> Arc<dyn ExecutorService> { ExecutorContext::global().trampoline() }

  pub fn task() -> Arc<dyn ExecutorService> { ExecutorContext::global().task() }

  pub fn immediate() -> Arc<dyn ExecutorService> { ExecutorContext::global().immediate() }

  pub fn new_single(config: ExecutorConfig) -> Arc<dyn ExecutorService> {
    Arc::new(SingleExecutor::new(config))
  }

  pub fn new_parallel(config: ExecutorConfig) -> Arc<dyn ExecutorService> {
    Arc::new(ParallelExecutor::new(config))
  }

  pub fn new_io(config: ExecutorConfig) -> Arc<dyn ExecutorService> {
    Arc::new(IoExecutor::new(config))
  }

  pub fn new_thread(config: ExecutorConfig) -> Arc<dyn ExecutorService> {
    Arc::new(ThreadExecutor::new(config))
  }

  pub fn new_trampoline() -> Arc<dyn ExecutorService> { Arc::new(TrampolineExecutor::new()) }

  pub fn new_task(config: ExecutorConfig) -> Arc<dyn ExecutorService> {
    Arc::new(TaskExecutor::new(config))
  }

  /// An executor whose workers all run on `worker`, each cancelling only
  /// its own actions.
  pub fn new_shared(worker: Arc<dyn Worker>) -> Arc<dyn ExecutorService> {
    Arc::new(SharedExecutor::new(worker))
  }

  /// An executor run by the thread calling `start`, which first runs
  /// `initial` if given, handing it the executor.
  pub fn new_blocking(
    initial: Option<Bootstrap>,
    config: ExecutorConfig,
  ) -> Arc<dyn ExecutorService> {
    Arc::new(BlockingExecutor::new(initial, config))
  }
}
