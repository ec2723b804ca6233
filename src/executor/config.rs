use std::{num::NonZeroUsize, thread};

/// Configuration of an executor created through
/// [`Executors`](super::Executors).
///
/// ```rust
/// use rxstreams::executor::ExecutorConfig;
///
/// let config = ExecutorConfig::new()
///   .name("decoder")
///   .parallelism(2)
///   .daemon(false);
/// assert_eq!(config.name_or("computation"), "decoder");
/// ```
#[derive(Clone, Debug)]
pub struct ExecutorConfig {
  name: Option<String>,
  parallelism: usize,
  own_timer: bool,
  daemon: bool,
}

impl ExecutorConfig {
  /// Creates the default configuration: one lane per available core, the
  /// shared timer, daemon threads.
  pub fn new() -> Self {
    Self {
      name: None,
      parallelism: thread::available_parallelism().map_or(1, NonZeroUsize::get),
      own_timer: false,
      daemon: true,
    }
  }

  /// Sets the prefix of the executor's thread names.
  pub fn name(mut self, name: impl Into<String>) -> Self {
    self.name = Some(name.into());
    self
  }

  /// Sets the number of threads of a parallel executor. At least one.
  pub fn parallelism(mut self, parallelism: usize) -> Self {
    self.parallelism = parallelism.max(1);
    self
  }

  /// Gives a blocking executor a timer thread of its own instead of the
  /// process-wide one.
  pub fn own_timer(mut self, own_timer: bool) -> Self {
    self.own_timer = own_timer;
    self
  }

  /// Whether `shutdown` leaves the executor's threads to finish on their
  /// own (`true`, the default) or waits for them to exit (`false`).
  ///
  /// No executor thread keeps the process alive: every thread ends when
  /// `main` returns, whatever this flag says. The flag only decides whether
  /// `shutdown` joins the threads, and a thread calling `shutdown` on its
  /// own executor is never joined.
  pub fn daemon(mut self, daemon: bool) -> Self {
    self.daemon = daemon;
    self
  }

  pub fn name_or<'a>(&'a self, default: &'a str) -> &'a str {
    self.name.as_deref().unwrap_or(default)
  }

  #[inline]
  pub fn get_parallelism(&self) -> usize { self.parallelism }

  #[inline]
  pub fn has_own_timer(&self) -> bool { self.own_timer }

  #[inline]
  pub fn is_daemon(&self) -> bool { self.daemon }
}

impl Default for ExecutorConfig {
  fn default() -> Self { Self::new() }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn defaults() {
    let config = ExecutorConfig::default();
    assert!(config.get_parallelism() >= 1);
    assert!(!config.has_own_timer());
    assert!(config.is_daemon());
    assert_eq!(config.name_or("single"), "single");
  }

  #[test]
  fn parallelism_is_at_least_one() {
    assert_eq!(ExecutorConfig::new().parallelism(0).get_parallelism(), 1);
  }
}
