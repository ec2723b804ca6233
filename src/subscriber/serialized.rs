use std::{
  collections::VecDeque,
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
  },
};

use super::BoxedSubscriber;
use crate::{error::FlowError, subscription::SubscriptionRef};

/// Serializes signals towards one downstream subscriber.
///
/// Any thread may offer a signal at any time, including from inside the
/// downstream's own callbacks. Signals are queued and delivered in order by
/// whichever caller currently owns the drain loop, so the downstream never
/// sees two callbacks at once and reentrant signals never recurse.
///
/// # Rules
///
/// - Nothing is delivered after a terminal signal has been accepted; later
///   signals are dropped.
/// - After [`cancel`](SerializedSubscriber::cancel) the queue is discarded
///   and the downstream is released as soon as the drain loop observes it.
/// - The downstream is released right after its terminal callback.
pub struct SerializedSubscriber<T> {
  inner: Arc<Inner<T>>,
}

enum Signal<T> {
  Subscribe(SubscriptionRef),
  Next(T),
  Error(FlowError),
  Complete,
}

impl<T> Signal<T> {
  fn is_terminal(&self) -> bool { matches!(self, Signal::Error(_) | Signal::Complete) }
}

struct Inner<T> {
  queue: Mutex<Queue<T>>,
  wip: AtomicUsize,
  // only locked by the drain loop owner
  downstream: Mutex<Option<BoxedSubscriber<T>>>,
}

struct Queue<T> {
  signals: VecDeque<Signal<T>>,
  terminated: bool,
  cancelled: bool,
}

impl<T> Clone for SerializedSubscriber<T> {
  fn clone(&self) -> Self { Self { inner: self.inner.clone() } }
}

impl<T> SerializedSubscriber<T> {
  pub fn new(downstream: BoxedSubscriber<T>) -> Self {
    Self {
      inner: Arc::new(Inner {
        queue: Mutex::new(Queue { signals: VecDeque::new(), terminated: false, cancelled: false }),
        wip: AtomicUsize::new(0),
        downstream: Mutex::new(Some(downstream)),
      }),
    }
  }

  pub fn on_subscribe(&self, subscription: SubscriptionRef) {
    if self.enqueue(Signal::Subscribe(subscription)) {
      self.drain();
    }
  }

  pub fn on_next(&self, item: T) {
    if self.enqueue(Signal::Next(item)) {
      self.drain();
    }
  }

  pub fn on_error(&self, error: FlowError) {
    if self.enqueue(Signal::Error(error)) {
      self.drain();
    }
  }

  pub fn on_complete(&self) {
    if self.enqueue(Signal::Complete) {
      self.drain();
    }
  }

  /// Queues `on_subscribe` without delivering it yet.
  ///
  /// Lets a publisher fix the position of `on_subscribe` in the queue while
  /// it still holds its own lock, and deliver it with [`drain`] afterwards.
  ///
  /// [`drain`]: SerializedSubscriber::drain
  pub(crate) fn enqueue_subscribe(&self, subscription: SubscriptionRef) -> bool {
    self.enqueue(Signal::Subscribe(subscription))
  }

  /// Discards queued signals and stops delivery. Idempotent.
  pub fn cancel(&self) {
    {
      let mut queue = self.inner.queue.lock().unwrap();
      if queue.cancelled {
        return;
      }
      queue.cancelled = true;
      queue.signals.clear();
    }
    self.drain();
  }

  pub fn is_cancelled(&self) -> bool { self.inner.queue.lock().unwrap().cancelled }

  /// Whether a terminal signal has been accepted (delivered or queued).
  pub fn is_terminated(&self) -> bool { self.inner.queue.lock().unwrap().terminated }

  fn enqueue(&self, signal: Signal<T>) -> bool {
    let mut queue = self.inner.queue.lock().unwrap();
    if queue.cancelled {
      return false;
    }
    if queue.terminated {
      tracing::debug!("dropping signal offered after a terminal signal");
      return false;
    }
    queue.terminated = signal.is_terminal();
    queue.signals.push_back(signal);
    true
  }

  pub(crate) fn drain(&self) {
    if self.inner.wip.fetch_add(1, Ordering::AcqRel) != 0 {
      return;
    }
    let mut missed = 1;
    loop {
      loop {
        let next = {
          let mut queue = self.inner.queue.lock().unwrap();
          if queue.cancelled {
            queue.signals.clear();
            None
          } else {
            queue.signals.pop_front()
          }
        };
        match next {
          Some(signal) => self.deliver(signal),
          None => {
            if self.is_cancelled() {
              self.inner.downstream.lock().unwrap().take();
            }
            break;
          }
        }
      }
      missed = self.inner.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
      if missed == 0 {
        break;
      }
    }
  }

  fn deliver(&self, signal: Signal<T>) {
    let mut slot = self.inner.downstream.lock().unwrap();
    let Some(downstream) = slot.as_mut() else {
      return;
    };
    match signal {
      Signal::Subscribe(subscription) => downstream.on_subscribe(subscription),
      Signal::Next(item) => downstream.on_next(item),
      Signal::Error(error) => {
        downstream.on_error(error);
        slot.take();
      }
      Signal::Complete => {
        downstream.on_complete();
        slot.take();
      }
    }
  }
}
