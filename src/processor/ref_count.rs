//! Make a processor behave like an ordinary publisher and automate the
//! connection to its source.
//!
//! [`RefCount`] counts the subscriptions to the processor. The first one
//! subscribes the processor to the source, the last one leaving cancels that
//! connection. Everything upstream of a `RefCount` therefore sees a single
//! subscription however many subscribers the `RefCount` has.

use std::sync::{
  atomic::{AtomicBool, AtomicU64, Ordering},
  Arc, Mutex,
};

use super::PublishProcessor;
use crate::{
  demand::UNBOUNDED,
  error::FlowError,
  publisher::{Publisher, PublisherRef},
  subscriber::{BoxedSubscriber, Subscriber},
  subscription::{EmptySubscription, Subscription, SubscriptionRef},
};

/// Connects a [`PublishProcessor`] to its source while it has subscribers.
///
/// Subscribers beyond `max_subscribers` are rejected with
/// [`FlowError::IllegalState`]. Once the source terminates, the processor
/// replays the terminal signal to later subscribers and the source is not
/// subscribed again.
pub struct RefCount<T> {
  inner: Arc<Inner<T>>,
}

struct Inner<T> {
  processor: PublishProcessor<T>,
  source: PublisherRef<T>,
  max_subscribers: usize,
  // bumped on every connect and disconnect; stale connections compare
  // against it and stay silent
  generation: AtomicU64,
  state: Mutex<Connection>,
}

struct Connection {
  subscribers: usize,
  upstream: Option<SubscriptionRef>,
}

impl<T> Clone for RefCount<T> {
  fn clone(&self) -> Self { Self { inner: self.inner.clone() } }
}

impl<T: Clone + Send + 'static> RefCount<T> {
  /// A `RefCount` without a subscriber bound.
  pub fn new<S>(source: S) -> Self
  where
    S: Publisher<T> + 'static,
  {
    Self::bounded(source, usize::MAX)
  }

  /// A `RefCount` admitting at most `max_subscribers` subscribers at once.
  pub fn bounded<S>(source: S, max_subscribers: usize) -> Self
  where
    S: Publisher<T> + 'static,
  {
    Self::with_processor(PublishProcessor::new(), source, max_subscribers)
  }

  pub fn with_processor<S>(processor: PublishProcessor<T>, source: S, max_subscribers: usize) -> Self
  where
    S: Publisher<T> + 'static,
  {
    Self {
      inner: Arc::new(Inner {
        processor,
        source: Arc::new(source),
        max_subscribers,
        generation: AtomicU64::new(0),
        state: Mutex::new(Connection { subscribers: 0, upstream: None }),
      }),
    }
  }

  pub fn subscriber_count(&self) -> usize { self.inner.state.lock().unwrap().subscribers }

  pub fn max_subscribers(&self) -> usize { self.inner.max_subscribers }

  /// Whether the source is currently subscribed.
  pub fn is_connected(&self) -> bool { self.inner.state.lock().unwrap().upstream.is_some() }

  pub fn processor(&self) -> &PublishProcessor<T> { &self.inner.processor }
}

impl<T> Inner<T> {
  fn release(&self) {
    let upstream = {
      let mut state = self.state.lock().unwrap();
      state.subscribers -= 1;
      if state.subscribers > 0 {
        return;
      }
      self.generation.fetch_add(1, Ordering::AcqRel);
      state.upstream.take()
    };
    if let Some(upstream) = upstream {
      tracing::trace!("last subscriber left, disconnecting");
      upstream.cancel();
    }
  }

  #[inline]
  fn is_current(&self, generation: u64) -> bool {
    self.generation.load(Ordering::Acquire) == generation
  }
}

impl<T: Clone + Send + 'static> Publisher<T> for RefCount<T> {
  fn subscribe(&self, mut subscriber: BoxedSubscriber<T>) {
    let inner = &self.inner;
    let admitted = {
      let mut state = inner.state.lock().unwrap();
      if state.subscribers >= inner.max_subscribers {
        None
      } else {
        state.subscribers += 1;
        Some(state.subscribers == 1)
      }
    };
    let Some(first) = admitted else {
      tracing::debug!(max = inner.max_subscribers, "rejecting a surplus subscriber");
      subscriber.on_subscribe(EmptySubscription::shared());
      subscriber.on_error(FlowError::illegal_state(format!(
        "at most {} subscribers allowed",
        inner.max_subscribers
      )));
      return;
    };

    let generation = if first {
      inner.generation.fetch_add(1, Ordering::AcqRel) + 1
    } else {
      0
    };
    inner.processor.subscribe(Box::new(RefCountSubscriber {
      downstream: subscriber,
      release: Arc::new(Release { inner: inner.clone(), done: AtomicBool::new(false) }),
    }));

    if first && !inner.processor.is_terminated() {
      tracing::trace!(generation, "first subscriber arrived, connecting");
      inner
        .source
        .subscribe(Box::new(ConnectionSubscriber { inner: inner.clone(), generation }));
    }
  }
}

/// Gives the subscriber's slot back exactly once.
struct Release<T> {
  inner: Arc<Inner<T>>,
  done: AtomicBool,
}

impl<T> Release<T> {
  fn release(&self) {
    if !self.done.swap(true, Ordering::AcqRel) {
      self.inner.release();
    }
  }
}

struct RefCountSubscriber<T> {
  downstream: BoxedSubscriber<T>,
  release: Arc<Release<T>>,
}

impl<T: Send + 'static> Subscriber<T> for RefCountSubscriber<T> {
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.downstream.on_subscribe(Arc::new(RefCountSubscription {
      upstream: subscription,
      release: self.release.clone(),
    }));
  }

  fn on_next(&mut self, item: T) { self.downstream.on_next(item); }

  fn on_error(&mut self, error: FlowError) {
    self.release.release();
    self.downstream.on_error(error);
  }

  fn on_complete(&mut self) {
    self.release.release();
    self.downstream.on_complete();
  }
}

struct RefCountSubscription<T> {
  upstream: SubscriptionRef,
  release: Arc<Release<T>>,
}

impl<T: Send> Subscription for RefCountSubscription<T> {
  fn request(&self, n: u64) { self.upstream.request(n); }

  fn cancel(&self) {
    self.upstream.cancel();
    self.release.release();
  }
}

/// Subscribed to the source on behalf of one connection.
struct ConnectionSubscriber<T> {
  inner: Arc<Inner<T>>,
  generation: u64,
}

impl<T: Clone + Send + 'static> Subscriber<T> for ConnectionSubscriber<T> {
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    let live = {
      let mut state = self.inner.state.lock().unwrap();
      if self.inner.is_current(self.generation) {
        state.upstream = Some(subscription.clone());
        true
      } else {
        false
      }
    };
    if live {
      subscription.request(UNBOUNDED);
    } else {
      subscription.cancel();
    }
  }

  fn on_next(&mut self, item: T) {
    if self.inner.is_current(self.generation) {
      self.inner.processor.on_next(item);
    }
  }

  fn on_error(&mut self, error: FlowError) {
    if self.inner.is_current(self.generation) {
      self.inner.processor.on_error(error);
    }
  }

  fn on_complete(&mut self) {
    if self.inner.is_current(self.generation) {
      self.inner.processor.on_complete();
    }
  }
}
