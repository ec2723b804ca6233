//! The producing side of the demand protocol.

use std::sync::Arc;

use crate::{
  executor::ExecutorService,
  ops::{
    repeat_when::RepeatWhen, retry_when::RetryWhen, subscribe_on::SubscribeOn,
    take_while::TakeWhile, trigger::Trigger,
  },
  processor::RefCount,
  subscriber::{BoxedSubscriber, Subscriber},
  test_subscriber::TestSubscriber,
  FlowError,
};

/// Producer of a backpressured item sequence.
///
/// `subscribe` must eventually call `on_subscribe` on the subscriber before
/// any other signal. Multicast publishers (processors) accept any number of
/// subscribers; the others produce an independent sequence per subscriber.
pub trait Publisher<T>: Send + Sync {
  fn subscribe(&self, subscriber: BoxedSubscriber<T>);
}

/// Shared, type-erased publisher.
pub type PublisherRef<T> = Arc<dyn Publisher<T>>;

impl<T, P> Publisher<T> for Arc<P>
where
  P: Publisher<T> + ?Sized,
{
  #[inline]
  fn subscribe(&self, subscriber: BoxedSubscriber<T>) { (**self).subscribe(subscriber) }
}

impl<T, P> Publisher<T> for Box<P>
where
  P: Publisher<T> + ?Sized,
{
  #[inline]
  fn subscribe(&self, subscriber: BoxedSubscriber<T>) { (**self).subscribe(subscriber) }
}

/// Operators and helpers available on every publisher.
pub trait PublisherExt<T>: Publisher<T> + Sized {
  /// Subscribes a concrete subscriber.
  fn subscribe_with<S>(&self, subscriber: S)
  where
    S: Subscriber<T> + 'static,
  {
    self.subscribe(Box::new(subscriber))
  }

  /// Subscribes a [`TestSubscriber`] that requests `initial_request` items on
  /// subscription.
  fn test(&self, initial_request: u64) -> TestSubscriber<T>
  where
    T: Send + 'static,
  {
    let ts = TestSubscriber::new(initial_request);
    self.subscribe(Box::new(ts.clone()));
    ts
  }

  /// Relays items while `predicate` holds, then cancels upstream and
  /// completes.
  fn take_while<F>(self, predicate: F) -> TakeWhile<Self, F>
  where
    F: Fn(&T) -> bool + Send + Sync + 'static,
  {
    TakeWhile::new(self, predicate, false)
  }

  /// Like [`take_while`](PublisherExt::take_while), but also emits the
  /// first item failing `predicate`.
  fn take_while_inclusive<F>(self, predicate: F) -> TakeWhile<Self, F>
  where
    F: Fn(&T) -> bool + Send + Sync + 'static,
  {
    TakeWhile::new(self, predicate, true)
  }

  /// Subscribes to `self` from a worker of `executor`.
  fn subscribe_on(self, executor: Arc<dyn ExecutorService>) -> SubscribeOn<Self> {
    SubscribeOn::new(self, executor)
  }

  /// Resubscribes after each completion, as driven by the publisher
  /// `handler` derives from the stream of completion signals.
  fn repeat_when<F, W, U>(self, handler: F) -> RepeatWhen<Self>
  where
    F: Fn(Trigger<()>) -> W + Send + Sync + 'static,
    W: Publisher<U>,
    U: Send + 'static,
  {
    RepeatWhen::new(self, handler)
  }

  /// Resubscribes after each error, as driven by the publisher `handler`
  /// derives from the stream of errors.
  fn retry_when<F, W, U>(self, handler: F) -> RetryWhen<Self>
  where
    F: Fn(Trigger<FlowError>) -> W + Send + Sync + 'static,
    W: Publisher<U>,
    U: Send + 'static,
  {
    RetryWhen::new(self, handler)
  }

  /// Multicasts `self` to every subscriber of the returned [`RefCount`],
  /// subscribing to `self` only while there is at least one.
  fn share(self) -> RefCount<T>
  where
    T: Clone + Send + 'static,
    Self: 'static,
  {
    RefCount::new(self)
  }

  /// Erases the publisher type.
  fn into_shared(self) -> PublisherRef<T>
  where
    Self: 'static,
  {
    Arc::new(self)
  }
}

impl<T, P> PublisherExt<T> for P where P: Publisher<T> + Sized {}
