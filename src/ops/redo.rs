//! Shared machinery of the feedback operators.
//!
//! A feedback operator subscribes to its source (the primary), and turns
//! every termination of the primary into a signal pushed into a [`Trigger`].
//! A user handler derives a "when" publisher from that trigger; each item
//! the when publisher emits resubscribes the primary, its completion or
//! error ends the whole sequence.
//!
//! What a termination means is decided by a [`RedoMode`]: `repeat_when`
//! redoes on completion, `retry_when` redoes on error.
//!
//! Demand requested downstream is tracked by a [`SubscriptionArbiter`], so
//! each fresh primary subscription receives whatever the previous ones did
//! not deliver. Resubscription is trampolined through a work-in-progress
//! counter: a synchronous primary that terminates during `subscribe` queues
//! the next round instead of recursing.

use std::sync::{
  atomic::{AtomicUsize, Ordering},
  Arc,
};

use super::trigger::Trigger;
use crate::{
  demand::validate,
  error::FlowError,
  publisher::{Publisher, PublisherRef},
  subscriber::{BoxedSubscriber, SerializedSubscriber, Subscriber},
  subscription::{Subscription, SubscriptionArbiter, SubscriptionRef},
};

/// What a single termination of the primary leads to.
pub enum Outcome<S> {
  /// Push `S` into the trigger and wait for the when publisher.
  Again(S),
  /// Complete downstream.
  Complete,
  /// Fail downstream.
  Error(FlowError),
}

/// Policy deciding which terminations of the primary are redone.
pub trait RedoMode: Clone + Send + Sync + 'static {
  /// Signal type pushed into the trigger.
  type Signal: Send + 'static;

  fn on_complete(&self) -> Outcome<Self::Signal>;

  fn on_error(&self, error: FlowError) -> Outcome<Self::Signal>;
}

type Connect<S> = Arc<dyn Fn(Trigger<S>, Arc<dyn WhenSink>) + Send + Sync>;

/// Feedback operator over `S`, parameterized by its [`RedoMode`].
pub struct RedoWhen<S, M: RedoMode> {
  source: Arc<S>,
  connect: Connect<M::Signal>,
  mode: M,
}

impl<S, M: RedoMode> Clone for RedoWhen<S, M> {
  fn clone(&self) -> Self {
    Self {
      source: self.source.clone(),
      connect: self.connect.clone(),
      mode: self.mode.clone(),
    }
  }
}

impl<S, M: RedoMode> RedoWhen<S, M> {
  pub fn with_mode<F, W, U>(source: S, handler: F, mode: M) -> Self
  where
    F: Fn(Trigger<M::Signal>) -> W + Send + Sync + 'static,
    W: Publisher<U>,
    U: Send + 'static,
  {
    let connect: Connect<M::Signal> =
      Arc::new(move |trigger: Trigger<M::Signal>, sink: Arc<dyn WhenSink>| {
        handler(trigger).subscribe(Box::new(WhenReceiver { sink }));
      });
    Self { source: Arc::new(source), connect, mode }
  }
}

impl<T, S, M> Publisher<T> for RedoWhen<S, M>
where
  T: Send + 'static,
  S: Publisher<T> + 'static,
  M: RedoMode,
{
  fn subscribe(&self, subscriber: BoxedSubscriber<T>) {
    let core = Arc::new(RedoCore {
      source: self.source.clone(),
      mode: self.mode.clone(),
      downstream: SerializedSubscriber::new(subscriber),
      arbiter: SubscriptionArbiter::new(),
      receiver: SubscriptionArbiter::new(),
      trigger: Trigger::new(),
      wip: AtomicUsize::new(0),
    });
    core
      .downstream
      .on_subscribe(Arc::new(RedoSubscription { core: core.clone() }));
    let sink: Arc<dyn WhenSink> = core.clone();
    (self.connect)(core.trigger.clone(), sink);
    core.resubscribe();
  }
}

struct RedoCore<T, M: RedoMode> {
  source: PublisherRef<T>,
  mode: M,
  downstream: SerializedSubscriber<T>,
  // the current primary subscription
  arbiter: SubscriptionArbiter,
  // the when subscription
  receiver: SubscriptionArbiter,
  trigger: Trigger<M::Signal>,
  wip: AtomicUsize,
}

impl<T, M> RedoCore<T, M>
where
  T: Send + 'static,
  M: RedoMode,
{
  fn resubscribe(self: &Arc<Self>) {
    if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
      return;
    }
    loop {
      if self.arbiter.is_cancelled() {
        return;
      }
      tracing::trace!("subscribing to the primary source");
      self
        .source
        .subscribe(Box::new(RedoSubscriber { core: self.clone() }));
      if self.wip.fetch_sub(1, Ordering::AcqRel) == 1 {
        break;
      }
    }
  }

  fn terminated(&self, outcome: Outcome<M::Signal>) {
    match outcome {
      Outcome::Again(signal) => {
        self.arbiter.clear_subscription();
        self.receiver.request(1);
        self.trigger.on_next(signal);
      }
      Outcome::Complete => {
        self.receiver.cancel();
        self.downstream.on_complete();
      }
      Outcome::Error(error) => {
        self.receiver.cancel();
        self.downstream.on_error(error);
      }
    }
  }

  fn cancel(&self) {
    self.arbiter.cancel();
    self.receiver.cancel();
  }
}

struct RedoSubscription<T, M: RedoMode> {
  core: Arc<RedoCore<T, M>>,
}

impl<T, M> Subscription for RedoSubscription<T, M>
where
  T: Send + 'static,
  M: RedoMode,
{
  fn request(&self, n: u64) {
    match validate(n) {
      Ok(n) => self.core.arbiter.request(n),
      Err(error) => {
        self.core.cancel();
        self.core.downstream.on_error(error);
      }
    }
  }

  fn cancel(&self) {
    self.core.cancel();
    self.core.downstream.cancel();
  }
}

/// Subscribed to each incarnation of the primary.
struct RedoSubscriber<T, M: RedoMode> {
  core: Arc<RedoCore<T, M>>,
}

impl<T, M> Subscriber<T> for RedoSubscriber<T, M>
where
  T: Send + 'static,
  M: RedoMode,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.core.arbiter.set_subscription(subscription);
  }

  fn on_next(&mut self, item: T) {
    self.core.arbiter.produced(1);
    self.core.downstream.on_next(item);
  }

  fn on_error(&mut self, error: FlowError) {
    let outcome = self.core.mode.on_error(error);
    self.core.terminated(outcome);
  }

  fn on_complete(&mut self) {
    let outcome = self.core.mode.on_complete();
    self.core.terminated(outcome);
  }
}

/// Receiving end of the when publisher, erased over its item type.
pub(crate) trait WhenSink: Send + Sync {
  fn when_subscribe(&self, subscription: SubscriptionRef);

  fn when_next(self: Arc<Self>);

  fn when_error(&self, error: FlowError);

  fn when_complete(&self);
}

impl<T, M> WhenSink for RedoCore<T, M>
where
  T: Send + 'static,
  M: RedoMode,
{
  fn when_subscribe(&self, subscription: SubscriptionRef) {
    self.receiver.set_subscription(subscription);
  }

  fn when_next(self: Arc<Self>) { self.resubscribe(); }

  fn when_error(&self, error: FlowError) {
    self.arbiter.cancel();
    self.downstream.on_error(error);
  }

  fn when_complete(&self) {
    self.arbiter.cancel();
    self.downstream.on_complete();
  }
}

struct WhenReceiver {
  sink: Arc<dyn WhenSink>,
}

impl<U: Send> Subscriber<U> for WhenReceiver {
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.sink.when_subscribe(subscription);
  }

  fn on_next(&mut self, _: U) { self.sink.clone().when_next(); }

  fn on_error(&mut self, error: FlowError) { self.sink.when_error(error); }

  fn on_complete(&mut self) { self.sink.when_complete(); }
}
