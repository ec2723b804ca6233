use std::sync::Arc;

use crate::{
  error::FlowError,
  executor::{ExecutorService, Worker},
  publisher::Publisher,
  subscriber::{BoxedSubscriber, Subscriber},
  subscription::{Disposable, Subscription, SubscriptionRef},
};

/// Subscribes to the source from a worker of an executor.
///
/// Every subscription gets its own worker, disposed once the sequence
/// terminates or is cancelled. Items are delivered on whatever thread the
/// source emits on.
pub struct SubscribeOn<S> {
  pub(crate) source: Arc<S>,
  pub(crate) executor: Arc<dyn ExecutorService>,
}

impl<S> SubscribeOn<S> {
  pub fn new(source: S, executor: Arc<dyn ExecutorService>) -> Self {
    Self { source: Arc::new(source), executor }
  }
}

impl<S> Clone for SubscribeOn<S> {
  fn clone(&self) -> Self {
    Self {
      source: self.source.clone(),
      executor: self.executor.clone(),
    }
  }
}

impl<T, S> Publisher<T> for SubscribeOn<S>
where
  T: Send + 'static,
  S: Publisher<T> + 'static,
{
  fn subscribe(&self, subscriber: BoxedSubscriber<T>) {
    let worker = self.executor.create_worker();
    let source = self.source.clone();
    let c_worker = worker.clone();
    worker.schedule(Box::new(move || {
      source.subscribe(Box::new(SubscribeOnSubscriber {
        downstream: subscriber,
        worker: c_worker,
      }))
    }));
  }
}

struct SubscribeOnSubscriber<T> {
  downstream: BoxedSubscriber<T>,
  worker: Arc<dyn Worker>,
}

impl<T: Send> Subscriber<T> for SubscribeOnSubscriber<T> {
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.downstream.on_subscribe(Arc::new(SubscribeOnSubscription {
      upstream: subscription,
      worker: self.worker.clone(),
    }));
  }

  fn on_next(&mut self, item: T) { self.downstream.on_next(item); }

  fn on_error(&mut self, error: FlowError) {
    self.downstream.on_error(error);
    self.worker.dispose();
  }

  fn on_complete(&mut self) {
    self.downstream.on_complete();
    self.worker.dispose();
  }
}

struct SubscribeOnSubscription {
  upstream: SubscriptionRef,
  worker: Arc<dyn Worker>,
}

impl Subscription for SubscribeOnSubscription {
  fn request(&self, n: u64) { self.upstream.request(n); }

  fn cancel(&self) {
    self.upstream.cancel();
    self.worker.dispose();
  }
}
