//! TakeWhile operator implementation
//!
//! Relays items while a predicate holds. The first item failing the
//! predicate cancels the upstream and completes the stream.

use std::sync::Arc;

use crate::{
  error::FlowError,
  publisher::Publisher,
  subscriber::{BoxedSubscriber, Subscriber},
  subscription::SubscriptionRef,
};

/// TakeWhile operator: Emits values while a predicate returns true
///
/// With `inclusive` set, the first value failing the predicate is emitted
/// before completing.
///
/// # Examples
///
/// ```
/// use rxstreams::prelude::*;
///
/// flowable::from_iter([1, 2, 3, 4, 5])
///   .take_while(|v| *v < 4)
///   .test(UNBOUNDED)
///   .assert_result(&[1, 2, 3]);
/// ```
pub struct TakeWhile<S, P> {
  pub source: S,
  pub predicate: Arc<P>,
  pub inclusive: bool,
}

impl<S, P> TakeWhile<S, P> {
  pub fn new(source: S, predicate: P, inclusive: bool) -> Self {
    Self { source, predicate: Arc::new(predicate), inclusive }
  }
}

impl<S: Clone, P> Clone for TakeWhile<S, P> {
  fn clone(&self) -> Self {
    Self {
      source: self.source.clone(),
      predicate: self.predicate.clone(),
      inclusive: self.inclusive,
    }
  }
}

/// Subscriber between the source and the downstream of a [`TakeWhile`].
pub struct TakeWhileSubscriber<T, P> {
  downstream: Option<BoxedSubscriber<T>>,
  upstream: Option<SubscriptionRef>,
  predicate: Arc<P>,
  inclusive: bool,
}

impl<T, P> Subscriber<T> for TakeWhileSubscriber<T, P>
where
  T: Send,
  P: Fn(&T) -> bool + Send + Sync,
{
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    self.upstream = Some(subscription.clone());
    if let Some(downstream) = self.downstream.as_mut() {
      downstream.on_subscribe(subscription);
    }
  }

  fn on_next(&mut self, item: T) {
    let Some(downstream) = self.downstream.as_mut() else {
      return;
    };
    if (self.predicate)(&item) {
      downstream.on_next(item);
      return;
    }
    if self.inclusive {
      downstream.on_next(item);
    }
    if let Some(upstream) = self.upstream.take() {
      upstream.cancel();
    }
    if let Some(mut downstream) = self.downstream.take() {
      downstream.on_complete();
    }
  }

  fn on_error(&mut self, error: FlowError) {
    if let Some(mut downstream) = self.downstream.take() {
      downstream.on_error(error);
    }
  }

  fn on_complete(&mut self) {
    if let Some(mut downstream) = self.downstream.take() {
      downstream.on_complete();
    }
  }
}

impl<T, S, P> Publisher<T> for TakeWhile<S, P>
where
  T: Send + 'static,
  S: Publisher<T>,
  P: Fn(&T) -> bool + Send + Sync + 'static,
{
  fn subscribe(&self, subscriber: BoxedSubscriber<T>) {
    self.source.subscribe(Box::new(TakeWhileSubscriber {
      downstream: Some(subscriber),
      upstream: None,
      predicate: self.predicate.clone(),
      inclusive: self.inclusive,
    }))
  }
}
