use std::marker::PhantomData;

use crate::{
  error::FlowError,
  publisher::Publisher,
  subscriber::BoxedSubscriber,
  subscription::EmptySubscription,
};

/// Creates a publisher that completes right after `on_subscribe`.
pub fn empty<T>() -> Empty<T> { Empty(PhantomData) }

/// Creates a publisher that fails with `error` right after `on_subscribe`.
pub fn fail<T>(error: FlowError) -> Fail<T> { Fail(error, PhantomData) }

pub struct Empty<T>(PhantomData<fn() -> T>);

impl<T> Clone for Empty<T> {
  fn clone(&self) -> Self { Empty(PhantomData) }
}

impl<T> Publisher<T> for Empty<T> {
  fn subscribe(&self, mut subscriber: BoxedSubscriber<T>) {
    subscriber.on_subscribe(EmptySubscription::shared());
    subscriber.on_complete();
  }
}

pub struct Fail<T>(FlowError, PhantomData<fn() -> T>);

impl<T> Clone for Fail<T> {
  fn clone(&self) -> Self { Fail(self.0.clone(), PhantomData) }
}

impl<T> Publisher<T> for Fail<T> {
  fn subscribe(&self, mut subscriber: BoxedSubscriber<T>) {
    subscriber.on_subscribe(EmptySubscription::shared());
    subscriber.on_error(self.0.clone());
  }
}
