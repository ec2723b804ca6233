use std::marker::PhantomData;

use crate::{publisher::Publisher, subscriber::BoxedSubscriber};

/// Creates a publisher that calls `supplier` on every subscription and
/// subscribes to the publisher it returns.
///
/// ```rust
/// use rxstreams::prelude::*;
///
/// let source = flowable::defer(|| flowable::just("fresh"));
/// source.test(1).assert_result(&["fresh"]);
/// source.test(1).assert_result(&["fresh"]);
/// ```
pub fn defer<F, P, T>(supplier: F) -> Defer<F, T>
where
  F: Fn() -> P,
  P: Publisher<T>,
{
  Defer(supplier, PhantomData)
}

pub struct Defer<F, T>(F, PhantomData<fn() -> T>);

impl<F: Clone, T> Clone for Defer<F, T> {
  fn clone(&self) -> Self { Defer(self.0.clone(), PhantomData) }
}

impl<F, P, T> Publisher<T> for Defer<F, T>
where
  F: Fn() -> P + Send + Sync,
  P: Publisher<T>,
{
  fn subscribe(&self, subscriber: BoxedSubscriber<T>) { (self.0)().subscribe(subscriber) }
}

#[cfg(test)]
mod test {
  use std::sync::{
    atomic::{AtomicUsize, Ordering},
    Arc,
  };

  use crate::prelude::*;

  #[test]
  fn supplier_runs_per_subscription() {
    let calls = Arc::new(AtomicUsize::new(0));
    let c_calls = calls.clone();
    let source = flowable::defer(move || {
      let n = c_calls.fetch_add(1, Ordering::SeqCst);
      flowable::just(n)
    });
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    source.test(1).assert_result(&[0]);
    source.test(1).assert_result(&[1]);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }
}
