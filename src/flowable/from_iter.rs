use std::{
  iter::{Once, Peekable},
  sync::{
    atomic::{AtomicBool, AtomicUsize, Ordering},
    Arc, Mutex,
  },
};

use crate::{
  demand::Demand,
  publisher::Publisher,
  subscriber::{BoxedSubscriber, SerializedSubscriber},
  subscription::Subscription,
};

/// Creates a publisher that emits the items of an iterator, one per unit of
/// demand.
///
/// The iterator is cloned for every subscriber. Completion is signalled as
/// soon as the iterator runs dry, even without outstanding demand.
///
/// ```
/// use rxstreams::prelude::*;
///
/// flowable::from_iter(0..3).test(UNBOUNDED).assert_result(&[0, 1, 2]);
/// ```
pub fn from_iter<I>(iter: I) -> FromIter<I>
where
  I: IntoIterator + Clone,
{
  FromIter(iter)
}

/// Creates a publisher that emits `value` once and completes.
pub fn just<T: Clone>(value: T) -> FromIter<Once<T>> { from_iter(std::iter::once(value)) }

#[derive(Clone)]
pub struct FromIter<I>(I);

impl<I> Publisher<I::Item> for FromIter<I>
where
  I: IntoIterator + Clone + Send + Sync,
  I::IntoIter: Send + 'static,
  I::Item: Send + 'static,
{
  fn subscribe(&self, subscriber: BoxedSubscriber<I::Item>) {
    let emitter = Arc::new(IterEmitter {
      iter: Mutex::new(self.0.clone().into_iter().peekable()),
      demand: Demand::new(),
      wip: AtomicUsize::new(0),
      cancelled: AtomicBool::new(false),
      downstream: SerializedSubscriber::new(subscriber),
    });
    emitter.downstream.on_subscribe(emitter.clone());
    emitter.drain();
  }
}

struct IterEmitter<It: Iterator> {
  // only touched by the drain loop owner
  iter: Mutex<Peekable<It>>,
  demand: Demand,
  wip: AtomicUsize,
  cancelled: AtomicBool,
  downstream: SerializedSubscriber<It::Item>,
}

impl<It> IterEmitter<It>
where
  It: Iterator,
{
  fn drain(&self) {
    if self.wip.fetch_add(1, Ordering::AcqRel) != 0 {
      return;
    }
    let mut missed = 1;
    loop {
      {
        let mut iter = self.iter.lock().unwrap();
        loop {
          if self.cancelled.load(Ordering::Acquire) {
            return;
          }
          if iter.peek().is_none() {
            self.cancelled.store(true, Ordering::Release);
            self.downstream.on_complete();
            return;
          }
          if !self.demand.try_consume_one() {
            break;
          }
          if let Some(item) = iter.next() {
            self.downstream.on_next(item);
          }
        }
      }
      missed = self.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
      if missed == 0 {
        break;
      }
    }
  }
}

impl<It> Subscription for IterEmitter<It>
where
  It: Iterator + Send,
  It::Item: Send,
{
  fn request(&self, n: u64) {
    match self.demand.request(n) {
      Ok(_) => self.drain(),
      Err(err) => {
        if !self.cancelled.swap(true, Ordering::AcqRel) {
          self.downstream.on_error(err);
        }
      }
    }
  }

  fn cancel(&self) {
    self.cancelled.store(true, Ordering::Release);
    self.downstream.cancel();
  }
}
