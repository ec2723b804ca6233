use std::{
  collections::VecDeque,
  sync::{
    atomic::{AtomicUsize, Ordering},
    Arc, Mutex,
  },
};

use crate::{
  demand::{add_cap, produced, validate},
  error::FlowError,
  publisher::Publisher,
  subscriber::{BoxedSubscriber, SerializedSubscriber},
  subscription::{EmptySubscription, Subscription},
};

/// Unicast, buffering publisher fed by the owning operator.
///
/// The feedback operators push one signal into their trigger per primary
/// termination; the handler's publisher consumes it at its own pace, the
/// trigger buffering what was not requested yet. Only one subscriber is
/// accepted, any further one is rejected with `IllegalState`.
pub struct Trigger<S> {
  inner: Arc<Inner<S>>,
}

struct Inner<S> {
  state: Mutex<State<S>>,
  wip: AtomicUsize,
}

enum End {
  Complete,
  Error(FlowError),
}

struct State<S> {
  queue: VecDeque<S>,
  demand: u64,
  subscribed: bool,
  subscriber: Option<SerializedSubscriber<S>>,
  // terminal accepted but not yet delivered
  end: Option<End>,
  ended: bool,
  cancelled: bool,
}

enum Delivery<S> {
  Next(SerializedSubscriber<S>, S),
  End(SerializedSubscriber<S>, End),
}

impl<S> State<S> {
  fn next_delivery(&mut self) -> Option<Delivery<S>> {
    if self.cancelled {
      self.queue.clear();
      return None;
    }
    let subscriber = self.subscriber.clone()?;
    if self.queue.is_empty() {
      let end = self.end.take()?;
      self.subscriber = None;
      return Some(Delivery::End(subscriber, end));
    }
    if self.demand == 0 {
      return None;
    }
    self.demand = produced(self.demand, 1);
    self
      .queue
      .pop_front()
      .map(|signal| Delivery::Next(subscriber, signal))
  }
}

impl<S> Clone for Trigger<S> {
  fn clone(&self) -> Self { Self { inner: self.inner.clone() } }
}

impl<S> Default for Trigger<S> {
  fn default() -> Self {
    Self {
      inner: Arc::new(Inner {
        state: Mutex::new(State {
          queue: VecDeque::new(),
          demand: 0,
          subscribed: false,
          subscriber: None,
          end: None,
          ended: false,
          cancelled: false,
        }),
        wip: AtomicUsize::new(0),
      }),
    }
  }
}

impl<S> Trigger<S> {
  pub fn new() -> Self { Self::default() }

  /// Buffers `signal` until the subscriber asks for it.
  pub fn on_next(&self, signal: S) {
    {
      let mut state = self.inner.state.lock().unwrap();
      if state.ended || state.cancelled {
        return;
      }
      state.queue.push_back(signal);
    }
    self.drain();
  }

  pub fn on_complete(&self) { self.end(End::Complete) }

  pub fn on_error(&self, error: FlowError) { self.end(End::Error(error)) }

  pub fn has_subscriber(&self) -> bool {
    let state = self.inner.state.lock().unwrap();
    state.subscriber.is_some() && !state.cancelled
  }

  fn end(&self, end: End) {
    {
      let mut state = self.inner.state.lock().unwrap();
      if state.ended || state.cancelled {
        return;
      }
      state.ended = true;
      state.end = Some(end);
    }
    self.drain();
  }

  fn drain(&self) {
    if self.inner.wip.fetch_add(1, Ordering::AcqRel) != 0 {
      return;
    }
    let mut missed = 1;
    loop {
      loop {
        let delivery = self.inner.state.lock().unwrap().next_delivery();
        match delivery {
          None => break,
          Some(Delivery::Next(subscriber, signal)) => subscriber.on_next(signal),
          Some(Delivery::End(subscriber, End::Complete)) => subscriber.on_complete(),
          Some(Delivery::End(subscriber, End::Error(error))) => subscriber.on_error(error),
        }
      }
      missed = self.inner.wip.fetch_sub(missed, Ordering::AcqRel) - missed;
      if missed == 0 {
        break;
      }
    }
  }
}

impl<S: Send + 'static> Publisher<S> for Trigger<S> {
  fn subscribe(&self, mut subscriber: BoxedSubscriber<S>) {
    let taken = std::mem::replace(&mut self.inner.state.lock().unwrap().subscribed, true);
    if taken {
      subscriber.on_subscribe(EmptySubscription::shared());
      subscriber.on_error(FlowError::illegal_state("trigger accepts a single subscriber"));
      return;
    }
    let serialized = SerializedSubscriber::new(subscriber);
    self.inner.state.lock().unwrap().subscriber = Some(serialized.clone());
    serialized.on_subscribe(Arc::new(TriggerSubscription { trigger: self.clone() }));
    self.drain();
  }
}

struct TriggerSubscription<S> {
  trigger: Trigger<S>,
}

impl<S: Send> Subscription for TriggerSubscription<S> {
  fn request(&self, n: u64) {
    let inner = &self.trigger.inner;
    if let Err(error) = validate(n) {
      let subscriber = {
        let mut state = inner.state.lock().unwrap();
        state.cancelled = true;
        state.subscriber.take()
      };
      if let Some(subscriber) = subscriber {
        subscriber.on_error(error);
      }
      return;
    }
    {
      let mut state = inner.state.lock().unwrap();
      state.demand = add_cap(state.demand, n);
    }
    self.trigger.drain();
  }

  fn cancel(&self) {
    let subscriber = {
      let mut state = self.trigger.inner.state.lock().unwrap();
      state.cancelled = true;
      state.queue.clear();
      state.subscriber.take()
    };
    if let Some(subscriber) = subscriber {
      subscriber.cancel();
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;
  use crate::prelude::*;

  #[test]
  fn buffers_until_requested() {
    let trigger = Trigger::new();
    trigger.on_next(1);
    trigger.on_next(2);
    let ts = trigger.test(0);
    ts.assert_empty();
    ts.request_more(1).assert_values(&[1]);
    trigger.on_next(3);
    trigger.on_complete();
    ts.assert_values(&[1]).assert_not_complete();
    ts.request_more(2).assert_result(&[1, 2, 3]);
  }

  #[test]
  fn single_subscriber_only() {
    let trigger = Trigger::<()>::new();
    let first = trigger.test(1);
    trigger
      .test(1)
      .assert_failure(FlowError::is_illegal_state, &[]);
    trigger.on_next(());
    first.assert_values(&[()]);
  }

  #[test]
  fn cancel_discards_buffer() {
    let trigger = Trigger::new();
    let ts = trigger.test(0);
    trigger.on_next('x');
    ts.cancel();
    assert!(!trigger.has_subscriber());
    ts.request_more(1);
    ts.assert_empty();
  }

  #[test]
  fn error_after_buffered_items() {
    let trigger = Trigger::new();
    let ts = trigger.test(UNBOUNDED);
    trigger.on_next(1);
    trigger.on_error(FlowError::illegal_state("done"));
    trigger.on_next(2);
    ts.assert_failure(FlowError::is_illegal_state, &[1]);
  }
}
