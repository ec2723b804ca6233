use std::sync::{
  atomic::{AtomicBool, Ordering},
  Arc, Mutex, MutexGuard, Weak,
};

use super::subscribers::{broadcast_value, Snapshot, Subscribers};
use crate::{
  demand::{Demand, UNBOUNDED},
  error::FlowError,
  publisher::Publisher,
  subscriber::{BoxedSubscriber, SerializedSubscriber, Subscriber},
  subscription::{EmptySubscription, Subscription, SubscriptionRef},
};

/// Hot multicast processor.
///
/// Items offered through [`on_next`](PublishProcessor::on_next) are relayed
/// to every current subscriber that has outstanding demand. A subscriber
/// without demand at that moment simply misses the item: nothing is buffered
/// and no error is raised. The first terminal signal reaches every current
/// subscriber and is replayed to anyone subscribing later.
///
/// Handles are cheap to clone and all refer to the same processor.
///
/// ```
/// use rxstreams::prelude::*;
///
/// let processor = PublishProcessor::new();
/// let ts = processor.test(1);
/// processor.on_next(1);
/// processor.on_next(2); // missed, demand used up
/// processor.on_complete();
/// ts.assert_result(&[1]);
/// ```
pub struct PublishProcessor<T> {
  core: Arc<ProcessorCore<T>>,
}

struct ProcessorCore<T> {
  links: Mutex<Links<T>>,
  upstream: Mutex<Option<SubscriptionRef>>,
}

struct Links<T> {
  registry: Subscribers<Arc<Link<T>>>,
  terminal: Terminal,
}

enum Terminal {
  Active,
  Completed,
  Errored(FlowError),
}

/// Per-subscriber state owned by the registry.
pub(crate) struct Link<T> {
  id: usize,
  demand: Demand,
  cancelled: AtomicBool,
  downstream: SerializedSubscriber<T>,
}

impl<T> Link<T> {
  #[inline]
  fn is_cancelled(&self) -> bool { self.cancelled.load(Ordering::Acquire) }
}

impl<T> Clone for PublishProcessor<T> {
  fn clone(&self) -> Self { Self { core: self.core.clone() } }
}

impl<T> Default for PublishProcessor<T> {
  fn default() -> Self {
    Self {
      core: Arc::new(ProcessorCore {
        links: Mutex::new(Links { registry: Subscribers::default(), terminal: Terminal::Active }),
        upstream: Mutex::new(None),
      }),
    }
  }
}

impl<T> PublishProcessor<T> {
  pub fn new() -> Self { Self::default() }

  fn links(&self) -> MutexGuard<'_, Links<T>> { self.core.links.lock().unwrap() }

  pub fn has_subscribers(&self) -> bool { !self.links().registry.is_empty() }

  pub fn subscriber_count(&self) -> usize { self.links().registry.len() }

  pub fn is_terminated(&self) -> bool { !matches!(self.links().terminal, Terminal::Active) }

  pub fn has_complete(&self) -> bool { matches!(self.links().terminal, Terminal::Completed) }

  pub fn has_error(&self) -> bool { matches!(self.links().terminal, Terminal::Errored(_)) }

  /// The error the processor terminated with, if any.
  pub fn error(&self) -> Option<FlowError> {
    match &self.links().terminal {
      Terminal::Errored(err) => Some(err.clone()),
      _ => None,
    }
  }

  /// Moves to `terminal` and returns the links to notify, or `None` when
  /// already terminated.
  fn terminate(&self, terminal: Terminal) -> Option<Snapshot<Arc<Link<T>>>> {
    let links = {
      let mut links = self.links();
      if !matches!(links.terminal, Terminal::Active) {
        tracing::debug!("dropping terminal signal offered to a terminated processor");
        return None;
      }
      links.terminal = terminal;
      links.registry.drain()
    };
    // upstream is done, no need to keep it
    self.core.upstream.lock().unwrap().take();
    Some(links)
  }
}

impl<T: Clone + Send + 'static> PublishProcessor<T> {
  /// The live links, or `None` once terminated.
  fn live_links(&self) -> Option<Snapshot<Arc<Link<T>>>> {
    let links = self.links();
    if !matches!(links.terminal, Terminal::Active) {
      tracing::debug!("dropping item offered to a terminated processor");
      return None;
    }
    Some(links.registry.snapshot(|link| !link.is_cancelled()))
  }

  /// Relays `item` to every subscriber with outstanding demand.
  pub fn on_next(&self, item: T) {
    let Some(targets) = self.live_links() else { return };
    let ready: Snapshot<_> = targets
      .into_iter()
      .filter(|link| link.demand.try_consume_one())
      .collect();
    broadcast_value(&ready, item, |link, item| link.downstream.on_next(item));
  }

  /// Relays `item` only if every current subscriber can take it.
  ///
  /// Returns `false` without relaying anything when some subscriber has no
  /// outstanding demand, so the caller may offer the item again later. With
  /// no subscribers, or once terminated, the item is dropped and `true` is
  /// returned.
  ///
  /// Like `on_next`, calls must not overlap.
  ///
  /// ```
  /// use rxstreams::prelude::*;
  ///
  /// let processor = PublishProcessor::new();
  /// let ts = processor.test(0);
  /// assert!(!processor.offer(1));
  /// ts.request_more(1);
  /// assert!(processor.offer(1));
  /// ts.assert_values(&[1]);
  /// ```
  pub fn offer(&self, item: T) -> bool {
    let Some(targets) = self.live_links() else { return true };
    if targets.iter().any(|link| link.demand.get() == 0) {
      return false;
    }
    // demand only grows while no emission runs, so every link can take one
    let ready: Snapshot<_> = targets
      .into_iter()
      .filter(|link| link.demand.try_consume_one())
      .collect();
    broadcast_value(&ready, item, |link, item| link.downstream.on_next(item));
    true
  }

  pub fn on_error(&self, error: FlowError) {
    let Some(links) = self.terminate(Terminal::Errored(error.clone())) else {
      return;
    };
    broadcast_value(&links, error, |link, error| link.downstream.on_error(error));
  }

  pub fn on_complete(&self) {
    let Some(links) = self.terminate(Terminal::Completed) else {
      return;
    };
    for link in links {
      link.downstream.on_complete();
    }
  }
}

impl<T: Send + 'static> Publisher<T> for PublishProcessor<T> {
  fn subscribe(&self, subscriber: BoxedSubscriber<T>) {
    let downstream = SerializedSubscriber::new(subscriber);
    let mut links = self.links();
    let replay = match &links.terminal {
      Terminal::Active => None,
      Terminal::Completed => Some(None),
      Terminal::Errored(error) => Some(Some(error.clone())),
    };
    match replay {
      None => {
        let id = links.registry.reserve_id();
        let link = Arc::new(Link {
          id,
          demand: Demand::new(),
          cancelled: AtomicBool::new(false),
          downstream: downstream.clone(),
        });
        links.registry.insert(id, link.clone());
        // fixes `on_subscribe` ahead of any terminal broadcast
        downstream.enqueue_subscribe(Arc::new(LinkSubscription {
          core: Arc::downgrade(&self.core),
          link,
        }));
        drop(links);
        tracing::trace!(id, "subscriber linked");
        downstream.drain();
      }
      Some(error) => {
        drop(links);
        downstream.on_subscribe(EmptySubscription::shared());
        match error {
          Some(error) => downstream.on_error(error),
          None => downstream.on_complete(),
        }
      }
    }
  }
}

/// Lets the processor subscribe to an upstream publisher.
///
/// The upstream is asked for everything at once; a second upstream, or one
/// arriving after termination, is cancelled right away.
impl<T: Clone + Send + 'static> Subscriber<T> for PublishProcessor<T> {
  fn on_subscribe(&mut self, subscription: SubscriptionRef) {
    let accepted = {
      let mut upstream = self.core.upstream.lock().unwrap();
      if upstream.is_some() || self.is_terminated() {
        false
      } else {
        *upstream = Some(subscription.clone());
        true
      }
    };
    if accepted {
      subscription.request(UNBOUNDED);
    } else {
      tracing::debug!("cancelling a surplus upstream subscription");
      subscription.cancel();
    }
  }

  fn on_next(&mut self, item: T) { PublishProcessor::on_next(self, item) }

  fn on_error(&mut self, error: FlowError) { PublishProcessor::on_error(self, error) }

  fn on_complete(&mut self) { PublishProcessor::on_complete(self) }
}

struct LinkSubscription<T> {
  core: Weak<ProcessorCore<T>>,
  link: Arc<Link<T>>,
}

impl<T> LinkSubscription<T> {
  fn unlink(&self) {
    if let Some(core) = self.core.upgrade() {
      let mut links = core.links.lock().unwrap();
      if links.registry.contains(self.link.id) {
        links.registry.remove(self.link.id);
        tracing::trace!(id = self.link.id, "subscriber unlinked");
      }
    }
  }
}

impl<T: Send> Subscription for LinkSubscription<T> {
  fn request(&self, n: u64) {
    if self.link.is_cancelled() {
      return;
    }
    if let Err(error) = self.link.demand.request(n) {
      if !self.link.cancelled.swap(true, Ordering::AcqRel) {
        self.unlink();
        self.link.downstream.on_error(error);
      }
    }
  }

  fn cancel(&self) {
    if !self.link.cancelled.swap(true, Ordering::AcqRel) {
      self.unlink();
      self.link.downstream.cancel();
    }
  }
}
