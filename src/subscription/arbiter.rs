use std::sync::Mutex;

use super::{Subscription, SubscriptionRef};
use crate::demand::{add_cap, produced, UNBOUNDED};

/// Switches between successive upstream subscriptions while preserving the
/// downstream's outstanding demand.
///
/// Requests made while no upstream is attached accumulate; each newly
/// attached upstream receives everything still outstanding. Items delivered
/// through the current upstream are accounted with [`produced`] so the next
/// upstream is never asked for them again.
///
/// [`produced`]: SubscriptionArbiter::produced
#[derive(Default)]
pub struct SubscriptionArbiter {
  state: Mutex<ArbiterState>,
}

#[derive(Default)]
struct ArbiterState {
  current: Option<SubscriptionRef>,
  requested: u64,
  cancelled: bool,
}

impl SubscriptionArbiter {
  pub fn new() -> Self { Self::default() }

  /// Attaches `upstream`, requesting the accumulated demand from it.
  ///
  /// After [`cancel`](SubscriptionArbiter::cancel) the new upstream is
  /// cancelled immediately.
  pub fn set_subscription(&self, upstream: SubscriptionRef) {
    let outstanding = {
      let mut state = self.state.lock().unwrap();
      if state.cancelled {
        None
      } else {
        state.current = Some(upstream.clone());
        Some(state.requested)
      }
    };
    match outstanding {
      None => upstream.cancel(),
      Some(0) => {}
      Some(n) => upstream.request(n),
    }
  }

  /// Detaches the current upstream without cancelling it.
  ///
  /// Used once the current upstream has terminated on its own.
  pub fn clear_subscription(&self) { self.state.lock().unwrap().current = None; }

  /// Records `n` more items of downstream demand and forwards them.
  pub fn request(&self, n: u64) {
    let current = {
      let mut state = self.state.lock().unwrap();
      if state.cancelled {
        return;
      }
      state.requested = add_cap(state.requested, n);
      state.current.clone()
    };
    if let Some(current) = current {
      current.request(n);
    }
  }

  /// Accounts for `n` items delivered downstream.
  pub fn produced(&self, n: u64) {
    let mut state = self.state.lock().unwrap();
    state.requested = produced(state.requested, n);
  }

  /// Outstanding downstream demand.
  pub fn requested(&self) -> u64 { self.state.lock().unwrap().requested }

  pub fn is_unbounded(&self) -> bool { self.requested() == UNBOUNDED }

  /// Cancels the current upstream and any future one.
  pub fn cancel(&self) {
    let current = {
      let mut state = self.state.lock().unwrap();
      if state.cancelled {
        return;
      }
      state.cancelled = true;
      state.current.take()
    };
    if let Some(current) = current {
      current.cancel();
    }
  }

  pub fn is_cancelled(&self) -> bool { self.state.lock().unwrap().cancelled }
}

impl Subscription for SubscriptionArbiter {
  fn request(&self, n: u64) { SubscriptionArbiter::request(self, n) }

  fn cancel(&self) { SubscriptionArbiter::cancel(self) }
}
