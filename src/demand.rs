//! Demand arithmetic of the request/cancel handshake.
//!
//! Demand is an unsigned count of items a subscriber is still willing to
//! receive. Requests add to it, saturating at [`UNBOUNDED`]; emissions
//! subtract from it. Once a counter reaches [`UNBOUNDED`] it stays there:
//! the subscriber asked for everything and emission no longer decrements.
//!
//! All mutation happens through compare-and-swap loops over a single
//! `AtomicU64`, so requests and emissions may interleave freely across
//! threads without a lock on the emission hot path.

use std::sync::atomic::{AtomicU64, Ordering};

use crate::error::FlowError;

/// Demand value meaning "no limit".
pub const UNBOUNDED: u64 = u64::MAX;

/// Adds `n` to `current`, saturating at [`UNBOUNDED`].
#[inline]
pub fn add_cap(current: u64, n: u64) -> u64 { current.saturating_add(n) }

/// Subtracts `emitted` from `current`.
///
/// An unbounded `current` is returned unchanged.
///
/// # Panics
///
/// Emitting more than was requested breaks the protocol and is treated as a
/// bug in the emitter.
#[inline]
pub fn produced(current: u64, emitted: u64) -> u64 {
  if current == UNBOUNDED {
    return UNBOUNDED;
  }
  match current.checked_sub(emitted) {
    Some(rest) => rest,
    None => panic!("more items emitted ({emitted}) than requested ({current})"),
  }
}

/// Validates a request amount.
#[inline]
pub fn validate(n: u64) -> Result<u64, FlowError> {
  if n == 0 { Err(FlowError::InvalidDemand(n)) } else { Ok(n) }
}

/// Lock-free outstanding demand of one subscriber link.
#[derive(Debug, Default)]
pub struct Demand(AtomicU64);

impl Demand {
  pub fn new() -> Self { Self::default() }

  /// Current outstanding demand.
  #[inline]
  pub fn get(&self) -> u64 { self.0.load(Ordering::Acquire) }

  /// Adds `n` to the outstanding demand and returns the previous value.
  ///
  /// A zero request fails with [`FlowError::InvalidDemand`] and leaves the
  /// counter untouched.
  pub fn request(&self, n: u64) -> Result<u64, FlowError> {
    let n = validate(n)?;
    let mut current = self.0.load(Ordering::Acquire);
    loop {
      if current == UNBOUNDED {
        return Ok(UNBOUNDED);
      }
      match self.0.compare_exchange_weak(
        current,
        add_cap(current, n),
        Ordering::AcqRel,
        Ordering::Acquire,
      ) {
        Ok(prev) => return Ok(prev),
        Err(actual) => current = actual,
      }
    }
  }

  /// Removes `emitted` from the outstanding demand and returns what is left.
  ///
  /// # Panics
  ///
  /// When `emitted` exceeds the outstanding demand.
  pub fn produced(&self, emitted: u64) -> u64 {
    let mut current = self.0.load(Ordering::Acquire);
    loop {
      if current == UNBOUNDED {
        return UNBOUNDED;
      }
      let next = produced(current, emitted);
      match self
        .0
        .compare_exchange_weak(current, next, Ordering::AcqRel, Ordering::Acquire)
      {
        Ok(_) => return next,
        Err(actual) => current = actual,
      }
    }
  }

  /// Consumes one unit of demand if any is outstanding.
  ///
  /// Returns `false` without touching the counter when the demand is zero.
  pub fn try_consume_one(&self) -> bool {
    let mut current = self.0.load(Ordering::Acquire);
    loop {
      match current {
        0 => return false,
        UNBOUNDED => return true,
        _ => {}
      }
      match self.0.compare_exchange_weak(
        current,
        current - 1,
        Ordering::AcqRel,
        Ordering::Acquire,
      ) {
        Ok(_) => return true,
        Err(actual) => current = actual,
      }
    }
  }
}

#[cfg(test)]
mod test {
  use std::{
    sync::{
      atomic::{AtomicU64, Ordering},
      Arc,
    },
    thread,
  };

  use super::*;

  #[test]
  fn add_saturates() {
    assert_eq!(add_cap(1, 2), 3);
    assert_eq!(add_cap(UNBOUNDED - 1, 5), UNBOUNDED);
    assert_eq!(add_cap(UNBOUNDED, UNBOUNDED), UNBOUNDED);
  }

  #[test]
  fn produced_keeps_unbounded() {
    assert_eq!(produced(5, 2), 3);
    assert_eq!(produced(UNBOUNDED, 100), UNBOUNDED);
  }

  #[test]
  #[should_panic]
  fn produced_more_than_requested() { produced(1, 2); }

  #[test]
  fn zero_request_is_rejected_without_mutation() {
    let demand = Demand::new();
    demand.request(3).unwrap();
    let err = demand.request(0).unwrap_err();
    assert!(err.is_invalid_demand());
    assert_eq!(demand.get(), 3);
  }

  #[test]
  fn request_returns_previous() {
    let demand = Demand::new();
    assert_eq!(demand.request(2).unwrap(), 0);
    assert_eq!(demand.request(UNBOUNDED).unwrap(), 2);
    assert_eq!(demand.get(), UNBOUNDED);
    assert!(demand.try_consume_one());
    assert_eq!(demand.get(), UNBOUNDED);
  }

  #[test]
  fn consume_stops_at_zero() {
    let demand = Demand::new();
    demand.request(2).unwrap();
    assert!(demand.try_consume_one());
    assert!(demand.try_consume_one());
    assert!(!demand.try_consume_one());
    assert_eq!(demand.get(), 0);
  }

  #[test]
  fn concurrent_requests_and_consumption_never_overdraw() {
    let demand = Arc::new(Demand::new());
    let consumed = Arc::new(AtomicU64::new(0));
    let requesters: Vec<_> = (0..4)
      .map(|_| {
        let demand = demand.clone();
        thread::spawn(move || {
          for _ in 0..1000 {
            demand.request(1).unwrap();
          }
        })
      })
      .collect();
    let consumers: Vec<_> = (0..4)
      .map(|_| {
        let demand = demand.clone();
        let consumed = consumed.clone();
        thread::spawn(move || {
          for _ in 0..2000 {
            if demand.try_consume_one() {
              consumed.fetch_add(1, Ordering::Relaxed);
            }
          }
        })
      })
      .collect();
    requesters
      .into_iter()
      .chain(consumers)
      .for_each(|h| h.join().unwrap());

    let consumed = consumed.load(Ordering::Relaxed);
    assert!(consumed <= 4000);
    assert_eq!(consumed + demand.get(), 4000);
  }
}
