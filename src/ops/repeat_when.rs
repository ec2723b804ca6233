//! RepeatWhen operator implementation
//!
//! Resubscribes to the source after each completion, for as long as the
//! publisher derived from the completion signals keeps emitting.
//!
//! ```rust
//! use std::sync::{
//!   atomic::{AtomicUsize, Ordering},
//!   Arc,
//! };
//!
//! use rxstreams::prelude::*;
//!
//! flowable::just(1)
//!   .repeat_when(|completions| {
//!     let rounds = Arc::new(AtomicUsize::new(1));
//!     completions.take_while(move |_| rounds.fetch_add(1, Ordering::SeqCst) < 3)
//!   })
//!   .test(UNBOUNDED)
//!   .assert_result(&[1, 1, 1]);
//! ```

use super::{
  redo::{Outcome, RedoMode, RedoWhen},
  trigger::Trigger,
};
use crate::{error::FlowError, publisher::Publisher};

/// Redoes on completion; errors pass through.
#[derive(Debug, Default, Clone, Copy)]
pub struct Repeat;

impl RedoMode for Repeat {
  type Signal = ();

  fn on_complete(&self) -> Outcome<()> { Outcome::Again(()) }

  fn on_error(&self, error: FlowError) -> Outcome<()> { Outcome::Error(error) }
}

pub type RepeatWhen<S> = RedoWhen<S, Repeat>;

impl<S> RepeatWhen<S> {
  pub fn new<F, W, U>(source: S, handler: F) -> Self
  where
    F: Fn(Trigger<()>) -> W + Send + Sync + 'static,
    W: Publisher<U>,
    U: Send + 'static,
  {
    RedoWhen::with_mode(source, handler, Repeat)
  }
}
