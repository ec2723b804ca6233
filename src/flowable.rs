//! Cold sources.
//!
//! Every source here produces an independent sequence per subscriber and can
//! be subscribed again, which the feedback operators rely on.

mod defer;
mod from_iter;
mod trivial;

pub use defer::{defer, Defer};
pub use from_iter::{from_iter, just, FromIter};
pub use trivial::{empty, fail, Empty, Fail};
