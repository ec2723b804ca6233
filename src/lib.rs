//! # rxstreams: Reactive Streams for Rust
//!
//! Backpressured publishers, a hot multicast processor and cancellable
//! executors, following the Reactive Streams demand protocol: a subscriber
//! receives no more items than it requested through its subscription.
//!
//! ## Quick Start
//!
//! ```rust
//! use rxstreams::prelude::*;
//!
//! let ts = flowable::from_iter(1..=3)
//!   .repeat_when(|signals: Trigger<()>| signals.take_while(|_| false))
//!   .test(UNBOUNDED);
//! ts.assert_result(&[1, 2, 3]);
//! ```
//!
//! ## Key Concepts
//!
//! | Type | Description |
//! |------|-------------|
//! | [`Publisher`] | Produces items on demand to its subscribers |
//! | [`Subscriber`] | Consumes `on_subscribe`, `on_next`, `on_error` and `on_complete` |
//! | [`Subscription`] | Grants demand and cancels |
//! | [`PublishProcessor`] | Hot multicast publisher, also a subscriber |
//! | [`ExecutorService`] | Hands out workers that run and track actions |
//!
//! ## Feature Flags
//!
//! - **`tokio-scheduler`**: lets the task executor spawn onto a tokio runtime
//!
//! [`Publisher`]: publisher::Publisher
//! [`Subscriber`]: subscriber::Subscriber
//! [`Subscription`]: subscription::Subscription
//! [`PublishProcessor`]: processor::PublishProcessor
//! [`ExecutorService`]: executor::ExecutorService

pub mod demand;
pub mod error;
pub mod executor;
pub mod flowable;
pub mod ops;
pub mod prelude;
pub mod processor;
pub mod publisher;
pub mod subscriber;
pub mod subscription;
pub mod test_subscriber;

pub use error::FlowError;
pub use prelude::*;
