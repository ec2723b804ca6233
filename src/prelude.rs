//! Prelude module for convenient imports
//!
//! This module re-exports commonly used types and traits for easy access.

// Sources
pub use crate::flowable;
// Demand
pub use crate::demand::{Demand, UNBOUNDED};
// Errors
pub use crate::error::FlowError;
// Executors
pub use crate::executor::{
  Action, ExecutorConfig, ExecutorContext, ExecutorService, Executors, PeriodicAction,
  TestExecutor, Worker,
};
// Operators
pub use crate::ops::{RepeatWhen, RetryWhen, SubscribeOn, TakeWhile, Trigger};
// Processors
pub use crate::processor::{PublishProcessor, RefCount};
// Core traits
pub use crate::publisher::{Publisher, PublisherExt, PublisherRef};
pub use crate::subscriber::{BoxedSubscriber, SerializedSubscriber, Subscriber};
// Subscription
pub use crate::subscription::*;
// Test tooling
pub use crate::test_subscriber::TestSubscriber;
