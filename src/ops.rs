//! Operators over [`Publisher`](crate::publisher::Publisher)s.
//!
//! They are reached through [`PublisherExt`](crate::publisher::PublisherExt).

pub mod redo;
pub mod repeat_when;
pub mod retry_when;
pub mod subscribe_on;
pub mod take_while;
pub mod trigger;

pub use repeat_when::RepeatWhen;
pub use retry_when::RetryWhen;
pub use subscribe_on::SubscribeOn;
pub use take_while::TakeWhile;
pub use trigger::Trigger;
