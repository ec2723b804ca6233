//! Hot multicast processors: both subscriber of a source and publisher to
//! many downstream subscribers.

mod publish;
mod ref_count;
mod subscribers;

pub use publish::PublishProcessor;
pub use ref_count::RefCount;
