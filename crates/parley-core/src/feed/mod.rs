//! Message feed: polling, subscriptions and outgoing composition.

pub mod compose;
pub mod messages;
pub mod poller;

pub use compose::{ComposeDraft, compose_outgoing};
pub use messages::{FeedHandle, FeedSnapshot, MessageFeed};
pub use poller::{PollControl, PollHandle, spawn_poller};
