//! Session identity resolution and fetch coordination.

pub mod coordinator;
pub mod resolver;

pub use coordinator::{FetchCoordinator, FetchEvent, FetchState, Transition};
pub use resolver::{RedirectReason, Resolution, ResolvedSession, SessionResolver};
