//! Observability for Parley: tracing subscriber setup and span attribute names.

pub mod chat_attrs;
pub mod tracing_setup;

pub use tracing_setup::{init_tracing, shutdown_tracing};
