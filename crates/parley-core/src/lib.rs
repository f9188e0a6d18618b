//! Session resolution, fetch coordination and message feed for Parley.
//!
//! This crate defines the "ports" (`ChatBackend`, `MediaRecorder`) that the
//! infrastructure layer implements, and the messaging core built on them.
//! It depends only on `parley-types` -- never on `parley-infra` or any
//! HTTP crate.

pub mod attachment;
pub mod backend;
pub mod directory;
pub mod event;
pub mod feed;
pub mod notification;
pub mod recorder;
pub mod role;
pub mod session;
pub mod view;

#[cfg(test)]
pub(crate) mod testing;
