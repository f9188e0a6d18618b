//! Shared domain types for Parley.
//!
//! This crate contains the domain types used across the Parley messaging core:
//! viewers and roles, chat sessions, messages, conversations, bookings, route
//! parameters, configuration, and the error taxonomy.
//!
//! Zero infrastructure dependencies -- only serde, chrono, thiserror.

pub mod booking;
pub mod chat;
pub mod config;
pub mod error;
pub mod route;
pub mod viewer;
