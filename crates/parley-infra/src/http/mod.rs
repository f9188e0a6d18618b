//! REST backend client.

pub mod client;
pub mod types;

pub use client::HttpChatBackend;
