//! Infrastructure layer for Parley.
//!
//! Contains the implementation of the `ChatBackend` port defined in
//! `parley-core` (REST over reqwest), the config-file loader and data
//! directory resolution.

pub mod config;
pub mod filesystem;
pub mod http;

pub use http::HttpChatBackend;
