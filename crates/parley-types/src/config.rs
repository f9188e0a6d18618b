//! Client configuration types for Parley.
//!
//! `ChatConfig` represents the `config.toml` that points the messaging core at
//! a backend and controls its polling cadence.

use serde::{Deserialize, Serialize};

use std::time::Duration;

/// Top-level configuration for the messaging core.
///
/// Loaded from `~/.parley/config.toml`. All fields have sensible defaults.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatConfig {
    /// Backend origin, e.g. `https://api.example.com`.
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Message poll interval while a chat is open.
    #[serde(default = "default_message_poll_secs")]
    pub message_poll_secs: u64,

    /// Conversation list poll interval outside an open chat.
    #[serde(default = "default_conversation_poll_secs")]
    pub conversation_poll_secs: u64,

    /// Notification badge poll interval.
    #[serde(default = "default_notification_poll_secs")]
    pub notification_poll_secs: u64,

    /// Per-request HTTP timeout.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

fn default_base_url() -> String {
    "http://localhost:5000".to_string()
}

fn default_message_poll_secs() -> u64 {
    5
}

fn default_conversation_poll_secs() -> u64 {
    10
}

fn default_notification_poll_secs() -> u64 {
    30
}

fn default_request_timeout_secs() -> u64 {
    30
}

impl ChatConfig {
    pub fn message_poll_interval(&self) -> Duration {
        Duration::from_secs(self.message_poll_secs.max(1))
    }

    pub fn conversation_poll_interval(&self) -> Duration {
        Duration::from_secs(self.conversation_poll_secs.max(1))
    }

    pub fn notification_poll_interval(&self) -> Duration {
        Duration::from_secs(self.notification_poll_secs.max(1))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}

impl Default for ChatConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            message_poll_secs: default_message_poll_secs(),
            conversation_poll_secs: default_conversation_poll_secs(),
            notification_poll_secs: default_notification_poll_secs(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chat_config_default_values() {
        let config = ChatConfig::default();
        assert_eq!(config.message_poll_interval(), Duration::from_secs(5));
        assert_eq!(config.conversation_poll_interval(), Duration::from_secs(10));
        assert_eq!(config.notification_poll_interval(), Duration::from_secs(30));
    }

    #[test]
    fn test_chat_config_deserialize_with_defaults() {
        let config: ChatConfig = toml::from_str("").unwrap();
        assert_eq!(config.base_url, "http://localhost:5000");
        assert_eq!(config.message_poll_secs, 5);
    }

    #[test]
    fn test_chat_config_deserialize_with_values() {
        let toml_str = r#"
base_url = "https://api.example.com"
message_poll_secs = 2
"#;
        let config: ChatConfig = toml::from_str(toml_str).unwrap();
        assert_eq!(config.base_url, "https://api.example.com");
        assert_eq!(config.message_poll_secs, 2);
        assert_eq!(config.conversation_poll_secs, 10);
    }

    #[test]
    fn test_zero_interval_is_clamped() {
        let config = ChatConfig {
            message_poll_secs: 0,
            ..ChatConfig::default()
        };
        assert_eq!(config.message_poll_interval(), Duration::from_secs(1));
    }
}
