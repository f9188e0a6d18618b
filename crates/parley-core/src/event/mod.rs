//! View events.
//!
//! The chat view publishes everything a renderer reacts to (resolution,
//! redirects, feed updates, send outcomes) on an [`EventBus`].

pub mod bus;

pub use bus::EventBus;

use serde::Serialize;

use parley_types::chat::SessionKind;

use crate::role::Redirect;

/// Something a chat view renderer should react to.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ViewEvent {
    Resolved {
        identity: String,
        kind: SessionKind,
        session_id: Option<String>,
    },
    Redirect(Redirect),
    MessagesUpdated {
        session_id: String,
        count: usize,
        revision: u64,
    },
    SessionCreated {
        booking_id: String,
        session_id: String,
    },
    MessageSent {
        session_id: String,
        message_id: String,
    },
    SendFailed {
        error: String,
    },
    SessionEnded {
        session_id: String,
    },
}

impl ViewEvent {
    /// Short name for logs.
    pub fn name(&self) -> &'static str {
        match self {
            ViewEvent::Resolved { .. } => "resolved",
            ViewEvent::Redirect(_) => "redirect",
            ViewEvent::MessagesUpdated { .. } => "messages_updated",
            ViewEvent::SessionCreated { .. } => "session_created",
            ViewEvent::MessageSent { .. } => "message_sent",
            ViewEvent::SendFailed { .. } => "send_failed",
            ViewEvent::SessionEnded { .. } => "session_ended",
        }
    }
}
