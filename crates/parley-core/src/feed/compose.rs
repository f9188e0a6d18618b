//! Outgoing message composition.

use serde::{Deserialize, Serialize};

use parley_types::chat::{ChatSession, MessageType, SessionKind};
use parley_types::error::SendError;
use parley_types::viewer::Viewer;

use crate::attachment::infer_message_type;
use crate::backend::OutgoingMessage;

/// Text and attachments staged for the next send.
///
/// Only cleared after a successful send; every failure leaves it intact.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComposeDraft {
    pub text: String,
    /// Uploaded attachment URLs.
    pub attachments: Vec<String>,
    /// Declared type for attachments whose container is ambiguous
    /// (e.g. a recorded video clip saved as `.webm`).
    pub type_hint: Option<MessageType>,
}

impl ComposeDraft {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }

    pub fn with_attachment(mut self, url: impl Into<String>) -> Self {
        self.attachments.push(url.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty() && self.attachments.is_empty()
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }
}

/// Build the request body for sending `draft` into `session`.
///
/// `send_as` is the admin impersonation override; the receiver is only
/// filled in for direct sessions with exactly one known counterpart.
pub fn compose_outgoing(
    draft: &ComposeDraft,
    session: &ChatSession,
    viewer: &Viewer,
    send_as: Option<&str>,
) -> Result<OutgoingMessage, SendError> {
    if draft.is_empty() {
        return Err(SendError::Empty);
    }
    if session.is_terminal() {
        return Err(SendError::SessionClosed);
    }
    if send_as.is_some() && !viewer.is_admin() {
        return Err(SendError::NotPermitted);
    }

    let sender = send_as.unwrap_or(&viewer.id);
    let receiver_id = match session.kind {
        SessionKind::DirectMessage => session.counterpart_of(sender).map(str::to_string),
        SessionKind::BookingBound => None,
    };

    let message_type = match draft.type_hint {
        Some(MessageType::VideoCallInvitation) if draft.attachments.is_empty() => {
            MessageType::VideoCallInvitation
        }
        hint => infer_message_type(&draft.attachments, hint),
    };

    Ok(OutgoingMessage {
        content: draft.text.trim().to_string(),
        message_type,
        attachments: draft.attachments.clone(),
        sender_id: send_as.map(str::to_string),
        receiver_id,
    })
}
