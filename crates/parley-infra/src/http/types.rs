//! Wire envelopes for the chat REST backend.
//!
//! Every endpoint wraps its payload in a single-key object
//! (`{"booking": {...}}`, `{"messages": [...]}`). These structs exist only to
//! peel that layer off; the domain types live in parley-types.

use serde::Deserialize;

use parley_types::booking::Booking;
use parley_types::chat::{ChatSession, Conversation, Message, SessionKind, SessionStatus};

#[derive(Debug, Deserialize)]
pub struct ConversationsEnvelope {
    #[serde(default)]
    pub conversations: Vec<Conversation>,
}

#[derive(Debug, Deserialize)]
pub struct BookingEnvelope {
    pub booking: Booking,
}

#[derive(Debug, Deserialize)]
pub struct SessionEnvelope {
    #[serde(default)]
    pub session: Option<WireSession>,
}

#[derive(Debug, Deserialize)]
pub struct MessagesEnvelope {
    #[serde(default)]
    pub messages: Vec<Message>,
}

#[derive(Debug, Deserialize)]
pub struct MessageEnvelope {
    pub message: Message,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VideoRoomEnvelope {
    #[serde(alias = "url", alias = "videoRoomUrl")]
    pub room_url: String,
}

#[derive(Debug, Deserialize)]
pub struct UploadEnvelope {
    pub file: UploadedFile,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadedFile {
    pub file_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CountEnvelope {
    #[serde(default)]
    pub count: u32,
}

/// Error body; the backend uses either key.
#[derive(Debug, Default, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl ErrorBody {
    pub fn into_text(self) -> Option<String> {
        self.message.or(self.error).filter(|m| !m.trim().is_empty())
    }
}

/// Session as returned by the session endpoints.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireSession {
    pub id: String,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub booking_id: Option<String>,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub consultant_user_id: Option<String>,
    #[serde(default, alias = "videoRoomUrl")]
    pub room_url: Option<String>,
}

impl WireSession {
    pub fn into_session(self) -> ChatSession {
        let status = self
            .status
            .as_deref()
            .and_then(|s| s.parse::<SessionStatus>().ok())
            .unwrap_or_default();
        let kind = if self.booking_id.is_some() {
            SessionKind::BookingBound
        } else {
            SessionKind::DirectMessage
        };
        let participants = [self.client_id, self.consultant_user_id]
            .into_iter()
            .flatten()
            .filter(|id| !id.is_empty())
            .collect();

        ChatSession {
            id: self.id,
            kind,
            status,
            participants,
            booking_id: self.booking_id,
            room_url: self.room_url,
        }
    }
}
