//! Chat session, message, and conversation types for Parley.
//!
//! These types model consultations and direct conversations between platform
//! users: sessions (direct or booking-bound), the immutable messages inside
//! them, and the conversation list entries used to discover direct sessions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use std::fmt;
use std::str::FromStr;

/// Whether a session is a free-standing direct conversation or tied to a booking.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionKind {
    DirectMessage,
    BookingBound,
}

impl fmt::Display for SessionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionKind::DirectMessage => write!(f, "direct"),
            SessionKind::BookingBound => write!(f, "booking"),
        }
    }
}

/// Lifecycle status of a chat session.
///
/// Booking-bound sessions cycle through all four states. Direct sessions
/// are effectively always `InProgress` once created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionStatus {
    Scheduled,
    InProgress,
    Stopped,
    Completed,
}

impl SessionStatus {
    /// Terminal sessions accept no further messages.
    pub fn is_terminal(self) -> bool {
        matches!(self, SessionStatus::Stopped | SessionStatus::Completed)
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionStatus::Scheduled => write!(f, "SCHEDULED"),
            SessionStatus::InProgress => write!(f, "IN_PROGRESS"),
            SessionStatus::Stopped => write!(f, "STOPPED"),
            SessionStatus::Completed => write!(f, "COMPLETED"),
        }
    }
}

impl FromStr for SessionStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().replace('-', "_").as_str() {
            "SCHEDULED" => Ok(SessionStatus::Scheduled),
            "IN_PROGRESS" => Ok(SessionStatus::InProgress),
            "STOPPED" => Ok(SessionStatus::Stopped),
            "COMPLETED" => Ok(SessionStatus::Completed),
            other => Err(format!("invalid session status: '{other}'")),
        }
    }
}

impl Default for SessionStatus {
    fn default() -> Self {
        SessionStatus::InProgress
    }
}

/// A resolved chat session.
///
/// For direct sessions `participants` holds the two user ids known from the
/// conversation list (possibly empty when discovered through a message probe).
/// For booking-bound sessions it is derived from the booking's client and
/// consultant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChatSession {
    pub id: String,
    pub kind: SessionKind,
    #[serde(default)]
    pub status: SessionStatus,
    #[serde(default)]
    pub participants: Vec<String>,
    #[serde(default)]
    pub booking_id: Option<String>,
    /// Opaque video room URL, if one was generated for this session.
    #[serde(default)]
    pub room_url: Option<String>,
}

impl ChatSession {
    /// Whether sending is disabled because the session reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }

    /// The participant that is not `sender_id`, if exactly one such id is known.
    pub fn counterpart_of(&self, sender_id: &str) -> Option<&str> {
        let mut others = self
            .participants
            .iter()
            .filter(|p| !p.is_empty() && p.as_str() != sender_id);
        match (others.next(), others.next()) {
            (Some(only), None) => Some(only.as_str()),
            _ => None,
        }
    }
}

/// Declared type of a message.
///
/// The declared type can be wrong or stale; renderers reclassify each
/// attachment independently and only use this as a tie-breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageType {
    Text,
    Image,
    Audio,
    Video,
    File,
    VideoCallInvitation,
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Audio => "audio",
            MessageType::Video => "video",
            MessageType::File => "file",
            MessageType::VideoCallInvitation => "video_call_invitation",
        };
        write!(f, "{s}")
    }
}

impl FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(MessageType::Text),
            "image" => Ok(MessageType::Image),
            "audio" => Ok(MessageType::Audio),
            "video" => Ok(MessageType::Video),
            "file" => Ok(MessageType::File),
            "video_call_invitation" => Ok(MessageType::VideoCallInvitation),
            other => Err(format!("invalid message type: '{other}'")),
        }
    }
}

/// Accepts any casing and maps unknown or empty values to `None` instead of failing
/// the whole message list.
fn lenient_message_type<'de, D>(deserializer: D) -> Result<Option<MessageType>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    Ok(raw.and_then(|s| s.parse().ok()))
}

/// A single message within a chat session. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    pub id: String,
    pub session_id: String,
    pub sender_id: String,
    #[serde(default)]
    pub receiver_id: Option<String>,
    /// Text body. May be empty when attachments are present.
    #[serde(default)]
    pub content: String,
    #[serde(default, deserialize_with = "lenient_message_type")]
    pub message_type: Option<MessageType>,
    /// Ordered attachment URLs or base64 data URIs.
    #[serde(default)]
    pub attachments: Vec<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub is_read: bool,
}

impl Message {
    /// Whether this message still needs to be marked as read by `viewer_id`.
    pub fn is_unread_for(&self, viewer_id: &str) -> bool {
        !self.is_read && self.sender_id != viewer_id
    }
}

/// One entry of the conversation list.
///
/// `session_id` is set once a session exists; direct conversations carry
/// `is_direct` and may use `id` as the session reference.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Conversation {
    pub id: String,
    #[serde(default)]
    pub session_id: Option<String>,
    #[serde(default)]
    pub is_direct: bool,
    #[serde(default)]
    pub client_id: Option<String>,
    #[serde(default)]
    pub consultant_user_id: Option<String>,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub status: Option<SessionStatus>,
    #[serde(default)]
    pub last_message: Option<String>,
    #[serde(default)]
    pub last_message_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub unread_count: u32,
    #[serde(default)]
    pub booking_id: Option<String>,
}

impl Conversation {
    /// Whether this entry refers to `identity` as a direct session.
    ///
    /// Matches on `sessionId`, or on `id` for entries flagged as direct.
    pub fn matches_session(&self, identity: &str) -> bool {
        self.session_id.as_deref() == Some(identity) || (self.is_direct && self.id == identity)
    }

    /// The session id this conversation refers to.
    pub fn session_ref(&self) -> &str {
        self.session_id.as_deref().unwrap_or(&self.id)
    }

    /// Known participant ids, in (client, consultant) order.
    pub fn participants(&self) -> Vec<String> {
        [&self.client_id, &self.consultant_user_id]
            .into_iter()
            .flatten()
            .filter(|id| !id.is_empty())
            .cloned()
            .collect()
    }

    /// Build the direct session described by this conversation entry.
    pub fn to_direct_session(&self) -> ChatSession {
        ChatSession {
            id: self.session_ref().to_string(),
            kind: SessionKind::DirectMessage,
            status: self.status.unwrap_or(SessionStatus::InProgress),
            participants: self.participants(),
            booking_id: self.booking_id.clone(),
            room_url: None,
        }
    }
}
