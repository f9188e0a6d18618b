//! ChatBackend trait definition.
//!
//! The REST backend is an external collaborator; this trait is the only
//! surface of it the messaging core sees. Follows the same RPITIT pattern as
//! the other ports: native async fn in traits, futures required to be `Send`
//! so poll loops can run on spawned tasks.

use serde::{Deserialize, Serialize};

use parley_types::booking::Booking;
use parley_types::chat::{ChatSession, Conversation, Message, MessageType};
use parley_types::error::BackendError;

/// Body of a send-message request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutgoingMessage {
    pub content: String,
    pub message_type: MessageType,
    pub attachments: Vec<String>,
    /// Admin-only impersonation override.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sender_id: Option<String>,
    /// Only set for direct sessions when the counterpart is known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receiver_id: Option<String>,
}

/// A file to upload as a message attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileUpload {
    pub file_name: String,
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

/// Port for the REST backend.
///
/// Implementations live in parley-infra (e.g., `HttpChatBackend`).
pub trait ChatBackend: Send + Sync {
    /// List the viewer's conversations (direct and booking-bound).
    fn list_conversations(
        &self,
    ) -> impl std::future::Future<Output = Result<Vec<Conversation>, BackendError>> + Send;

    /// Fetch a booking by id. Missing and forbidden bookings are distinguished by status.
    fn get_booking(
        &self,
        booking_id: &str,
    ) -> impl std::future::Future<Output = Result<Booking, BackendError>> + Send;

    /// Fetch the session attached to a booking. `Ok(None)` when none was started yet.
    fn get_session_for_booking(
        &self,
        booking_id: &str,
    ) -> impl std::future::Future<Output = Result<Option<ChatSession>, BackendError>> + Send;

    /// Create the session for a booking.
    fn create_session_for_booking(
        &self,
        booking_id: &str,
    ) -> impl std::future::Future<Output = Result<ChatSession, BackendError>> + Send;

    /// Generate a video room for a session and return its URL.
    fn generate_video_room(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<String, BackendError>> + Send;

    /// Move a session to `IN_PROGRESS`.
    fn start_session(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<ChatSession, BackendError>> + Send;

    /// Move a session to a terminal status.
    fn end_session(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<ChatSession, BackendError>> + Send;

    /// Get the complete message list for a session, oldest first.
    fn get_messages(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<Vec<Message>, BackendError>> + Send;

    /// Append a message to a session.
    fn send_message(
        &self,
        session_id: &str,
        message: &OutgoingMessage,
    ) -> impl std::future::Future<Output = Result<Message, BackendError>> + Send;

    /// Mark every message in a session as read for the caller.
    fn mark_as_read(
        &self,
        session_id: &str,
    ) -> impl std::future::Future<Output = Result<(), BackendError>> + Send;

    /// Upload a file owned by a session's messages. Returns the stored file URL.
    fn upload_file(
        &self,
        session_id: &str,
        upload: &FileUpload,
    ) -> impl std::future::Future<Output = Result<String, BackendError>> + Send;

    /// Count of unread notifications for the caller (badge).
    fn unread_notification_count(
        &self,
    ) -> impl std::future::Future<Output = Result<u32, BackendError>> + Send;
}
