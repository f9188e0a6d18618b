//! HttpChatBackend -- concrete [`ChatBackend`] implementation over the REST API.
//!
//! JSON requests through `reqwest`, multipart for uploads. The bearer token
//! is wrapped in [`secrecy::SecretString`] and only exposed when building
//! the `Authorization` header.
//!
//! Non-2xx responses are mapped to [`BackendError`] here, so the core only
//! ever sees the typed error and its three-way classification.

use std::time::Duration;

use reqwest::{Method, RequestBuilder, Response, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::debug;

use parley_core::backend::{ChatBackend, FileUpload, OutgoingMessage};
use parley_types::booking::Booking;
use parley_types::chat::{ChatSession, Conversation, Message};
use parley_types::config::ChatConfig;
use parley_types::error::BackendError;

use super::types::{
    BookingEnvelope, ConversationsEnvelope, CountEnvelope, ErrorBody, MessageEnvelope,
    MessagesEnvelope, SessionEnvelope, UploadEnvelope, VideoRoomEnvelope, WireSession,
};

/// Longest error body kept in an error message.
const MAX_ERROR_BODY: usize = 300;

/// Owner type sent with every message attachment upload.
const UPLOAD_OWNER_TYPE: &str = "MESSAGE";

/// REST client for the chat backend.
///
/// Does not implement `Debug`, so the token cannot leak through `{:?}`.
pub struct HttpChatBackend {
    client: reqwest::Client,
    base: Url,
    token: Option<SecretString>,
}

impl HttpChatBackend {
    /// Create a client for the backend at `base_url`.
    pub fn new(
        base_url: &str,
        token: Option<SecretString>,
        timeout: Duration,
    ) -> Result<Self, BackendError> {
        let base = Url::parse(base_url.trim())
            .map_err(|e| BackendError::Transport(format!("invalid base URL '{base_url}': {e}")))?;
        if base.cannot_be_a_base() {
            return Err(BackendError::Transport(format!(
                "base URL '{base_url}' cannot carry a path"
            )));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("parley/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| BackendError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base,
            token,
        })
    }

    pub fn from_config(config: &ChatConfig, token: Option<SecretString>) -> Result<Self, BackendError> {
        Self::new(&config.base_url, token, config.request_timeout())
    }

    pub fn base_url(&self) -> &str {
        self.base.as_str()
    }

    /// Build an endpoint URL from path segments. Segments are percent-encoded.
    fn endpoint(&self, segments: &[&str]) -> Url {
        let mut url = self.base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, segments: &[&str]) -> RequestBuilder {
        let url = self.endpoint(segments);
        debug!(%method, %url, "Backend request");
        let builder = self.client.request(method, url);
        match &self.token {
            Some(token) => builder.bearer_auth(token.expose_secret()),
            None => builder,
        }
    }

    async fn send(&self, builder: RequestBuilder) -> Result<Response, BackendError> {
        let response = builder
            .send()
            .await
            .map_err(|e| BackendError::Transport(format!("HTTP request failed: {e}")))?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(status_error(status.as_u16(), &body))
    }

    async fn fetch<T: DeserializeOwned>(&self, builder: RequestBuilder) -> Result<T, BackendError> {
        self.send(builder)
            .await?
            .json::<T>()
            .await
            .map_err(|e| BackendError::Deserialization(format!("failed to parse response: {e}")))
    }
}

/// Map a non-2xx response to a [`BackendError`].
pub(crate) fn status_error(status: u16, body: &str) -> BackendError {
    let message = error_message(body);
    match status {
        401 => BackendError::Unauthorized,
        403 => BackendError::Forbidden(message),
        404 => BackendError::NotFound(message),
        _ => BackendError::Status { status, message },
    }
}

/// The backend's error text: `message`/`error` of a JSON body, else the raw body.
fn error_message(body: &str) -> String {
    if let Some(text) = serde_json::from_str::<ErrorBody>(body)
        .ok()
        .and_then(ErrorBody::into_text)
    {
        return text;
    }
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_ERROR_BODY) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}

impl ChatBackend for HttpChatBackend {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, BackendError> {
        let env: ConversationsEnvelope = self
            .fetch(self.request(Method::GET, &["api", "chat", "conversations"]))
            .await?;
        Ok(env.conversations)
    }

    async fn get_booking(&self, booking_id: &str) -> Result<Booking, BackendError> {
        let env: BookingEnvelope = self
            .fetch(self.request(Method::GET, &["api", "bookings", booking_id]))
            .await?;
        Ok(env.booking)
    }

    async fn get_session_for_booking(
        &self,
        booking_id: &str,
    ) -> Result<Option<ChatSession>, BackendError> {
        let result: Result<SessionEnvelope, _> = self
            .fetch(self.request(
                Method::GET,
                &["api", "chat", "sessions", "booking", booking_id],
            ))
            .await;
        match result {
            Ok(env) => Ok(env.session.map(WireSession::into_session)),
            Err(BackendError::NotFound(_)) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn create_session_for_booking(&self, booking_id: &str) -> Result<ChatSession, BackendError> {
        let env: SessionEnvelope = self
            .fetch(self.request(
                Method::POST,
                &["api", "chat", "sessions", "booking", booking_id],
            ))
            .await?;
        env.session
            .map(WireSession::into_session)
            .ok_or_else(|| BackendError::Deserialization("session missing from response".to_string()))
    }

    async fn generate_video_room(&self, session_id: &str) -> Result<String, BackendError> {
        let env: VideoRoomEnvelope = self
            .fetch(self.request(
                Method::POST,
                &["api", "chat", "sessions", session_id, "video-room"],
            ))
            .await?;
        Ok(env.room_url)
    }

    async fn start_session(&self, session_id: &str) -> Result<ChatSession, BackendError> {
        self.session_action(session_id, "start").await
    }

    async fn end_session(&self, session_id: &str) -> Result<ChatSession, BackendError> {
        self.session_action(session_id, "end").await
    }

    async fn get_messages(&self, session_id: &str) -> Result<Vec<Message>, BackendError> {
        let env: MessagesEnvelope = self
            .fetch(self.request(
                Method::GET,
                &["api", "chat", "sessions", session_id, "messages"],
            ))
            .await?;
        Ok(env.messages)
    }

    async fn send_message(
        &self,
        session_id: &str,
        message: &OutgoingMessage,
    ) -> Result<Message, BackendError> {
        let env: MessageEnvelope = self
            .fetch(
                self.request(
                    Method::POST,
                    &["api", "chat", "sessions", session_id, "messages"],
                )
                .json(message),
            )
            .await?;
        Ok(env.message)
    }

    async fn mark_as_read(&self, session_id: &str) -> Result<(), BackendError> {
        self.send(self.request(
            Method::POST,
            &["api", "chat", "sessions", session_id, "read"],
        ))
        .await?;
        Ok(())
    }

    async fn upload_file(&self, session_id: &str, upload: &FileUpload) -> Result<String, BackendError> {
        let mut part = reqwest::multipart::Part::bytes(upload.bytes.clone())
            .file_name(upload.file_name.clone());
        if let Some(mime) = &upload.mime_type {
            part = part
                .mime_str(mime)
                .map_err(|e| BackendError::Transport(format!("invalid MIME type '{mime}': {e}")))?;
        }
        let form = reqwest::multipart::Form::new()
            .part("file", part)
            .text("ownerType", UPLOAD_OWNER_TYPE)
            .text("ownerId", session_id.to_string());

        let env: UploadEnvelope = self
            .fetch(
                self.request(Method::POST, &["api", "files", "upload"])
                    .multipart(form),
            )
            .await?;
        Ok(env.file.file_url)
    }

    async fn unread_notification_count(&self) -> Result<u32, BackendError> {
        let env: CountEnvelope = self
            .fetch(self.request(
                Method::GET,
                &["api", "notifications", "unread-count"],
            ))
            .await?;
        Ok(env.count)
    }
}

impl HttpChatBackend {
    async fn session_action(&self, session_id: &str, action: &str) -> Result<ChatSession, BackendError> {
        let env: SessionEnvelope = self
            .fetch(self.request(
                Method::POST,
                &["api", "chat", "sessions", session_id, action],
            ))
            .await?;
        env.session
            .map(WireSession::into_session)
            .ok_or_else(|| BackendError::Deserialization("session missing from response".to_string()))
    }
}
