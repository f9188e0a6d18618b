//! In-memory `ChatBackend` and fixtures shared by the core tests.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use tokio::sync::Notify;

use parley_types::booking::{Booking, BookingParty, BookingStatus};
use parley_types::chat::{ChatSession, Conversation, Message, SessionKind, SessionStatus};
use parley_types::error::BackendError;

use crate::backend::{ChatBackend, FileUpload, OutgoingMessage};

#[derive(Default)]
struct MockState {
    caller: String,
    conversations: Vec<Conversation>,
    conversation_error: Option<BackendError>,
    bookings: HashMap<String, Booking>,
    booking_errors: HashMap<String, BackendError>,
    /// Sessions keyed by booking id.
    sessions: HashMap<String, ChatSession>,
    messages: HashMap<String, Vec<Message>>,
    message_errors: HashMap<String, BackendError>,
    send_error: Option<BackendError>,
    mark_read_error: Option<BackendError>,
    notification_count: u32,
    notification_error: Option<BackendError>,
    sent: Vec<(String, OutgoingMessage)>,
    uploads: Vec<(String, FileUpload)>,
    next_id: u64,
}

/// Scriptable backend with per-method call counters.
pub(crate) struct MockBackend {
    state: Mutex<MockState>,
    calls: Mutex<HashMap<&'static str, usize>>,
    booking_gate: Mutex<Option<Arc<Notify>>>,
    create_gate: Mutex<Option<Arc<Notify>>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(MockState {
                caller: "u1".to_string(),
                ..Default::default()
            }),
            calls: Mutex::new(HashMap::new()),
            booking_gate: Mutex::new(None),
            create_gate: Mutex::new(None),
        }
    }

    /// The user id the backend treats as the authenticated caller.
    pub fn set_caller(&self, caller: &str) {
        self.state.lock().unwrap().caller = caller.to_string();
    }

    pub fn add_conversation(&self, conversation: Conversation) {
        self.state.lock().unwrap().conversations.push(conversation);
    }

    pub fn fail_conversations(&self, err: BackendError) {
        self.state.lock().unwrap().conversation_error = Some(err);
    }

    pub fn add_booking(&self, booking: Booking) {
        self.state
            .lock()
            .unwrap()
            .bookings
            .insert(booking.id.clone(), booking);
    }

    pub fn fail_booking(&self, booking_id: &str, err: BackendError) {
        self.state
            .lock()
            .unwrap()
            .booking_errors
            .insert(booking_id.to_string(), err);
    }

    /// Start the session for an existing booking.
    pub fn create_session_for(&self, booking_id: &str) -> ChatSession {
        let mut state = self.state.lock().unwrap();
        create_session(&mut state, booking_id)
    }

    pub fn set_session_status(&self, booking_id: &str, status: SessionStatus) {
        if let Some(s) = self.state.lock().unwrap().sessions.get_mut(booking_id) {
            s.status = status;
        }
    }

    pub fn add_message(&self, message: Message) {
        self.state
            .lock()
            .unwrap()
            .messages
            .entry(message.session_id.clone())
            .or_default()
            .push(message);
    }

    pub fn fail_messages(&self, session_id: &str, err: BackendError) {
        self.state
            .lock()
            .unwrap()
            .message_errors
            .insert(session_id.to_string(), err);
    }

    pub fn clear_message_failure(&self, session_id: &str) {
        self.state.lock().unwrap().message_errors.remove(session_id);
    }

    /// Fail the next `send_message` call only.
    pub fn fail_next_send(&self, err: BackendError) {
        self.state.lock().unwrap().send_error = Some(err);
    }

    pub fn fail_mark_read(&self, err: BackendError) {
        self.state.lock().unwrap().mark_read_error = Some(err);
    }

    pub fn set_notification_count(&self, count: u32) {
        self.state.lock().unwrap().notification_count = count;
    }

    pub fn fail_notifications(&self, err: Option<BackendError>) {
        self.state.lock().unwrap().notification_error = err;
    }

    /// Make every `get_booking` call wait for a permit on the returned gate.
    pub fn hold_bookings(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.booking_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    /// Make the next `create_session_for_booking` call wait for a permit on the returned gate.
    pub fn hold_session_creation(&self) -> Arc<Notify> {
        let gate = Arc::new(Notify::new());
        *self.create_gate.lock().unwrap() = Some(gate.clone());
        gate
    }

    pub fn sent(&self) -> Vec<(String, OutgoingMessage)> {
        self.state.lock().unwrap().sent.clone()
    }

    pub fn uploads(&self) -> Vec<(String, FileUpload)> {
        self.state.lock().unwrap().uploads.clone()
    }

    pub fn calls(&self, method: &str) -> usize {
        self.calls.lock().unwrap().get(method).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().unwrap().values().sum()
    }

    fn record(&self, method: &'static str) {
        *self.calls.lock().unwrap().entry(method).or_insert(0) += 1;
    }
}

fn create_session(state: &mut MockState, booking_id: &str) -> ChatSession {
    let participants = state
        .bookings
        .get(booking_id)
        .map(Booking::participants)
        .unwrap_or_default();
    state
        .sessions
        .entry(booking_id.to_string())
        .or_insert_with(|| ChatSession {
            id: format!("sess-{booking_id}"),
            kind: SessionKind::BookingBound,
            status: SessionStatus::InProgress,
            participants,
            booking_id: Some(booking_id.to_string()),
            room_url: None,
        })
        .clone()
}

fn set_status(state: &mut MockState, session_id: &str, status: SessionStatus) -> ChatSession {
    if let Some(session) = state.sessions.values_mut().find(|s| s.id == session_id) {
        session.status = status;
        return session.clone();
    }
    ChatSession {
        id: session_id.to_string(),
        kind: SessionKind::DirectMessage,
        status,
        participants: Vec::new(),
        booking_id: None,
        room_url: None,
    }
}

impl ChatBackend for MockBackend {
    async fn list_conversations(&self) -> Result<Vec<Conversation>, BackendError> {
        self.record("list_conversations");
        let state = self.state.lock().unwrap();
        match &state.conversation_error {
            Some(err) => Err(err.clone()),
            None => Ok(state.conversations.clone()),
        }
    }

    async fn get_booking(&self, booking_id: &str) -> Result<Booking, BackendError> {
        self.record("get_booking");
        let gate = self.booking_gate.lock().unwrap().clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let state = self.state.lock().unwrap();
        if let Some(err) = state.booking_errors.get(booking_id) {
            return Err(err.clone());
        }
        state
            .bookings
            .get(booking_id)
            .cloned()
            .ok_or_else(|| BackendError::NotFound(format!("Booking {booking_id} not found")))
    }

    async fn get_session_for_booking(
        &self,
        booking_id: &str,
    ) -> Result<Option<ChatSession>, BackendError> {
        self.record("get_session_for_booking");
        Ok(self.state.lock().unwrap().sessions.get(booking_id).cloned())
    }

    async fn create_session_for_booking(&self, booking_id: &str) -> Result<ChatSession, BackendError> {
        self.record("create_session_for_booking");
        let gate = self.create_gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let mut state = self.state.lock().unwrap();
        Ok(create_session(&mut state, booking_id))
    }

    async fn generate_video_room(&self, session_id: &str) -> Result<String, BackendError> {
        self.record("generate_video_room");
        Ok(format!("https://rooms.example.com/{session_id}"))
    }

    async fn start_session(&self, session_id: &str) -> Result<ChatSession, BackendError> {
        self.record("start_session");
        let mut state = self.state.lock().unwrap();
        Ok(set_status(&mut state, session_id, SessionStatus::InProgress))
    }

    async fn end_session(&self, session_id: &str) -> Result<ChatSession, BackendError> {
        self.record("end_session");
        let mut state = self.state.lock().unwrap();
        Ok(set_status(&mut state, session_id, SessionStatus::Completed))
    }

    async fn get_messages(&self, session_id: &str) -> Result<Vec<Message>, BackendError> {
        self.record("get_messages");
        let state = self.state.lock().unwrap();
        if let Some(err) = state.message_errors.get(session_id) {
            return Err(err.clone());
        }
        Ok(state.messages.get(session_id).cloned().unwrap_or_default())
    }

    async fn send_message(
        &self,
        session_id: &str,
        message: &OutgoingMessage,
    ) -> Result<Message, BackendError> {
        self.record("send_message");
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.send_error.take() {
            return Err(err);
        }
        state.next_id += 1;
        let stored = Message {
            id: format!("m-{}", state.next_id),
            session_id: session_id.to_string(),
            sender_id: message.sender_id.clone().unwrap_or_else(|| state.caller.clone()),
            receiver_id: message.receiver_id.clone(),
            content: message.content.clone(),
            message_type: Some(message.message_type),
            attachments: message.attachments.clone(),
            created_at: Utc::now(),
            is_read: false,
        };
        state.sent.push((session_id.to_string(), message.clone()));
        state
            .messages
            .entry(session_id.to_string())
            .or_default()
            .push(stored.clone());
        Ok(stored)
    }

    async fn mark_as_read(&self, session_id: &str) -> Result<(), BackendError> {
        self.record("mark_as_read");
        let mut state = self.state.lock().unwrap();
        if let Some(err) = state.mark_read_error.clone() {
            return Err(err);
        }
        let caller = state.caller.clone();
        if let Some(messages) = state.messages.get_mut(session_id) {
            for m in messages.iter_mut().filter(|m| m.sender_id != caller) {
                m.is_read = true;
            }
        }
        Ok(())
    }

    async fn upload_file(&self, session_id: &str, upload: &FileUpload) -> Result<String, BackendError> {
        self.record("upload_file");
        let mut state = self.state.lock().unwrap();
        state.uploads.push((session_id.to_string(), upload.clone()));
        Ok(format!("/uploads/{}", upload.file_name))
    }

    async fn unread_notification_count(&self) -> Result<u32, BackendError> {
        self.record("unread_notification_count");
        let state = self.state.lock().unwrap();
        match &state.notification_error {
            Some(err) => Err(err.clone()),
            None => Ok(state.notification_count),
        }
    }
}

pub(crate) fn booking_for(id: &str, client: &str, consultant: &str) -> Booking {
    Booking {
        id: id.to_string(),
        client: BookingParty {
            user_id: client.to_string(),
            name: None,
        },
        consultant: BookingParty {
            user_id: consultant.to_string(),
            name: None,
        },
        service: None,
        status: BookingStatus::Confirmed,
    }
}

pub(crate) fn conversation(
    id: &str,
    session_id: Option<&str>,
    is_direct: bool,
    client: &str,
    consultant: &str,
) -> Conversation {
    Conversation {
        id: id.to_string(),
        session_id: session_id.map(str::to_string),
        is_direct,
        client_id: Some(client.to_string()),
        consultant_user_id: Some(consultant.to_string()),
        name: format!("{client} / {consultant}"),
        status: None,
        last_message: None,
        last_message_time: None,
        unread_count: 0,
        booking_id: None,
    }
}

pub(crate) fn message(id: &str, session_id: &str, sender: &str, content: &str) -> Message {
    Message {
        id: id.to_string(),
        session_id: session_id.to_string(),
        sender_id: sender.to_string(),
        receiver_id: None,
        content: content.to_string(),
        message_type: None,
        attachments: Vec::new(),
        created_at: Utc::now(),
        is_read: false,
    }
}
