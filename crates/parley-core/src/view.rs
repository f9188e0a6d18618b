//! Chat view orchestration.
//!
//! `ChatView` is the one object a client, consultant or admin screen talks
//! to. It runs route identities through the [`FetchCoordinator`] and the
//! [`SessionResolver`], owns the message feed for the resolved session, and
//! implements the send path (draft, lazy booking session creation,
//! attachments, recordings, video call invitations).
//!
//! State shared with the feed watcher task lives behind a std `Mutex` that
//! is never held across an `.await`.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use parley_types::chat::{ChatSession, Message, MessageType, SessionKind};
use parley_types::config::ChatConfig;
use parley_types::error::{BackendError, ChatError, FailureKind, SendError};
use parley_types::route::RouteParam;
use parley_types::viewer::Viewer;

use crate::attachment::{RenderedMessage, normalize_attachment_url, render_message};
use crate::backend::{ChatBackend, FileUpload};
use crate::directory::ConversationDirectory;
use crate::event::{EventBus, ViewEvent};
use crate::feed::{ComposeDraft, FeedHandle, FeedSnapshot, MessageFeed, compose_outgoing};
use crate::recorder::{MediaRecorder, NoRecorder, RecordingKind};
use crate::role::{Redirect, RoleProfile};
use crate::session::{
    FetchCoordinator, FetchEvent, RedirectReason, Resolution, ResolvedSession, SessionResolver,
    Transition,
};

/// Result of opening a route.
#[derive(Debug, Clone, PartialEq)]
pub enum ViewOutcome {
    Resolved(ResolvedSession),
    Redirect(Redirect),
    /// The same identity is already being resolved by another caller.
    Pending,
    /// The route changed while this call was resolving; the newer route was
    /// resolved in its place and reported through events.
    Superseded,
}

struct ViewState {
    coordinator: FetchCoordinator,
    route: Option<RouteParam>,
    feed: Option<FeedHandle>,
    watcher: Option<JoinHandle<()>>,
    draft: ComposeDraft,
    sending: bool,
    last_error: Option<String>,
}

impl ViewState {
    fn new() -> Self {
        Self {
            coordinator: FetchCoordinator::new(),
            route: None,
            feed: None,
            watcher: None,
            draft: ComposeDraft::default(),
            sending: false,
            last_error: None,
        }
    }

    fn stop_feed(&mut self) {
        if let Some(feed) = self.feed.take() {
            feed.unsubscribe();
        }
        if let Some(watcher) = self.watcher.take() {
            watcher.abort();
        }
    }

    /// Swap in a refreshed session if `updated` still belongs to the active identity.
    fn replace_resolved(&mut self, updated: &ResolvedSession) -> bool {
        self.coordinator
            .resolved()
            .is_some_and(|current| current.identity == updated.identity)
            && self.coordinator.update_resolved(updated.clone())
    }
}

fn lock_state(state: &Mutex<ViewState>) -> MutexGuard<'_, ViewState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

fn failure_kind(reason: RedirectReason) -> FailureKind {
    match reason {
        RedirectReason::NotFound => FailureKind::NotFound,
        RedirectReason::Forbidden => FailureKind::Forbidden,
    }
}

fn publish_redirect(
    events: &EventBus,
    profile: &RoleProfile,
    reason: RedirectReason,
    navigate: bool,
) -> Redirect {
    let redirect = profile.redirect(reason, navigate);
    if navigate {
        info!(?reason, target = %redirect.target, "Redirecting away from chat");
        events.publish(ViewEvent::Redirect(redirect.clone()));
    }
    redirect
}

/// A single open chat for one viewer.
pub struct ChatView<B, R = NoRecorder> {
    backend: Arc<B>,
    viewer: Viewer,
    profile: RoleProfile,
    base_url: String,
    directory: ConversationDirectory<B>,
    resolver: SessionResolver<B>,
    feed: MessageFeed<B>,
    recorder: R,
    events: EventBus,
    state: Arc<Mutex<ViewState>>,
    /// Serializes lazy booking session creation across send, upload and call.
    creating_session: tokio::sync::Mutex<()>,
}

impl<B: ChatBackend + 'static> ChatView<B, NoRecorder> {
    pub fn new(backend: Arc<B>, viewer: Viewer, config: &ChatConfig) -> Self {
        let directory = ConversationDirectory::new(backend.clone());
        Self::with_parts(backend, viewer, config, directory, NoRecorder)
    }
}

impl<B: ChatBackend + 'static, R: MediaRecorder> ChatView<B, R> {
    /// Build a view sharing an existing conversation directory.
    pub fn with_parts(
        backend: Arc<B>,
        viewer: Viewer,
        config: &ChatConfig,
        directory: ConversationDirectory<B>,
        recorder: R,
    ) -> Self {
        Self {
            resolver: SessionResolver::new(backend.clone(), directory.clone()),
            feed: MessageFeed::new(backend.clone(), viewer.id.clone(), config.message_poll_interval()),
            profile: RoleProfile::for_role(viewer.role),
            base_url: config.base_url.clone(),
            backend,
            viewer,
            directory,
            recorder,
            events: EventBus::default(),
            state: Arc::new(Mutex::new(ViewState::new())),
            creating_session: tokio::sync::Mutex::new(()),
        }
    }

    pub fn with_recorder<R2: MediaRecorder>(self, recorder: R2) -> ChatView<B, R2> {
        ChatView {
            backend: self.backend,
            viewer: self.viewer,
            profile: self.profile,
            base_url: self.base_url,
            directory: self.directory,
            resolver: self.resolver,
            feed: self.feed,
            recorder,
            events: self.events,
            state: self.state,
            creating_session: self.creating_session,
        }
    }

    fn lock(&self) -> MutexGuard<'_, ViewState> {
        lock_state(&self.state)
    }

    // --- Resolution ---

    /// Open `route`, resolving its identity at most once.
    ///
    /// Transient failures are returned as `Err(ChatError::Transient)` and
    /// may be retried by calling `open` again.
    pub async fn open(&self, route: &RouteParam) -> Result<ViewOutcome, ChatError> {
        let mut route = route.clone();
        let mut superseded = false;

        loop {
            match self.admit(&route) {
                Transition::Proceed => {}
                Transition::AlreadyFetching => return Ok(ViewOutcome::Pending),
                Transition::AlreadyResolved(session) => {
                    self.ensure_feed(&session);
                    return Ok(ViewOutcome::Resolved(session));
                }
                Transition::Rejected { in_flight } => {
                    debug!(requested = %route.identity, %in_flight, "Resolve rejected, another identity in flight");
                    return Err(ChatError::Busy {
                        requested: route.identity.clone(),
                        in_flight,
                    });
                }
                Transition::Redirect { reason, navigate } => {
                    let redirect = publish_redirect(&self.events, &self.profile, reason, navigate);
                    return Ok(ViewOutcome::Redirect(redirect));
                }
                _ => return Ok(ViewOutcome::Superseded),
            }

            let identity = route.identity.clone();
            let mut transient = None;
            let event = match self.resolver.resolve(&route, &self.viewer).await {
                Ok(Resolution::Resolved(session)) => FetchEvent::Succeeded { identity, session },
                Ok(Resolution::Redirect(reason)) => FetchEvent::Failed {
                    identity,
                    kind: failure_kind(reason),
                },
                Err(err) => {
                    warn!(identity = %identity, error = %err, "Session resolution failed");
                    let kind = err.kind().unwrap_or(FailureKind::Transient);
                    transient = Some(err);
                    FetchEvent::Failed { identity, kind }
                }
            };

            let transition = self.lock().coordinator.reduce(event);
            let outcome = match transition {
                Transition::Applied(session) => {
                    info!(
                        identity = %session.identity,
                        kind = %session.kind,
                        session_id = session.session_id().unwrap_or("-"),
                        "Chat resolved"
                    );
                    self.events.publish(ViewEvent::Resolved {
                        identity: session.identity.clone(),
                        kind: session.kind,
                        session_id: session.session_id().map(str::to_string),
                    });
                    self.ensure_feed(&session);
                    ViewOutcome::Resolved(session)
                }
                Transition::Redirect { reason, navigate } => {
                    ViewOutcome::Redirect(publish_redirect(&self.events, &self.profile, reason, navigate))
                }
                Transition::Retryable => {
                    let err = transient
                        .unwrap_or_else(|| ChatError::Transient(format!("'{}' could not be resolved", route.identity)));
                    self.lock().last_error = Some(err.to_string());
                    return Err(err);
                }
                Transition::Discarded => {
                    let active = self.lock().route.clone();
                    match active {
                        Some(next) => {
                            debug!(stale = %route.identity, active = %next.identity, "Discarded stale resolve, resolving active route");
                            superseded = true;
                            route = next;
                            continue;
                        }
                        None => ViewOutcome::Superseded,
                    }
                }
                _ => ViewOutcome::Superseded,
            };

            return Ok(if superseded {
                ViewOutcome::Superseded
            } else {
                outcome
            });
        }
    }

    /// Point the coordinator at `route` and ask to resolve it.
    fn admit(&self, route: &RouteParam) -> Transition {
        let mut st = self.lock();
        let navigated = st
            .coordinator
            .reduce(FetchEvent::Navigate(route.identity.clone()));
        if navigated == Transition::Reset {
            debug!(identity = %route.identity, "Chat route changed");
            st.stop_feed();
            st.route = Some(route.clone());
            st.draft.clear();
            st.last_error = None;
        }
        st.coordinator
            .reduce(FetchEvent::Request(route.identity.clone()))
    }

    /// Start the message feed for `session` unless it is already running.
    fn ensure_feed(&self, session: &ResolvedSession) {
        let Some(session_id) = session.session_id() else {
            return;
        };
        let mut st = self.lock();
        if st.coordinator.access_denied() {
            return;
        }
        if st.feed.as_ref().is_some_and(|f| f.session_id() == session_id) {
            return;
        }
        st.stop_feed();

        let handle = self.feed.start(session_id);
        st.watcher = Some(self.spawn_watcher(&handle, session.identity.clone()));
        st.feed = Some(handle);
    }

    /// Forward feed snapshots as events and turn terminal feed failures into redirects.
    fn spawn_watcher(&self, feed: &FeedHandle, identity: String) -> JoinHandle<()> {
        let mut rx = feed.subscribe();
        let state = self.state.clone();
        let events = self.events.clone();
        let profile = self.profile;

        tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                events.publish(ViewEvent::MessagesUpdated {
                    session_id: snapshot.session_id.clone(),
                    count: snapshot.messages.len(),
                    revision: snapshot.revision,
                });

                let Some(kind) = snapshot.failure() else {
                    continue;
                };
                let transition = {
                    let mut st = lock_state(&state);
                    if st.coordinator.active_identity() != Some(identity.as_str()) {
                        break;
                    }
                    st.coordinator.reduce(FetchEvent::FeedFailed { kind })
                };
                if let Transition::Redirect { reason, navigate } = transition {
                    warn!(identity = %identity, ?reason, "Message feed lost the session");
                    publish_redirect(&events, &profile, reason, navigate);
                }
                break;
            }
        })
    }

    // --- Compose and send ---

    pub fn draft(&self) -> ComposeDraft {
        self.lock().draft.clone()
    }

    pub fn set_draft_text(&self, text: impl Into<String>) {
        self.lock().draft.text = text.into();
    }

    /// Declared type for ambiguous attachment containers in the draft.
    pub fn set_type_hint(&self, hint: Option<MessageType>) {
        self.lock().draft.type_hint = hint;
    }

    /// Replace the draft text with `text` and send the draft.
    pub async fn send(&self, text: &str) -> Result<Message, SendError> {
        self.set_draft_text(text);
        self.submit(None).await
    }

    pub async fn send_draft(&self) -> Result<Message, SendError> {
        self.submit(None).await
    }

    /// Send the draft on behalf of `sender_id`. Admin only.
    pub async fn send_as(&self, sender_id: &str) -> Result<Message, SendError> {
        self.submit(Some(sender_id)).await
    }

    async fn submit(&self, send_as: Option<&str>) -> Result<Message, SendError> {
        let (draft, resolved) = {
            let mut st = self.lock();
            let resolved = st
                .coordinator
                .resolved()
                .cloned()
                .ok_or(SendError::NoSession)?;
            if st.sending {
                return Err(SendError::InProgress);
            }
            if st.draft.is_empty() {
                return Err(SendError::Empty);
            }
            if resolved.is_closed() {
                return Err(SendError::SessionClosed);
            }
            if send_as.is_some() && !self.profile.can_send_as {
                return Err(SendError::NotPermitted);
            }
            st.sending = true;
            (st.draft.clone(), resolved)
        };

        let result = self.deliver(&draft, &resolved, send_as).await;

        let mut st = self.lock();
        st.sending = false;
        match result {
            Ok(message) => {
                if st.draft == draft {
                    st.draft.clear();
                }
                st.last_error = None;
                if let Some(feed) = &st.feed {
                    feed.refresh();
                }
                info!(session_id = %message.session_id, message_id = %message.id, "Message sent");
                self.events.publish(ViewEvent::MessageSent {
                    session_id: message.session_id.clone(),
                    message_id: message.id.clone(),
                });
                Ok(message)
            }
            Err(err) => {
                warn!(identity = %resolved.identity, error = %err, "Send failed, draft kept");
                st.last_error = Some(err.to_string());
                self.events.publish(ViewEvent::SendFailed {
                    error: err.to_string(),
                });
                Err(err)
            }
        }
    }

    async fn deliver(
        &self,
        draft: &ComposeDraft,
        resolved: &ResolvedSession,
        send_as: Option<&str>,
    ) -> Result<Message, SendError> {
        let session = self.session_for_write(resolved).await?;
        let outgoing = compose_outgoing(draft, &session, &self.viewer, send_as)?;
        Ok(self.backend.send_message(&session.id, &outgoing).await?)
    }

    /// The session to write into, creating it for a booking that has none yet.
    async fn session_for_write(&self, resolved: &ResolvedSession) -> Result<ChatSession, BackendError> {
        if let Some(session) = &resolved.session {
            return Ok(session.clone());
        }

        let _creating = self.creating_session.lock().await;
        // Another write may have created the session while this one waited.
        let created = self
            .lock()
            .coordinator
            .resolved()
            .filter(|current| current.identity == resolved.identity)
            .and_then(|current| current.session.clone());
        if let Some(session) = created {
            debug!(session_id = %session.id, "Reusing session created by a concurrent write");
            return Ok(session);
        }

        let booking_id = resolved
            .booking
            .as_ref()
            .map_or(resolved.identity.as_str(), |b| b.id.as_str());
        info!(booking_id, "Creating session for booking");
        let mut session = self.backend.create_session_for_booking(booking_id).await?;
        session.kind = SessionKind::BookingBound;
        session.booking_id.get_or_insert_with(|| booking_id.to_string());
        if session.participants.is_empty() {
            if let Some(booking) = &resolved.booking {
                session.participants = booking.participants();
            }
        }

        let updated = ResolvedSession {
            session: Some(session.clone()),
            ..resolved.clone()
        };
        let applied = self.lock().replace_resolved(&updated);
        if applied {
            self.events.publish(ViewEvent::SessionCreated {
                booking_id: booking_id.to_string(),
                session_id: session.id.clone(),
            });
            self.ensure_feed(&updated);
        }
        Ok(session)
    }

    fn writable_session(&self) -> Result<ResolvedSession, SendError> {
        let resolved = self
            .lock()
            .coordinator
            .resolved()
            .cloned()
            .ok_or(SendError::NoSession)?;
        if resolved.is_closed() {
            return Err(SendError::SessionClosed);
        }
        Ok(resolved)
    }

    /// Upload `upload` and add its normalized URL to the draft.
    pub async fn attach_file(&self, upload: FileUpload) -> Result<String, SendError> {
        let resolved = self.writable_session()?;
        let session = self.session_for_write(&resolved).await?;
        let stored = self.backend.upload_file(&session.id, &upload).await?;
        let url = normalize_attachment_url(&self.base_url, &stored).unwrap_or(stored);
        info!(session_id = %session.id, file = %upload.file_name, %url, "Attachment uploaded");
        self.lock().draft.attachments.push(url.clone());
        Ok(url)
    }

    pub async fn start_recording(&self, kind: RecordingKind) -> Result<(), SendError> {
        self.recorder.start(kind).await?;
        debug!(?kind, "Recording started");
        Ok(())
    }

    /// Stop recording, upload the clip and attach it to the draft.
    pub async fn stop_recording(&self) -> Result<String, SendError> {
        let clip = self.recorder.stop().await?;
        let kind = clip.kind;
        let url = self
            .attach_file(FileUpload {
                file_name: clip.file_name,
                mime_type: Some(clip.mime_type),
                bytes: clip.bytes,
            })
            .await?;
        self.set_type_hint(Some(kind.message_type()));
        Ok(url)
    }

    pub fn is_recording(&self) -> bool {
        self.recorder.is_recording()
    }

    /// Generate a video room and send its URL as a call invitation.
    ///
    /// The compose draft is left untouched.
    pub async fn start_video_call(&self) -> Result<Message, SendError> {
        let resolved = self.writable_session()?;
        let session = self.session_for_write(&resolved).await?;
        let room_url = self.backend.generate_video_room(&session.id).await?;

        let invitation = ComposeDraft {
            text: room_url.clone(),
            attachments: Vec::new(),
            type_hint: Some(MessageType::VideoCallInvitation),
        };
        let outgoing = compose_outgoing(&invitation, &session, &self.viewer, None)?;
        let message = self.backend.send_message(&session.id, &outgoing).await?;
        info!(session_id = %session.id, %room_url, "Video call invitation sent");

        if let Some(feed) = &self.lock().feed {
            feed.refresh();
        }
        self.events.publish(ViewEvent::MessageSent {
            session_id: message.session_id.clone(),
            message_id: message.id.clone(),
        });
        Ok(message)
    }

    // --- Session lifecycle ---

    /// Move the booking session to `IN_PROGRESS`.
    pub async fn start_session(&self) -> Result<ChatSession, ChatError> {
        self.change_status(false).await
    }

    /// End the booking session. Sends are disabled afterwards.
    pub async fn end_session(&self) -> Result<ChatSession, ChatError> {
        self.change_status(true).await
    }

    async fn change_status(&self, end: bool) -> Result<ChatSession, ChatError> {
        let resolved = self
            .lock()
            .coordinator
            .resolved()
            .cloned()
            .ok_or(ChatError::NoSession)?;
        if resolved.kind != SessionKind::BookingBound {
            return Err(ChatError::NotBookingBound);
        }
        let current = resolved.session.clone().ok_or(ChatError::NoSession)?;

        let result = if end {
            self.backend.end_session(&current.id).await
        } else {
            self.backend.start_session(&current.id).await
        };
        let changed = result.map_err(|e| ChatError::from_backend(&current.id, &e))?;

        let mut session = current;
        session.status = changed.status;
        if changed.room_url.is_some() {
            session.room_url = changed.room_url;
        }
        let updated = ResolvedSession {
            session: Some(session.clone()),
            ..resolved
        };
        self.lock().replace_resolved(&updated);

        info!(session_id = %session.id, status = %session.status, "Session status changed");
        if end {
            self.events.publish(ViewEvent::SessionEnded {
                session_id: session.id.clone(),
            });
        }
        Ok(session)
    }

    // --- Accessors ---

    pub fn viewer(&self) -> &Viewer {
        &self.viewer
    }

    pub fn profile(&self) -> RoleProfile {
        self.profile
    }

    pub fn directory(&self) -> &ConversationDirectory<B> {
        &self.directory
    }

    pub fn resolved(&self) -> Option<ResolvedSession> {
        self.lock().coordinator.resolved().cloned()
    }

    pub fn access_denied(&self) -> bool {
        self.lock().coordinator.access_denied()
    }

    pub fn is_sending(&self) -> bool {
        self.lock().sending
    }

    pub fn last_error(&self) -> Option<String> {
        self.lock().last_error.clone()
    }

    pub fn feed_snapshot(&self) -> Option<FeedSnapshot> {
        self.lock().feed.as_ref().map(FeedHandle::snapshot)
    }

    pub fn subscribe_feed(&self) -> Option<watch::Receiver<FeedSnapshot>> {
        self.lock().feed.as_ref().map(FeedHandle::subscribe)
    }

    pub fn messages(&self) -> Vec<Message> {
        self.feed_snapshot().map(|s| s.messages).unwrap_or_default()
    }

    /// Messages with every attachment reclassified for rendering.
    pub fn rendered_messages(&self) -> Vec<(Message, RenderedMessage)> {
        self.messages()
            .into_iter()
            .map(|m| {
                let rendered = render_message(&self.base_url, &m);
                (m, rendered)
            })
            .collect()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ViewEvent> {
        self.events.subscribe()
    }

    /// Stop the feed. The view can be reopened afterwards.
    pub fn close(&self) {
        self.lock().stop_feed();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};

    use parley_types::chat::SessionStatus;
    use parley_types::error::RecordingError;
    use parley_types::viewer::ViewerRole;

    use crate::recorder::RecordedClip;
    use crate::testing::{MockBackend, booking_for, conversation};

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    fn view(backend: &Arc<MockBackend>, viewer: Viewer) -> ChatView<MockBackend> {
        ChatView::new(backend.clone(), viewer, &ChatConfig::default())
    }

    fn client(id: &str) -> Viewer {
        Viewer::new(id, ViewerRole::Client)
    }

    #[derive(Default)]
    struct FakeRecorder {
        recording: AtomicBool,
    }

    impl MediaRecorder for FakeRecorder {
        async fn start(&self, _kind: RecordingKind) -> Result<(), RecordingError> {
            self.recording.store(true, Ordering::SeqCst);
            Ok(())
        }

        async fn stop(&self) -> Result<RecordedClip, RecordingError> {
            if !self.recording.swap(false, Ordering::SeqCst) {
                return Err(RecordingError::NotRecording);
            }
            Ok(RecordedClip {
                kind: RecordingKind::Video,
                file_name: "clip.webm".to_string(),
                mime_type: "video/webm".to_string(),
                bytes: vec![1, 2, 3],
            })
        }

        fn is_recording(&self) -> bool {
            self.recording.load(Ordering::SeqCst)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_send_creates_booking_session() {
        let backend = Arc::new(MockBackend::new());
        backend.set_caller("client-a");
        backend.add_booking(booking_for("abc123", "client-a", "consultant-c"));
        let view = view(&backend, client("client-a"));

        let outcome = view.open(&RouteParam::ambiguous("abc123")).await.unwrap();
        let ViewOutcome::Resolved(resolved) = outcome else {
            panic!("expected resolved, got {outcome:?}");
        };
        assert_eq!(resolved.kind, SessionKind::BookingBound);
        assert!(resolved.session.is_none());
        settle().await;
        assert_eq!(backend.calls("get_messages"), 0);

        let message = view.send("hello").await.unwrap();
        assert_eq!(message.session_id, "sess-abc123");
        assert_eq!(backend.calls("create_session_for_booking"), 1);

        let sent = backend.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].0, "sess-abc123");
        assert_eq!(sent[0].1.content, "hello");
        assert!(sent[0].1.receiver_id.is_none());
        assert!(view.draft().is_empty());
        assert_eq!(view.resolved().unwrap().session_id(), Some("sess-abc123"));

        settle().await;
        assert_eq!(view.messages().len(), 1);

        view.send("again").await.unwrap();
        assert_eq!(backend.calls("create_session_for_booking"), 1);
    }

    #[tokio::test]
    async fn test_missing_identity_is_memoized() {
        let backend = Arc::new(MockBackend::new());
        let view = view(&backend, client("u1"));

        let first = view.open(&RouteParam::ambiguous("deleted-1")).await.unwrap();
        let ViewOutcome::Redirect(redirect) = first else {
            panic!("expected redirect");
        };
        assert_eq!(redirect.reason, RedirectReason::NotFound);
        assert_eq!(redirect.target, "/client/messages");
        assert!(redirect.message.is_none());
        assert!(redirect.navigate);

        let calls = backend.total_calls();
        let second = view.open(&RouteParam::ambiguous("deleted-1")).await.unwrap();
        assert!(matches!(second, ViewOutcome::Redirect(Redirect { navigate: false, .. })));
        assert_eq!(backend.total_calls(), calls);

        // Navigating away and back re-fires the redirect but still never fetches.
        view.open(&RouteParam::direct("s-5")).await.unwrap();
        let third = view.open(&RouteParam::ambiguous("deleted-1")).await.unwrap();
        assert!(matches!(third, ViewOutcome::Redirect(Redirect { navigate: true, .. })));
        assert_eq!(backend.calls("get_booking"), 1);
        assert_eq!(backend.calls("list_conversations"), 1);
    }

    #[tokio::test]
    async fn test_forbidden_is_not_memoized() {
        let backend = Arc::new(MockBackend::new());
        backend.add_booking(booking_for("theirs", "client-b", "consultant-c"));
        let view = view(&backend, client("client-a"));

        let outcome = view.open(&RouteParam::ambiguous("theirs")).await.unwrap();
        let ViewOutcome::Redirect(redirect) = outcome else {
            panic!("expected redirect");
        };
        assert_eq!(redirect.reason, RedirectReason::Forbidden);
        assert!(redirect.message.is_some());
        assert!(view.access_denied());

        let again = view.open(&RouteParam::ambiguous("theirs")).await.unwrap();
        assert!(matches!(again, ViewOutcome::Redirect(Redirect { navigate: false, .. })));
        assert_eq!(backend.calls("get_booking"), 1);

        view.open(&RouteParam::direct("s-1")).await.unwrap();
        assert!(!view.access_denied());

        let back = view.open(&RouteParam::ambiguous("theirs")).await.unwrap();
        assert!(matches!(back, ViewOutcome::Redirect(Redirect { navigate: true, .. })));
        assert_eq!(backend.calls("get_booking"), 2);
    }

    #[tokio::test]
    async fn test_single_flight_across_identities() {
        let backend = Arc::new(MockBackend::new());
        backend.add_booking(booking_for("a", "u1", "c1"));
        backend.add_booking(booking_for("b", "u1", "c1"));
        let gate = backend.hold_bookings();
        let view = Arc::new(view(&backend, client("u1")));

        let first = {
            let view = view.clone();
            tokio::spawn(async move { view.open(&RouteParam::ambiguous("a")).await })
        };
        settle().await;
        assert_eq!(backend.calls("get_booking"), 1);

        let dup = view.open(&RouteParam::ambiguous("a")).await.unwrap();
        assert_eq!(dup, ViewOutcome::Pending);

        let err = view.open(&RouteParam::ambiguous("b")).await.unwrap_err();
        assert!(matches!(err, ChatError::Busy { ref in_flight, .. } if in_flight == "a"));
        assert_eq!(backend.calls("get_booking"), 1);

        gate.notify_one();
        settle().await;
        gate.notify_one();

        let outcome = first.await.unwrap().unwrap();
        assert_eq!(outcome, ViewOutcome::Superseded);
        assert_eq!(view.resolved().unwrap().identity, "b");
        assert_eq!(backend.calls("get_booking"), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeat_open_reuses_resolution() {
        let backend = Arc::new(MockBackend::new());
        backend.add_booking(booking_for("b1", "u1", "c1"));
        backend.create_session_for("b1");
        let view = view(&backend, client("u1"));

        let first = view.open(&RouteParam::ambiguous("b1")).await.unwrap();
        settle().await;
        let second = view.open(&RouteParam::ambiguous("b1")).await.unwrap();
        settle().await;

        assert_eq!(first, second);
        assert_eq!(backend.calls("get_booking"), 1);
        assert_eq!(backend.calls("get_session_for_booking"), 1);
        assert_eq!(backend.calls("get_messages"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_resolution_can_be_retried() {
        let backend = Arc::new(MockBackend::new());
        backend.fail_booking("s-1", BackendError::Transport("reset".into()));
        backend.fail_messages("s-1", BackendError::Transport("reset".into()));
        let view = view(&backend, client("u1"));

        let err = view.open(&RouteParam::ambiguous("s-1")).await.unwrap_err();
        assert_eq!(err.kind(), Some(FailureKind::Transient));
        assert!(view.last_error().is_some());

        backend.clear_message_failure("s-1");
        let outcome = view.open(&RouteParam::ambiguous("s-1")).await.unwrap();
        assert!(matches!(outcome, ViewOutcome::Resolved(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_send_keeps_draft() {
        let backend = Arc::new(MockBackend::new());
        let view = view(&backend, client("u1"));
        view.open(&RouteParam::direct("s-1")).await.unwrap();

        backend.fail_next_send(BackendError::Transport("timeout".into()));
        let err = view.send("hello").await.unwrap_err();
        assert!(matches!(err, SendError::Backend(_)));
        assert_eq!(view.draft().text, "hello");
        assert!(!view.is_sending());
        assert!(view.last_error().is_some());

        view.send_draft().await.unwrap();
        assert!(view.draft().is_empty());
        assert!(view.last_error().is_none());
    }

    #[tokio::test]
    async fn test_send_without_session_or_text() {
        let backend = Arc::new(MockBackend::new());
        let view = view(&backend, client("u1"));
        assert!(matches!(view.send("hi").await, Err(SendError::NoSession)));

        view.open(&RouteParam::direct("s-1")).await.unwrap();
        assert!(matches!(view.send("   ").await, Err(SendError::Empty)));
        assert_eq!(backend.calls("send_message"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_closed_session_rejects_send() {
        let backend = Arc::new(MockBackend::new());
        backend.add_booking(booking_for("b1", "u1", "c1"));
        backend.create_session_for("b1");
        backend.set_session_status("b1", SessionStatus::Completed);
        let view = view(&backend, client("u1"));
        view.open(&RouteParam::ambiguous("b1")).await.unwrap();

        assert!(matches!(view.send("hi").await, Err(SendError::SessionClosed)));
        assert_eq!(view.draft().text, "hi");
        assert_eq!(backend.calls("send_message"), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_as_is_admin_only() {
        let backend = Arc::new(MockBackend::new());
        backend.add_conversation(conversation("c1", Some("s1"), false, "u1", "u2"));

        let client_view = view(&backend, client("u1"));
        client_view.open(&RouteParam::ambiguous("s1")).await.unwrap();
        client_view.set_draft_text("hi");
        assert!(matches!(client_view.send_as("u2").await, Err(SendError::NotPermitted)));

        let admin_view = view(&backend, Viewer::new("admin-1", ViewerRole::Admin));
        admin_view.open(&RouteParam::ambiguous("s1")).await.unwrap();
        admin_view.set_draft_text("on behalf");
        admin_view.send_as("u1").await.unwrap();

        let sent = backend.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].1.sender_id.as_deref(), Some("u1"));
        assert_eq!(sent[0].1.receiver_id.as_deref(), Some("u2"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_feed_forbidden_redirects_once() {
        let backend = Arc::new(MockBackend::new());
        backend.fail_messages("s-9", BackendError::Forbidden("not a participant".into()));
        let view = view(&backend, client("u1"));
        let mut events = view.subscribe();

        let outcome = view.open(&RouteParam::direct("s-9")).await.unwrap();
        assert!(matches!(outcome, ViewOutcome::Resolved(_)));

        let redirect = loop {
            if let ViewEvent::Redirect(r) = events.recv().await.unwrap() {
                break r;
            }
        };
        assert_eq!(redirect.reason, RedirectReason::Forbidden);
        assert!(redirect.message.is_some());
        assert!(view.access_denied());

        let again = view.open(&RouteParam::direct("s-9")).await.unwrap();
        assert!(matches!(again, ViewOutcome::Redirect(Redirect { navigate: false, .. })));
    }

    #[tokio::test(start_paused = true)]
    async fn test_video_call_sends_invitation() {
        let backend = Arc::new(MockBackend::new());
        backend.add_conversation(conversation("c1", Some("s1"), false, "u1", "u2"));
        let view = view(&backend, client("u1"));
        view.open(&RouteParam::ambiguous("s1")).await.unwrap();
        view.set_draft_text("unsent");

        view.start_video_call().await.unwrap();

        let sent = backend.sent();
        assert_eq!(sent[0].1.message_type, MessageType::VideoCallInvitation);
        assert_eq!(sent[0].1.content, "https://rooms.example.com/s1");
        assert_eq!(sent[0].1.receiver_id.as_deref(), Some("u2"));
        assert_eq!(view.draft().text, "unsent");
    }

    #[tokio::test(start_paused = true)]
    async fn test_recording_is_uploaded_and_sent_as_video() {
        let backend = Arc::new(MockBackend::new());
        let view = view(&backend, client("u1")).with_recorder(FakeRecorder::default());
        view.open(&RouteParam::direct("s1")).await.unwrap();

        assert!(matches!(
            view.stop_recording().await,
            Err(SendError::Recording(RecordingError::NotRecording))
        ));

        view.start_recording(RecordingKind::Video).await.unwrap();
        assert!(view.is_recording());
        let url = view.stop_recording().await.unwrap();
        assert_eq!(url, "http://localhost:5000/uploads/clip.webm");
        assert_eq!(view.draft().attachments, vec![url]);

        view.send_draft().await.unwrap();
        let sent = backend.sent();
        assert_eq!(sent[0].1.message_type, MessageType::Video);
        assert_eq!(backend.uploads()[0].0, "s1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_attach_file_on_unstarted_booking_creates_session() {
        let backend = Arc::new(MockBackend::new());
        backend.add_booking(booking_for("b1", "u1", "c1"));
        let view = view(&backend, client("u1"));
        view.open(&RouteParam::ambiguous("b1")).await.unwrap();

        let url = view
            .attach_file(FileUpload {
                file_name: "notes.pdf".to_string(),
                mime_type: Some("application/pdf".to_string()),
                bytes: vec![0; 4],
            })
            .await
            .unwrap();
        assert_eq!(url, "http://localhost:5000/uploads/notes.pdf");
        assert_eq!(backend.uploads()[0].0, "sess-b1");

        view.send_draft().await.unwrap();
        assert_eq!(backend.sent()[0].1.message_type, MessageType::File);
        assert_eq!(backend.calls("create_session_for_booking"), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_writes_create_booking_session_once() {
        let backend = Arc::new(MockBackend::new());
        backend.add_booking(booking_for("b1", "u1", "c1"));
        let view = view(&backend, client("u1"));
        view.open(&RouteParam::ambiguous("b1")).await.unwrap();

        let gate = backend.hold_session_creation();
        let release = async {
            settle().await;
            gate.notify_one();
        };
        let upload = FileUpload {
            file_name: "notes.pdf".to_string(),
            mime_type: Some("application/pdf".to_string()),
            bytes: vec![0; 4],
        };

        let (sent, attached, call, ()) = tokio::join!(
            view.send("hi"),
            view.attach_file(upload),
            view.start_video_call(),
            release
        );

        assert_eq!(backend.calls("create_session_for_booking"), 1);
        assert_eq!(sent.unwrap().session_id, "sess-b1");
        assert!(attached.is_ok());
        assert_eq!(call.unwrap().session_id, "sess-b1");
        assert_eq!(backend.uploads()[0].0, "sess-b1");
        assert_eq!(view.resolved().unwrap().session_id(), Some("sess-b1"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_end_session_disables_sending() {
        let backend = Arc::new(MockBackend::new());
        backend.add_booking(booking_for("b1", "u1", "c1"));
        backend.create_session_for("b1");
        let view = view(&backend, client("u1"));
        view.open(&RouteParam::ambiguous("b1")).await.unwrap();

        let ended = view.end_session().await.unwrap();
        assert!(ended.is_terminal());
        assert!(view.resolved().unwrap().is_closed());
        assert!(matches!(view.send("late").await, Err(SendError::SessionClosed)));
    }

    #[tokio::test]
    async fn test_end_session_requires_booking() {
        let backend = Arc::new(MockBackend::new());
        let view = view(&backend, client("u1"));
        assert!(matches!(view.end_session().await, Err(ChatError::NoSession)));

        view.open(&RouteParam::direct("s1")).await.unwrap();
        assert!(matches!(view.end_session().await, Err(ChatError::NotBookingBound)));
    }
}
