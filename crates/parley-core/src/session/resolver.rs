//! Session identity resolver.
//!
//! Turns a route identity (booking id or session id) into a typed session
//! reference, in priority order:
//!
//! 1. explicit direct-session routes are taken at face value
//! 2. a conversation-list entry referencing the identity makes it a direct session
//! 3. otherwise the identity is fetched as a booking (ownership checked)
//! 4. a non-404 booking failure falls back to probing it as a direct session
//!
//! The known-missing short circuit lives in the coordinator, which runs before
//! the resolver is ever invoked. The resolver performs reads only; redirect
//! decisions are reported to the caller.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use parley_types::booking::Booking;
use parley_types::chat::{ChatSession, Message, SessionKind, SessionStatus};
use parley_types::error::{BackendError, ChatError, FailureKind};
use parley_types::route::RouteParam;
use parley_types::viewer::Viewer;

use crate::backend::ChatBackend;
use crate::directory::ConversationDirectory;

/// Why the view must navigate away from an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RedirectReason {
    NotFound,
    Forbidden,
}

/// A concrete, typed session reference for a route identity.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedSession {
    /// The route identity this was resolved from.
    pub identity: String,
    pub kind: SessionKind,
    /// `None` for a booking whose consultation has not started yet.
    pub session: Option<ChatSession>,
    /// Present for booking-bound sessions.
    pub booking: Option<Booking>,
}

impl ResolvedSession {
    pub fn session_id(&self) -> Option<&str> {
        self.session.as_ref().map(|s| s.id.as_str())
    }

    /// Whether sends are disabled because the session reached a terminal status.
    pub fn is_closed(&self) -> bool {
        self.session.as_ref().is_some_and(ChatSession::is_terminal)
    }
}

/// Outcome of resolving one identity.
#[derive(Debug, Clone, PartialEq)]
pub enum Resolution {
    Resolved(ResolvedSession),
    Redirect(RedirectReason),
}

/// Resolves route identities against the backend and the conversation directory.
pub struct SessionResolver<B> {
    backend: Arc<B>,
    directory: ConversationDirectory<B>,
}

impl<B: ChatBackend + 'static> SessionResolver<B> {
    pub fn new(backend: Arc<B>, directory: ConversationDirectory<B>) -> Self {
        Self { backend, directory }
    }

    /// Resolve `route` for `viewer`.
    ///
    /// `Err` is only returned for transient failures; not-found and forbidden
    /// outcomes are reported as [`Resolution::Redirect`].
    pub async fn resolve(&self, route: &RouteParam, viewer: &Viewer) -> Result<Resolution, ChatError> {
        let identity = route.identity.as_str();

        if route.shape.is_explicit_direct() {
            debug!(identity, "Route marks identity as a direct session");
            let session = self
                .directory
                .find_session(identity)
                .map(|c| c.to_direct_session())
                .unwrap_or_else(|| bare_direct_session(identity, Vec::new()));
            return Ok(Resolution::Resolved(direct(identity, session)));
        }

        if let Some(conversation) = self.directory.lookup(identity).await {
            debug!(identity, conversation_id = %conversation.id, "Identity matches a direct conversation");
            return Ok(Resolution::Resolved(direct(
                identity,
                conversation.to_direct_session(),
            )));
        }

        match self.backend.get_booking(identity).await {
            Ok(booking) => self.resolve_booking(identity, booking, viewer).await,
            Err(err) if err.classify() == FailureKind::NotFound => {
                info!(identity, "Booking not found");
                Ok(Resolution::Redirect(RedirectReason::NotFound))
            }
            Err(err) => {
                // Also taken when the booking endpoint fails transiently, which
                // can misclassify a booking id as a direct session.
                warn!(identity, error = %err, "Booking lookup failed, probing as direct session");
                self.probe_direct(identity).await
            }
        }
    }

    async fn resolve_booking(
        &self,
        identity: &str,
        booking: Booking,
        viewer: &Viewer,
    ) -> Result<Resolution, ChatError> {
        if !booking.is_accessible_by(viewer) {
            warn!(identity, viewer_id = %viewer.id, role = %viewer.role, "Booking belongs to another user");
            return Ok(Resolution::Redirect(RedirectReason::Forbidden));
        }

        let session = match self.backend.get_session_for_booking(&booking.id).await {
            Ok(session) => session,
            Err(err) if err.classify() == FailureKind::NotFound => None,
            Err(err) => return Err(ChatError::from_backend(identity, &err)),
        };

        let session = session.map(|mut s| {
            s.kind = SessionKind::BookingBound;
            s.booking_id.get_or_insert_with(|| booking.id.clone());
            if s.participants.is_empty() {
                s.participants = booking.participants();
            }
            s
        });

        info!(
            identity,
            has_session = session.is_some(),
            "Resolved booking-bound chat"
        );
        Ok(Resolution::Resolved(ResolvedSession {
            identity: identity.to_string(),
            kind: SessionKind::BookingBound,
            session,
            booking: Some(booking),
        }))
    }

    /// Treat `identity` as a direct session id and confirm it by fetching its messages.
    async fn probe_direct(&self, identity: &str) -> Result<Resolution, ChatError> {
        match self.backend.get_messages(identity).await {
            Ok(messages) => {
                info!(identity, messages = messages.len(), "Message probe confirmed direct session");
                let session = bare_direct_session(identity, participants_from(&messages));
                Ok(Resolution::Resolved(direct(identity, session)))
            }
            Err(err) => probe_failure(identity, &err),
        }
    }
}

fn probe_failure(identity: &str, err: &BackendError) -> Result<Resolution, ChatError> {
    match err.classify() {
        FailureKind::NotFound => Ok(Resolution::Redirect(RedirectReason::NotFound)),
        FailureKind::Forbidden => Ok(Resolution::Redirect(RedirectReason::Forbidden)),
        FailureKind::Transient => Err(ChatError::from_backend(identity, err)),
    }
}

fn direct(identity: &str, session: ChatSession) -> ResolvedSession {
    ResolvedSession {
        identity: identity.to_string(),
        kind: SessionKind::DirectMessage,
        session: Some(session),
        booking: None,
    }
}

fn bare_direct_session(id: &str, participants: Vec<String>) -> ChatSession {
    ChatSession {
        id: id.to_string(),
        kind: SessionKind::DirectMessage,
        status: SessionStatus::InProgress,
        participants,
        booking_id: None,
        room_url: None,
    }
}

/// Participant ids seen on a message list, when there are at most two of them.
fn participants_from(messages: &[Message]) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    let seen = messages
        .iter()
        .flat_map(|m| std::iter::once(&m.sender_id).chain(m.receiver_id.as_ref()));
    for id in seen {
        if !id.is_empty() && !ids.contains(id) {
            ids.push(id.clone());
        }
    }
    if ids.len() <= 2 { ids } else { Vec::new() }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MockBackend, booking_for, conversation, message};
    use parley_types::viewer::ViewerRole;

    fn resolver(backend: &Arc<MockBackend>) -> SessionResolver<MockBackend> {
        SessionResolver::new(backend.clone(), ConversationDirectory::new(backend.clone()))
    }

    fn client(id: &str) -> Viewer {
        Viewer::new(id, ViewerRole::Client)
    }

    #[tokio::test]
    async fn test_explicit_direct_route_skips_network() {
        let backend = Arc::new(MockBackend::new());
        let result = resolver(&backend)
            .resolve(&RouteParam::direct("s-1"), &client("u1"))
            .await
            .unwrap();

        let Resolution::Resolved(resolved) = result else {
            panic!("expected resolved");
        };
        assert_eq!(resolved.kind, SessionKind::DirectMessage);
        assert_eq!(resolved.session_id(), Some("s-1"));
        assert_eq!(backend.total_calls(), 0);
    }

    #[tokio::test]
    async fn test_conversation_match_avoids_booking_lookup() {
        let backend = Arc::new(MockBackend::new());
        // A deleted booking shares its id with a live session reference.
        backend.add_conversation(conversation("c1", Some("shared-id"), true, "u1", "u2"));
        backend.fail_booking("shared-id", BackendError::NotFound("booking".into()));

        let result = resolver(&backend)
            .resolve(&RouteParam::ambiguous("shared-id"), &client("u1"))
            .await
            .unwrap();

        let Resolution::Resolved(resolved) = result else {
            panic!("expected resolved");
        };
        assert_eq!(resolved.kind, SessionKind::DirectMessage);
        assert_eq!(resolved.session.unwrap().participants, vec!["u1", "u2"]);
        assert_eq!(backend.calls("get_booking"), 0);
    }

    #[tokio::test]
    async fn test_owned_booking_without_session() {
        let backend = Arc::new(MockBackend::new());
        backend.add_booking(booking_for("abc123", "client-a", "consultant-c"));

        let result = resolver(&backend)
            .resolve(&RouteParam::ambiguous("abc123"), &client("client-a"))
            .await
            .unwrap();

        let Resolution::Resolved(resolved) = result else {
            panic!("expected resolved");
        };
        assert_eq!(resolved.kind, SessionKind::BookingBound);
        assert!(resolved.session.is_none());
        assert_eq!(resolved.booking.unwrap().id, "abc123");
        assert_eq!(backend.calls("get_session_for_booking"), 1);
    }

    #[tokio::test]
    async fn test_existing_booking_session_gets_participants() {
        let backend = Arc::new(MockBackend::new());
        backend.add_booking(booking_for("b1", "client-a", "consultant-c"));
        backend.create_session_for("b1");

        let Resolution::Resolved(resolved) = resolver(&backend)
            .resolve(&RouteParam::ambiguous("b1"), &Viewer::new("consultant-c", ViewerRole::Consultant))
            .await
            .unwrap()
        else {
            panic!("expected resolved");
        };
        let session = resolved.session.unwrap();
        assert_eq!(session.kind, SessionKind::BookingBound);
        assert_eq!(session.booking_id.as_deref(), Some("b1"));
        assert_eq!(session.participants, vec!["client-a", "consultant-c"]);
    }

    #[tokio::test]
    async fn test_foreign_booking_is_forbidden() {
        let backend = Arc::new(MockBackend::new());
        backend.add_booking(booking_for("that-id", "client-b", "consultant-c"));

        let result = resolver(&backend)
            .resolve(&RouteParam::ambiguous("that-id"), &client("client-a"))
            .await
            .unwrap();
        assert_eq!(result, Resolution::Redirect(RedirectReason::Forbidden));
        assert_eq!(backend.calls("get_session_for_booking"), 0);
    }

    #[tokio::test]
    async fn test_admin_bypasses_ownership() {
        let backend = Arc::new(MockBackend::new());
        backend.add_booking(booking_for("b1", "client-b", "consultant-c"));

        let result = resolver(&backend)
            .resolve(&RouteParam::ambiguous("b1"), &Viewer::new("admin", ViewerRole::Admin))
            .await
            .unwrap();
        assert!(matches!(result, Resolution::Resolved(_)));
    }

    #[tokio::test]
    async fn test_missing_booking_redirects_not_found() {
        let backend = Arc::new(MockBackend::new());
        let result = resolver(&backend)
            .resolve(&RouteParam::ambiguous("deleted-1"), &client("u1"))
            .await
            .unwrap();
        assert_eq!(result, Resolution::Redirect(RedirectReason::NotFound));
        assert_eq!(backend.calls("get_messages"), 0);
    }

    #[tokio::test]
    async fn test_booking_server_error_falls_back_to_message_probe() {
        let backend = Arc::new(MockBackend::new());
        backend.fail_booking(
            "s-77",
            BackendError::Status {
                status: 500,
                message: "boom".into(),
            },
        );
        backend.add_message(message("m1", "s-77", "u1", "hi"));

        let Resolution::Resolved(resolved) = resolver(&backend)
            .resolve(&RouteParam::ambiguous("s-77"), &client("u1"))
            .await
            .unwrap()
        else {
            panic!("expected resolved");
        };
        assert_eq!(resolved.kind, SessionKind::DirectMessage);
        assert_eq!(resolved.session_id(), Some("s-77"));
        assert_eq!(backend.calls("get_messages"), 1);
    }

    #[tokio::test]
    async fn test_probe_forbidden_redirects() {
        let backend = Arc::new(MockBackend::new());
        backend.fail_booking("s-1", BackendError::Transport("reset".into()));
        backend.fail_messages("s-1", BackendError::Forbidden("not a participant".into()));

        let result = resolver(&backend)
            .resolve(&RouteParam::ambiguous("s-1"), &client("u1"))
            .await
            .unwrap();
        assert_eq!(result, Resolution::Redirect(RedirectReason::Forbidden));
    }

    #[tokio::test]
    async fn test_probe_transient_is_error() {
        let backend = Arc::new(MockBackend::new());
        backend.fail_booking("s-1", BackendError::Transport("reset".into()));
        backend.fail_messages("s-1", BackendError::Transport("reset".into()));

        let err = resolver(&backend)
            .resolve(&RouteParam::ambiguous("s-1"), &client("u1"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), Some(FailureKind::Transient));
    }

    #[test]
    fn test_participants_from_messages() {
        let mut m1 = message("m1", "s", "u1", "a");
        m1.receiver_id = Some("u2".into());
        let m2 = message("m2", "s", "u2", "b");
        assert_eq!(participants_from(&[m1.clone(), m2]), vec!["u1", "u2"]);

        let m3 = message("m3", "s", "u3", "c");
        assert!(participants_from(&[m1, m3]).is_empty());
    }
}
