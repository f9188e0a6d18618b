use thiserror::Error;

/// Three-way classification every backend failure is reduced to before it
/// reaches the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    /// Booking or session absent. Terminal and memoized per identity.
    NotFound,
    /// Caller may not see this booking/session. Terminal, not memoized.
    Forbidden,
    /// Network or server failure. Retryable.
    Transient,
}

/// Errors raised by the backend collaborator.
#[derive(Debug, Clone, Error)]
pub enum BackendError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("access denied: {0}")]
    Forbidden(String),

    #[error("unauthorized")]
    Unauthorized,

    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("deserialization error: {0}")]
    Deserialization(String),
}

const NOT_FOUND_MARKERS: &[&str] = &["not found", "does not exist", "no longer exists"];
const FORBIDDEN_MARKERS: &[&str] = &[
    "access denied",
    "forbidden",
    "not authorized",
    "not allowed",
    "permission",
];

impl BackendError {
    /// Reduce this error to the three-way classification.
    ///
    /// Status codes win; otherwise the error message is inspected, since some
    /// backend endpoints report missing or forbidden resources with a generic
    /// status and a descriptive body.
    pub fn classify(&self) -> FailureKind {
        match self {
            BackendError::NotFound(_) => FailureKind::NotFound,
            BackendError::Forbidden(_) => FailureKind::Forbidden,
            BackendError::Status { status: 404, .. } => FailureKind::NotFound,
            BackendError::Status { status: 403, .. } => FailureKind::Forbidden,
            BackendError::Status { message, .. } => classify_message(message),
            BackendError::Unauthorized
            | BackendError::Transport(_)
            | BackendError::Deserialization(_) => FailureKind::Transient,
        }
    }
}

fn classify_message(message: &str) -> FailureKind {
    let lower = message.to_lowercase();
    if NOT_FOUND_MARKERS.iter().any(|m| lower.contains(m)) {
        FailureKind::NotFound
    } else if FORBIDDEN_MARKERS.iter().any(|m| lower.contains(m)) {
        FailureKind::Forbidden
    } else {
        FailureKind::Transient
    }
}

/// Errors surfaced by session resolution and the chat view.
#[derive(Debug, Clone, Error)]
pub enum ChatError {
    #[error("'{identity}' was not found")]
    NotFound { identity: String },

    #[error("access denied: {0}")]
    Forbidden(String),

    #[error("temporarily unavailable: {0}")]
    Transient(String),

    #[error("'{requested}' rejected while '{in_flight}' is still resolving")]
    Busy { requested: String, in_flight: String },

    #[error("no session has been resolved for this view")]
    NoSession,

    #[error("operation requires a booking-bound session")]
    NotBookingBound,
}

impl ChatError {
    /// Build a chat error for `identity` from a backend failure.
    pub fn from_backend(identity: &str, err: &BackendError) -> Self {
        match err.classify() {
            FailureKind::NotFound => ChatError::NotFound {
                identity: identity.to_string(),
            },
            FailureKind::Forbidden => ChatError::Forbidden(err.to_string()),
            FailureKind::Transient => ChatError::Transient(err.to_string()),
        }
    }

    pub fn kind(&self) -> Option<FailureKind> {
        match self {
            ChatError::NotFound { .. } => Some(FailureKind::NotFound),
            ChatError::Forbidden(_) => Some(FailureKind::Forbidden),
            ChatError::Transient(_) => Some(FailureKind::Transient),
            _ => None,
        }
    }
}

/// Errors from the compose/send path. The draft is left untouched on every variant.
#[derive(Debug, Clone, Error)]
pub enum SendError {
    #[error("nothing to send")]
    Empty,

    #[error("a send is already in progress")]
    InProgress,

    #[error("session is closed")]
    SessionClosed,

    #[error("no session to send to")]
    NoSession,

    #[error("sending on behalf of another user is not permitted for this role")]
    NotPermitted,

    #[error("send failed: {0}")]
    Backend(#[from] BackendError),

    #[error("recording failed: {0}")]
    Recording(#[from] RecordingError),
}

/// Errors from the external recording collaborator.
#[derive(Debug, Clone, Error)]
pub enum RecordingError {
    #[error("no recording in progress")]
    NotRecording,

    #[error("recorder unavailable: {0}")]
    Unavailable(String),
}
