//! Span attribute names for chat operations.
//!
//! Used as field names in `tracing::info_span!` so exported traces carry the
//! same keys regardless of which command produced them.
//!
//! Span naming convention: `"chat.{operation}"` (e.g., `"chat.open"`).

/// Route identity being opened (booking id or session id).
pub const CHAT_IDENTITY: &str = "chat.identity";

/// Resolved session id, when one exists.
pub const CHAT_SESSION_ID: &str = "chat.session.id";

/// `booking_bound` or `direct_message`.
pub const CHAT_SESSION_KIND: &str = "chat.session.kind";

/// Viewer role (`client`, `consultant`, `admin`).
pub const CHAT_VIEWER_ROLE: &str = "chat.viewer.role";

/// Number of attachments on an outgoing message.
pub const CHAT_ATTACHMENT_COUNT: &str = "chat.message.attachments";

// --- Operation names ---

pub const OP_OPEN: &str = "chat.open";

pub const OP_SEND: &str = "chat.send";

pub const OP_VIDEO_CALL: &str = "chat.video_call";

pub const OP_END_SESSION: &str = "chat.end_session";

pub const OP_LIST_CONVERSATIONS: &str = "chat.list_conversations";
