//! Attachment handling shared by the feed renderer and the compose path.

pub mod classify;
pub mod url;

pub use classify::{
    AttachmentKind, RenderedAttachment, RenderedMessage, classify, infer_message_type,
    render_message,
};
pub use url::{absolute_http_url, file_label, normalize_attachment_url};
