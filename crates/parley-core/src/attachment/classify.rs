//! Attachment classification.
//!
//! Every attachment is classified from its own URL, with the message's
//! declared type used only to break the `.webm`/`.ogg` tie between audio and
//! video containers. Classification is a pure function of its two inputs.

use serde::{Deserialize, Serialize};

use parley_types::chat::{Message, MessageType};

use super::url::{absolute_http_url, data_uri_mime, extension_of, file_label, normalize_attachment_url};

const IMAGE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "gif", "webp"];
const AUDIO_EXTENSIONS: &[&str] = &["mp3", "wav", "ogg", "m4a", "webm"];
const VIDEO_EXTENSIONS: &[&str] = &["mp4", "webm", "ogg"];

/// How an attachment is rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AttachmentKind {
    Image,
    /// Rendered through the custom progress-bar player.
    Audio,
    Video,
    /// Generic download, labeled by its trailing path segment.
    File,
}

impl AttachmentKind {
    /// Message type a message carrying only this kind of attachment should declare.
    pub fn message_type(self) -> MessageType {
        match self {
            AttachmentKind::Image => MessageType::Image,
            AttachmentKind::Audio => MessageType::Audio,
            AttachmentKind::Video => MessageType::Video,
            AttachmentKind::File => MessageType::File,
        }
    }
}

/// Classify one attachment.
///
/// Order: image, then audio, then video, then file. Extensions shared by
/// audio and video containers resolve to video only when `declared` says so.
pub fn classify(declared: Option<MessageType>, url: &str) -> AttachmentKind {
    if let Some(mime) = data_uri_mime(url) {
        return if mime.starts_with("image/") {
            AttachmentKind::Image
        } else if mime.starts_with("audio/") {
            AttachmentKind::Audio
        } else if mime.starts_with("video/") {
            AttachmentKind::Video
        } else {
            AttachmentKind::File
        };
    }

    let Some(ext) = extension_of(url) else {
        return AttachmentKind::File;
    };
    let ext = ext.as_str();

    if IMAGE_EXTENSIONS.contains(&ext) {
        return AttachmentKind::Image;
    }
    if AUDIO_EXTENSIONS.contains(&ext) {
        let ambiguous = VIDEO_EXTENSIONS.contains(&ext);
        return if ambiguous && declared == Some(MessageType::Video) {
            AttachmentKind::Video
        } else {
            AttachmentKind::Audio
        };
    }
    if VIDEO_EXTENSIONS.contains(&ext) {
        return AttachmentKind::Video;
    }
    AttachmentKind::File
}

/// Message type for an outgoing attachment set.
///
/// No attachments means `text`; otherwise the first attachment decides.
/// `hint` breaks the audio/video container tie the same way a declared type does.
pub fn infer_message_type(attachments: &[String], hint: Option<MessageType>) -> MessageType {
    match attachments.first() {
        None => MessageType::Text,
        Some(first) => classify(hint, first).message_type(),
    }
}

/// An attachment ready for rendering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedAttachment {
    pub kind: AttachmentKind,
    /// Fetchable URL (normalized against the backend origin).
    pub url: String,
    pub label: String,
}

/// How a whole message renders: text body plus classified attachments.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderedMessage {
    pub text: Option<String>,
    pub attachments: Vec<RenderedAttachment>,
    /// Room URL when the message is a video call invitation.
    pub call_url: Option<String>,
}

/// Reclassify a received message for rendering.
///
/// The declared `messageType` is never trusted on its own; it only breaks
/// container ties.
pub fn render_message(base_url: &str, message: &Message) -> RenderedMessage {
    if message.message_type == Some(MessageType::VideoCallInvitation) {
        // Invitations without a usable room link fall through to plain text.
        if let Some(room) = absolute_http_url(&message.content) {
            return RenderedMessage {
                text: None,
                attachments: Vec::new(),
                call_url: Some(room.into()),
            };
        }
    }

    let attachments = message
        .attachments
        .iter()
        .filter_map(|raw| {
            let url = normalize_attachment_url(base_url, raw)?;
            Some(RenderedAttachment {
                kind: classify(message.message_type, raw),
                label: file_label(raw),
                url,
            })
        })
        .collect();

    let text = Some(message.content.trim())
        .filter(|t| !t.is_empty())
        .map(str::to_string);

    RenderedMessage {
        text,
        attachments,
        call_url: None,
    }
}
