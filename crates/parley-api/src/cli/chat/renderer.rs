//! Terminal rendering of chat messages.
//!
//! Messages arrive already classified by the core (`RenderedMessage`); this
//! module only decides how each piece looks in a terminal.

use console::style;

use parley_core::attachment::{AttachmentKind, RenderedMessage};
use parley_types::chat::Message;

fn kind_label(kind: AttachmentKind) -> &'static str {
    match kind {
        AttachmentKind::Image => "image",
        AttachmentKind::Audio => "audio",
        AttachmentKind::Video => "video",
        AttachmentKind::File => "file",
    }
}

/// Format one message as terminal lines (no trailing newline).
pub fn format_message(message: &Message, rendered: &RenderedMessage, viewer_id: &str) -> String {
    let time = message
        .created_at
        .with_timezone(&chrono::Local)
        .format("%H:%M");
    let sender = if message.sender_id == viewer_id {
        style("You".to_string()).green().bold()
    } else {
        style(message.sender_id.clone()).cyan().bold()
    };

    let mut out = format!("  {} {}", style(time).dim(), sender);

    if let Some(call_url) = &rendered.call_url {
        out.push_str(&format!(
            " {} {}",
            style("started a video call:").yellow(),
            style(call_url).underlined()
        ));
        return out;
    }

    match &rendered.text {
        Some(text) => {
            let mut lines = text.lines();
            if let Some(first) = lines.next() {
                out.push_str(&format!(" {first}"));
            }
            for line in lines {
                out.push_str(&format!("\n        {line}"));
            }
        }
        None if rendered.attachments.is_empty() => {
            out.push_str(&format!(" {}", style("(empty message)").dim()));
        }
        None => {}
    }

    for attachment in &rendered.attachments {
        out.push_str(&format!(
            "\n        {} {}  {}",
            style(format!("[{}]", kind_label(attachment.kind))).magenta(),
            attachment.label,
            style(&attachment.url).dim()
        ));
    }

    out
}
