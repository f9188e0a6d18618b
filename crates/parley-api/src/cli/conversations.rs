//! Conversation list command.

use anyhow::{Context, Result};
use comfy_table::{Cell, Color, ContentArrangement, Table, presets};
use console::style;
use tracing::{Instrument, info_span};

use parley_observe::chat_attrs::{CHAT_VIEWER_ROLE, OP_LIST_CONVERSATIONS};
use parley_types::chat::{Conversation, SessionStatus};

use crate::state::AppState;

/// Longest last-message preview shown in the table.
const PREVIEW_CHARS: usize = 40;

/// List the viewer's conversations with status, unread count and a preview.
///
/// # Examples
///
/// ```bash
/// parley conversations --user u1
/// parley ls --user c7 --role consultant --json
/// ```
pub async fn list_conversations(state: &AppState, json: bool) -> Result<()> {
    let span = info_span!(OP_LIST_CONVERSATIONS, { CHAT_VIEWER_ROLE } = %state.viewer.role);

    let view = state.chat_view();
    let directory = view.directory();
    directory
        .refresh()
        .instrument(span)
        .await
        .context("Failed to load conversations")?;
    let conversations = directory.snapshot();

    if json {
        println!("{}", serde_json::to_string_pretty(&conversations)?);
        return Ok(());
    }

    if conversations.is_empty() {
        println!();
        println!("  {} No conversations yet.", style("i").blue().bold());
        println!();
        return Ok(());
    }

    let profile = view.profile();
    let mut table = Table::new();
    table.load_preset(presets::UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);

    table.set_header(vec![
        Cell::new("Name").fg(Color::White),
        Cell::new("Route").fg(Color::White),
        Cell::new("Status").fg(Color::White),
        Cell::new("Unread").fg(Color::White),
        Cell::new("Last message").fg(Color::White),
    ]);

    for conversation in &conversations {
        let route = match &conversation.booking_id {
            Some(booking_id) if !conversation.is_direct => profile.chat_route(booking_id),
            _ => profile.session_route(conversation.session_ref()),
        };

        let unread_cell = if conversation.unread_count > 0 {
            Cell::new(conversation.unread_count.to_string()).fg(Color::Yellow)
        } else {
            Cell::new("-").fg(Color::DarkGrey)
        };

        table.add_row(vec![
            Cell::new(display_name(conversation)).fg(Color::Cyan),
            Cell::new(route).fg(Color::DarkGrey),
            status_cell(conversation.status),
            unread_cell,
            Cell::new(preview(conversation)).fg(Color::White),
        ]);
    }

    println!();
    println!("{table}");
    println!();
    println!(
        "  {} conversation{}, {} unread",
        style(conversations.len()).bold(),
        if conversations.len() == 1 { "" } else { "s" },
        style(directory.total_unread()).bold()
    );
    println!();

    Ok(())
}

fn display_name(conversation: &Conversation) -> String {
    if conversation.name.trim().is_empty() {
        "(unnamed)".to_string()
    } else {
        conversation.name.clone()
    }
}

fn status_cell(status: Option<SessionStatus>) -> Cell {
    match status {
        Some(SessionStatus::InProgress) => Cell::new("in progress").fg(Color::Green),
        Some(SessionStatus::Scheduled) => Cell::new("scheduled").fg(Color::Blue),
        Some(status) => Cell::new(status.to_string().to_lowercase()).fg(Color::DarkGrey),
        None => Cell::new("-").fg(Color::DarkGrey),
    }
}

fn preview(conversation: &Conversation) -> String {
    let Some(text) = conversation.last_message.as_deref() else {
        return String::new();
    };
    let text = text.trim();
    match text.char_indices().nth(PREVIEW_CHARS) {
        Some((cut, _)) => format!("{}...", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn conversation(last_message: Option<&str>) -> Conversation {
        serde_json::from_value(serde_json::json!({
            "id": "c1",
            "name": "",
            "lastMessage": last_message,
        }))
        .unwrap()
    }

    #[test]
    fn test_preview_truncates_long_messages() {
        let long = "word ".repeat(20);
        let p = preview(&conversation(Some(&long)));
        assert!(p.ends_with("..."));
        assert_eq!(p.chars().count(), PREVIEW_CHARS + 3);
        assert_eq!(preview(&conversation(None)), "");
    }

    #[test]
    fn test_unnamed_conversation() {
        assert_eq!(display_name(&conversation(None)), "(unnamed)");
    }
}
