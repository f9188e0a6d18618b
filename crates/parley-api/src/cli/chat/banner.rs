//! Header printed when a chat opens.

use console::style;

use parley_core::session::ResolvedSession;
use parley_types::chat::SessionKind;

/// Print the chat header: who the conversation is with, its kind and status.
pub fn print_chat_banner(resolved: &ResolvedSession, viewer_id: &str) {
    let title = match (&resolved.booking, resolved.kind) {
        (Some(booking), _) => booking
            .service
            .as_ref()
            .and_then(|s| s.name.clone())
            .unwrap_or_else(|| format!("Booking {}", resolved.identity)),
        (None, SessionKind::DirectMessage) => "Direct message".to_string(),
        (None, SessionKind::BookingBound) => format!("Booking {}", resolved.identity),
    };

    let status = match &resolved.session {
        Some(session) => session.status.to_string(),
        None => "not started".to_string(),
    };

    let with = resolved
        .session
        .as_ref()
        .and_then(|s| s.counterpart_of(viewer_id).map(str::to_string))
        .or_else(|| {
            resolved
                .booking
                .as_ref()
                .and_then(|b| b.participants().into_iter().find(|p| p != viewer_id))
        });

    println!();
    println!("  {} {}", style("*").cyan(), style(title).cyan().bold());
    if let Some(with) = with {
        println!("  {}  {}", style("With:").bold(), style(with).dim());
    }
    println!("  {}  {}", style("Status:").bold(), style(status).dim());
    if let Some(session_id) = resolved.session_id() {
        println!("  {}  {}", style("Session:").bold(), style(session_id).dim());
    }
    println!();
    if resolved.is_closed() {
        println!(
            "  {}",
            style("This session has ended. New messages are disabled.").yellow()
        );
    } else {
        println!("  {}", style("Type /help for commands, Ctrl+D to exit").dim());
    }
    println!("  {}", style("---").dim());
    println!();
}
