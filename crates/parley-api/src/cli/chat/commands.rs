//! Slash command parsing for the chat loop.
//!
//! Commands start with `/` and expose the chat view's actions that are not
//! plain text messages: attachments, video calls, session lifecycle.

use std::io::{self, Write};
use std::path::PathBuf;

use console::style;

/// Available slash commands in the chat loop.
#[derive(Debug, PartialEq)]
pub enum ChatCommand {
    /// Show available commands.
    Help,
    /// Exit the chat.
    Exit,
    /// Upload a file and add it to the draft.
    Attach(PathBuf),
    /// Send the draft (text plus attachments) without typing more text.
    Send,
    /// Show the current draft.
    Draft,
    /// Start a video call and post the invitation.
    Call,
    /// Move the booking session to in progress.
    Start,
    /// End the booking session.
    End,
    /// Send text on behalf of another participant (admin only).
    SendAs { user: String, text: String },
    /// Reprint the whole conversation.
    History,
    /// Unknown command or missing argument.
    Unknown(String),
}

/// Parse user input as a slash command.
///
/// Returns `None` if the input doesn't start with `/`.
pub fn parse(input: &str) -> Option<ChatCommand> {
    let trimmed = input.trim();
    if !trimmed.starts_with('/') {
        return None;
    }

    let (cmd, arg) = match trimmed.split_once(' ') {
        Some((cmd, arg)) => (cmd.to_lowercase(), arg.trim()),
        None => (trimmed.to_lowercase(), ""),
    };

    let command = match cmd.as_str() {
        "/help" | "/h" | "/?" => ChatCommand::Help,
        "/exit" | "/quit" | "/q" => ChatCommand::Exit,
        "/send" => ChatCommand::Send,
        "/draft" => ChatCommand::Draft,
        "/call" | "/video" => ChatCommand::Call,
        "/start" => ChatCommand::Start,
        "/end" => ChatCommand::End,
        "/history" => ChatCommand::History,
        "/attach" | "/a" => {
            if arg.is_empty() {
                ChatCommand::Unknown("/attach requires a file path".to_string())
            } else {
                ChatCommand::Attach(PathBuf::from(arg))
            }
        }
        "/as" => match arg.split_once(' ') {
            Some((user, text)) if !text.trim().is_empty() => ChatCommand::SendAs {
                user: user.to_string(),
                text: text.trim().to_string(),
            },
            _ => ChatCommand::Unknown("/as requires a user id and a message".to_string()),
        },
        other => ChatCommand::Unknown(other.to_string()),
    };
    Some(command)
}

/// Write the help text listing all available commands.
pub fn write_help(out: &mut impl Write, can_send_as: bool) -> io::Result<()> {
    let rows = [
        ("/help", "Show this help message"),
        ("/attach <file>", "Upload a file and add it to the next message"),
        ("/draft", "Show the pending draft"),
        ("/send", "Send the draft as is"),
        ("/call", "Start a video call and share the link"),
        ("/start", "Start the booking session"),
        ("/end", "End the booking session"),
        ("/history", "Show the whole conversation again"),
        ("/exit", "Leave the chat"),
    ];

    writeln!(out)?;
    writeln!(out, "  {}", style("Available commands:").bold())?;
    writeln!(out)?;
    for (cmd, help) in rows {
        writeln!(out, "  {} {help}", style(format!("{cmd:<18}")).cyan())?;
    }
    if can_send_as {
        writeln!(
            out,
            "  {} Send on behalf of a participant",
            style(format!("{:<18}", "/as <user> <text>")).cyan()
        )?;
    }
    writeln!(out)?;
    writeln!(out, "  {}", style("Ctrl+D to exit, Ctrl+C keeps the draft").dim())?;
    writeln!(out)
}
