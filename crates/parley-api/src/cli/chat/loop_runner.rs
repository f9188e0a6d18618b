//! Main chat loop orchestration.
//!
//! Resolves the route, prints the banner, then multiplexes two sources with
//! `tokio::select!`: lines typed at the prompt and events published by the
//! chat view (feed updates, redirects, session changes).

use std::collections::HashSet;
use std::io::Write;

use anyhow::anyhow;
use console::style;
use tokio::sync::broadcast::error::RecvError;
use tracing::debug;

use parley_core::attachment::RenderedMessage;
use parley_core::event::ViewEvent;
use parley_types::chat::Message;
use parley_types::error::SendError;
use parley_types::route::RouteParam;

use crate::state::{AppState, ConcreteChatView};

use super::banner::print_chat_banner;
use super::commands::{self, ChatCommand};
use super::input::{ChatInput, InputEvent};
use super::renderer::format_message;
use super::{load_upload, open_route, redirect_notice};

/// Prints each message once, in feed order.
pub struct FeedPrinter {
    viewer_id: String,
    seen: HashSet<String>,
}

impl FeedPrinter {
    pub fn new(viewer_id: impl Into<String>) -> Self {
        Self {
            viewer_id: viewer_id.into(),
            seen: HashSet::new(),
        }
    }

    /// Formatted lines for messages not printed yet.
    pub fn take_new(&mut self, messages: &[(Message, RenderedMessage)]) -> Vec<String> {
        messages
            .iter()
            .filter(|(message, _)| self.seen.insert(message.id.clone()))
            .map(|(message, rendered)| format_message(message, rendered, &self.viewer_id))
            .collect()
    }

    /// Forget what was printed so the next call prints everything.
    pub fn reset(&mut self) {
        self.seen.clear();
    }
}

enum Flow {
    Continue,
    Exit,
}

/// Run the interactive chat for `route`.
pub async fn run_chat_loop(state: &AppState, route: &RouteParam) -> anyhow::Result<()> {
    let view = state.chat_view();
    let Some(resolved) = open_route(&view, route, false).await? else {
        view.close();
        return Ok(());
    };
    print_chat_banner(&resolved, &state.viewer.id);

    let mut events = view.subscribe();
    let mut printer = FeedPrinter::new(state.viewer.id.clone());

    let prompt = format!("  {} ", style("You >").green().bold());
    let (mut chat_input, mut out) =
        ChatInput::new(prompt).map_err(|e| anyhow!("Failed to initialize input: {e}"))?;

    print_lines(&mut out, printer.take_new(&view.rendered_messages()))?;

    loop {
        tokio::select! {
            event = chat_input.read_line() => match event {
                InputEvent::Eof => break,
                InputEvent::Interrupted => {
                    writeln!(out, "  {}", style("Press Ctrl+D to exit, or keep chatting.").dim())?;
                }
                InputEvent::Line(line) if line.is_empty() => {}
                InputEvent::Line(line) => {
                    let flow = match commands::parse(&line) {
                        Some(command) => run_command(&view, command, &mut out, &mut printer).await?,
                        None => {
                            report_send(&mut out, view.send(&line).await)?;
                            Flow::Continue
                        }
                    };
                    if let Flow::Exit = flow {
                        break;
                    }
                }
            },

            event = events.recv() => match event {
                Ok(ViewEvent::MessagesUpdated { .. }) => {
                    print_lines(&mut out, printer.take_new(&view.rendered_messages()))?;
                }
                Ok(ViewEvent::Redirect(redirect)) => {
                    if let Some(notice) = redirect_notice(&redirect) {
                        writeln!(out, "\n{notice}")?;
                    }
                    break;
                }
                Ok(ViewEvent::SessionCreated { session_id, .. }) => {
                    writeln!(out, "  {}", style(format!("Session {session_id} started")).dim())?;
                }
                Ok(ViewEvent::SessionEnded { .. }) => {
                    writeln!(
                        out,
                        "  {}",
                        style("The session has ended. New messages are disabled.").yellow()
                    )?;
                }
                Ok(_) => {}
                Err(RecvError::Lagged(skipped)) => {
                    debug!(skipped, "Chat loop lagged behind view events");
                    print_lines(&mut out, printer.take_new(&view.rendered_messages()))?;
                }
                Err(RecvError::Closed) => break,
            },
        }
    }

    chat_input.flush();
    view.close();
    println!("\n  {}", style("Chat closed.").dim());
    Ok(())
}

fn print_lines(out: &mut impl Write, lines: Vec<String>) -> std::io::Result<()> {
    for line in lines {
        writeln!(out, "{line}")?;
    }
    Ok(())
}

fn report_send(out: &mut impl Write, result: Result<Message, SendError>) -> std::io::Result<()> {
    match result {
        // The sent message shows up through the feed.
        Ok(_) => Ok(()),
        Err(SendError::Empty) => writeln!(out, "  {}", style("Nothing to send.").dim()),
        Err(err) => writeln!(
            out,
            "  {} {err}. Your draft was kept.",
            style("!").red().bold()
        ),
    }
}

async fn run_command(
    view: &ConcreteChatView,
    command: ChatCommand,
    out: &mut impl Write,
    printer: &mut FeedPrinter,
) -> anyhow::Result<Flow> {
    match command {
        ChatCommand::Help => commands::write_help(out, view.profile().can_send_as)?,
        ChatCommand::Exit => return Ok(Flow::Exit),

        ChatCommand::Attach(path) => match load_upload(&path).await {
            Ok(upload) => {
                let name = upload.file_name.clone();
                match view.attach_file(upload).await {
                    Ok(_) => writeln!(
                        out,
                        "  {} Attached {}. Type a message or /send.",
                        style("+").green().bold(),
                        style(name).cyan()
                    )?,
                    Err(err) => writeln!(out, "  {} Upload failed: {err}", style("!").red().bold())?,
                }
            }
            Err(err) => writeln!(out, "  {} {err:#}", style("!").red().bold())?,
        },

        ChatCommand::Send => report_send(out, view.send_draft().await)?,

        ChatCommand::Draft => {
            let draft = view.draft();
            if draft.is_empty() {
                writeln!(out, "  {}", style("Draft is empty.").dim())?;
            } else {
                writeln!(out, "  {} {}", style("Draft:").bold(), draft.text)?;
                for url in &draft.attachments {
                    writeln!(out, "        {}", style(url).dim())?;
                }
            }
        }

        ChatCommand::Call => match view.start_video_call().await {
            Ok(message) => writeln!(
                out,
                "  {} Video call ready: {}",
                style("*").cyan().bold(),
                style(message.content).underlined()
            )?,
            Err(err) => writeln!(out, "  {} Could not start the call: {err}", style("!").red().bold())?,
        },

        ChatCommand::Start => match view.start_session().await {
            Ok(session) => writeln!(out, "  {}", style(format!("Session is {}", session.status)).dim())?,
            Err(err) => writeln!(out, "  {} {err}", style("!").red().bold())?,
        },

        ChatCommand::End => match view.end_session().await {
            // The view publishes SessionEnded; the event handler reports it.
            Ok(_) => {}
            Err(err) => writeln!(out, "  {} {err}", style("!").red().bold())?,
        },

        ChatCommand::SendAs { user, text } => {
            view.set_draft_text(text);
            report_send(out, view.send_as(&user).await)?;
        }

        ChatCommand::History => {
            printer.reset();
            print_lines(out, printer.take_new(&view.rendered_messages()))?;
        }

        ChatCommand::Unknown(name) => writeln!(
            out,
            "  {} Unknown command: {}. Type /help for available commands.",
            style("?").yellow().bold(),
            style(name).dim()
        )?,
    }
    Ok(Flow::Continue)
}
