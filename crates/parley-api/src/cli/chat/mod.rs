//! Interactive chat for the `parley` CLI.
//!
//! `loop_runner::run_chat_loop` drives a `ChatView` from the terminal: it
//! resolves the route, prints the live feed above the prompt and sends what
//! the user types. The helpers here are shared with the one-shot commands.

pub mod banner;
pub mod commands;
pub mod input;
pub mod loop_runner;
pub mod renderer;

use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result, bail};
use console::style;
use tracing::{Instrument, debug, info_span};

use parley_core::attachment::render_message;
use parley_core::backend::{ChatBackend, FileUpload};
use parley_core::role::Redirect;
use parley_core::session::ResolvedSession;
use parley_core::view::ViewOutcome;
use parley_observe::chat_attrs::{CHAT_IDENTITY, CHAT_VIEWER_ROLE, OP_OPEN};
use parley_types::error::ChatError;
use parley_types::route::RouteParam;

use crate::state::{AppState, ConcreteChatView};

/// Resolve attempts for transient failures before giving up.
const RESOLVE_ATTEMPTS: u32 = 3;

/// Open `route` on `view`, retrying transient failures.
///
/// Returns `None` after printing the notice when the route redirects away.
pub async fn open_route(
    view: &ConcreteChatView,
    route: &RouteParam,
    quiet: bool,
) -> Result<Option<ResolvedSession>> {
    let span = info_span!(
        OP_OPEN,
        { CHAT_IDENTITY } = %route.identity,
        { CHAT_VIEWER_ROLE } = %view.viewer().role
    );

    let spinner = (!quiet).then(|| {
        let spinner = indicatif::ProgressBar::new_spinner();
        spinner.set_style(
            indicatif::ProgressStyle::default_spinner()
                .template("  {spinner:.cyan} {msg}")
                .unwrap_or_else(|_| indicatif::ProgressStyle::default_spinner()),
        );
        spinner.set_message(format!("opening {}...", route.identity));
        spinner.enable_steady_tick(Duration::from_millis(80));
        spinner
    });

    let mut attempt = 1;
    let outcome = loop {
        match view.open(route).instrument(span.clone()).await {
            Err(ChatError::Transient(reason)) if attempt < RESOLVE_ATTEMPTS => {
                debug!(attempt, %reason, "Resolve failed, retrying");
                attempt += 1;
                tokio::time::sleep(Duration::from_millis(500 * u64::from(attempt))).await;
            }
            other => break other,
        }
    };

    if let Some(spinner) = spinner {
        spinner.finish_and_clear();
    }

    match outcome.with_context(|| format!("Could not open '{}'", route.identity))? {
        ViewOutcome::Resolved(resolved) => Ok(Some(resolved)),
        ViewOutcome::Redirect(redirect) => {
            match redirect_notice(&redirect) {
                Some(notice) if !quiet => {
                    eprintln!();
                    eprintln!("{notice}");
                    eprintln!();
                }
                Some(_) => {}
                None => debug!(
                    identity = %route.identity,
                    target = %redirect.target,
                    "Chat not found, leaving quietly"
                ),
            }
            Ok(None)
        }
        ViewOutcome::Pending | ViewOutcome::Superseded => {
            bail!("'{}' is still being resolved, try again", route.identity)
        }
    }
}

/// User-facing lines for a redirect. Not-found redirects are silent.
pub fn redirect_notice(redirect: &Redirect) -> Option<String> {
    let message = redirect.message.as_deref()?;
    Some(format!(
        "  {} {message}\n  {}",
        style("!").yellow().bold(),
        style(format!("Back to {}", redirect.target)).dim()
    ))
}

/// `parley open --once` / `--json`: print the conversation and exit.
pub async fn print_once(state: &AppState, route: &RouteParam, json: bool) -> Result<()> {
    let view = state.chat_view();
    let Some(resolved) = open_route(&view, route, json).await? else {
        view.close();
        return Ok(());
    };
    view.close();

    let messages = match resolved.session_id() {
        Some(session_id) => state
            .backend
            .get_messages(session_id)
            .await
            .context("Failed to load messages")?,
        None => Vec::new(),
    };

    if json {
        let doc = serde_json::json!({
            "closed": resolved.is_closed(),
            "identity": &resolved.identity,
            "kind": resolved.kind,
            "session": &resolved.session,
            "booking": &resolved.booking,
            "messages": &messages,
        });
        println!("{}", serde_json::to_string_pretty(&doc)?);
        return Ok(());
    }

    banner::print_chat_banner(&resolved, &state.viewer.id);
    if messages.is_empty() {
        println!("  {}", style("No messages yet.").dim());
    }
    for message in &messages {
        let rendered = render_message(&state.config.base_url, message);
        println!("{}", renderer::format_message(message, &rendered, &state.viewer.id));
    }
    println!();
    Ok(())
}

/// Read a local file into an upload.
pub async fn load_upload(path: &Path) -> Result<FileUpload> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("Failed to read {}", path.display()))?;
    let file_name = path
        .file_name()
        .and_then(|n| n.to_str())
        .map(str::to_string)
        .with_context(|| format!("{} has no file name", path.display()))?;
    Ok(FileUpload {
        mime_type: guess_mime(&file_name),
        file_name,
        bytes,
    })
}

/// MIME type guessed from the file extension. Unknown types are left to the backend.
fn guess_mime(file_name: &str) -> Option<String> {
    mime_guess::from_path(file_name)
        .first()
        .map(|mime| mime.essence_str().to_string())
}
