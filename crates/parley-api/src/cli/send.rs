//! One-shot commands on a single chat: send, call, end.
//!
//! Each command resolves the route through a fresh `ChatView`, performs one
//! action and closes the view again.

use std::path::PathBuf;

use anyhow::{Context, Result, bail};
use console::style;
use tracing::{Instrument, info_span};

use parley_core::session::ResolvedSession;
use parley_observe::chat_attrs::{
    CHAT_ATTACHMENT_COUNT, CHAT_IDENTITY, CHAT_SESSION_KIND, OP_END_SESSION, OP_SEND,
    OP_VIDEO_CALL,
};
use parley_types::route::RouteParam;

use crate::state::{AppState, ConcreteChatView};

use super::chat::{load_upload, open_route};

/// Arguments of `parley send`.
pub struct SendRequest {
    pub route: RouteParam,
    pub text: String,
    pub attachments: Vec<PathBuf>,
    pub send_as: Option<String>,
}

async fn open_or_fail(view: &ConcreteChatView, route: &RouteParam, quiet: bool) -> Result<ResolvedSession> {
    match open_route(view, route, quiet).await? {
        Some(resolved) => Ok(resolved),
        None => bail!("'{}' is not available", route.identity),
    }
}

/// Send one message, uploading any attachments first.
///
/// # Examples
///
/// ```bash
/// parley send abc123 "See you at ten" --user u1
/// parley send abc123 --attach scan.pdf --user u1
/// parley send s-42 "Hi" --direct --as c7 --role admin --user admin-1
/// ```
pub async fn send_message(state: &AppState, request: SendRequest, json: bool, quiet: bool) -> Result<()> {
    let view = state.chat_view();
    let result = deliver(&view, &request, json || quiet).await;
    view.close();
    let message = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&message)?);
    } else if !quiet {
        println!(
            "  {} Sent to {}",
            style("✓").green(),
            style(&message.session_id).cyan()
        );
    }
    Ok(())
}

async fn deliver(
    view: &ConcreteChatView,
    request: &SendRequest,
    quiet: bool,
) -> Result<parley_types::chat::Message> {
    let resolved = open_or_fail(view, &request.route, quiet).await?;
    let span = info_span!(
        OP_SEND,
        { CHAT_IDENTITY } = %resolved.identity,
        { CHAT_SESSION_KIND } = %resolved.kind,
        { CHAT_ATTACHMENT_COUNT } = request.attachments.len()
    );

    async {
        for path in &request.attachments {
            let upload = load_upload(path).await?;
            let name = upload.file_name.clone();
            view.attach_file(upload)
                .await
                .with_context(|| format!("Failed to upload {name}"))?;
        }

        view.set_draft_text(request.text.clone());
        let sent = match &request.send_as {
            Some(user) => view.send_as(user).await,
            None => view.send_draft().await,
        };
        sent.context("Message was not sent")
    }
    .instrument(span)
    .await
}

/// Start a video call and post the invitation.
pub async fn start_call(state: &AppState, route: &RouteParam, json: bool) -> Result<()> {
    let view = state.chat_view();
    let result = async {
        let resolved = open_or_fail(&view, route, json).await?;
        let span = info_span!(OP_VIDEO_CALL, { CHAT_IDENTITY } = %resolved.identity);
        view.start_video_call()
            .instrument(span)
            .await
            .context("Could not start the video call")
    }
    .await;
    view.close();
    let invitation = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&invitation)?);
    } else {
        println!();
        println!(
            "  {} Video call ready: {}",
            style("*").cyan().bold(),
            style(&invitation.content).underlined()
        );
        println!("  {}", style("The link was posted to the chat.").dim());
        println!();
    }
    Ok(())
}

/// End the booking's consultation session.
pub async fn end_session(state: &AppState, route: &RouteParam, json: bool) -> Result<()> {
    let view = state.chat_view();
    let result = async {
        let resolved = open_or_fail(&view, route, json).await?;
        let span = info_span!(OP_END_SESSION, { CHAT_IDENTITY } = %resolved.identity);
        view.end_session()
            .instrument(span)
            .await
            .with_context(|| format!("Could not end the session of '{}'", route.identity))
    }
    .await;
    view.close();
    let session = result?;

    if json {
        println!("{}", serde_json::to_string_pretty(&session)?);
    } else {
        println!(
            "  {} Session {} is now {}",
            style("✓").green(),
            style(&session.id).cyan(),
            style(session.status).bold()
        );
    }
    Ok(())
}
