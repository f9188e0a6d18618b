//! CLI command definitions for the `parley` binary.
//!
//! Uses clap derive macros for argument parsing. Connection settings
//! (`--user`, `--role`, `--base-url`, `--token`) are global so every
//! command can reach the backend as the same viewer.

pub mod badge;
pub mod chat;
pub mod conversations;
pub mod send;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use clap_complete::Shell;

use parley_types::route::RouteParam;
use parley_types::viewer::ViewerRole;

/// Chat with clients and consultants from the terminal.
#[derive(Parser)]
#[command(name = "parley", version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output machine-readable JSON instead of styled text.
    #[arg(long, global = true)]
    pub json: bool,

    /// Suppress all output except errors.
    #[arg(long, global = true)]
    pub quiet: bool,

    /// Detailed output (-v for verbose, -vv for debug/trace).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Export tracing spans to stdout through OpenTelemetry.
    #[arg(long, global = true)]
    pub otel: bool,

    /// Id of the user you are acting as.
    #[arg(long, env = "PARLEY_USER", global = true)]
    pub user: Option<String>,

    /// Role of the acting user.
    #[arg(long, env = "PARLEY_ROLE", default_value = "client", global = true)]
    pub role: ViewerRole,

    /// Backend origin. Overrides `base_url` from config.toml.
    #[arg(long, env = "PARLEY_BASE_URL", global = true)]
    pub base_url: Option<String>,

    /// Bearer token. Falls back to the PARLEY_TOKEN environment variable.
    #[arg(long, global = true)]
    pub token: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List your conversations.
    #[command(alias = "ls")]
    Conversations,

    /// Open a chat and follow it live.
    Open {
        /// Booking id or session id.
        id: String,

        /// Treat the id as a direct session id.
        #[arg(long)]
        direct: bool,

        /// Print the current messages and exit instead of following the chat.
        #[arg(long)]
        once: bool,
    },

    /// Send one message.
    Send {
        /// Booking id or session id.
        id: String,

        /// Message text. May be empty when attachments are given.
        #[arg(default_value = "")]
        text: String,

        /// Attach a file (repeatable).
        #[arg(long = "attach", value_name = "FILE")]
        attachments: Vec<PathBuf>,

        /// Treat the id as a direct session id.
        #[arg(long)]
        direct: bool,

        /// Send on behalf of another participant (admin only).
        #[arg(long = "as", value_name = "USER")]
        send_as: Option<String>,
    },

    /// Start a video call and post the invitation to the chat.
    Call {
        /// Booking id or session id.
        id: String,

        #[arg(long)]
        direct: bool,
    },

    /// End the consultation session of a booking.
    End {
        /// Booking id.
        id: String,
    },

    /// Show the unread notification count.
    Badge,

    /// Generate shell completions.
    Completions {
        /// Shell to generate completions for.
        shell: Shell,
    },
}

/// Route for `id` as typed on the command line.
///
/// Accepts a bare identity or a full chat path such as
/// `/client/messages/session/abc`.
pub fn route_for(id: &str, direct: bool) -> RouteParam {
    if let Some(route) = id.starts_with('/').then(|| RouteParam::from_path(id)).flatten() {
        return route;
    }
    if direct {
        RouteParam::direct(id)
    } else {
        RouteParam::ambiguous(id)
    }
}
