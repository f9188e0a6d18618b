//! Parley CLI entry point.
//!
//! Binary name: `parley`
//!
//! Parses CLI arguments, loads configuration, wires the REST backend, then
//! dispatches to the command handler.

mod cli;
mod state;

use clap::Parser;
use clap_complete::generate;

use cli::{Cli, Commands, route_for};
use state::AppState;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Set up tracing based on verbosity
    let filter = match cli.verbose {
        0 if cli.quiet => "error",
        0 => "warn",
        1 => "info,parley=debug",
        _ => "trace",
    };

    parley_observe::init_tracing(filter, cli.otel)
        .map_err(|e| anyhow::anyhow!("Failed to initialize tracing: {e}"))?;

    let result = run(cli).await;
    parley_observe::shutdown_tracing();
    result
}

async fn run(cli: Cli) -> anyhow::Result<()> {
    // Shell completions don't need app state
    if let Commands::Completions { shell } = &cli.command {
        let mut cmd = <Cli as clap::CommandFactory>::command();
        generate(*shell, &mut cmd, "parley", &mut std::io::stdout());
        return Ok(());
    }

    let state = AppState::init(&cli).await?;

    match cli.command {
        Commands::Conversations => {
            cli::conversations::list_conversations(&state, cli.json).await?;
        }

        Commands::Open { id, direct, once } => {
            let route = route_for(&id, direct);
            if once || cli.json {
                cli::chat::print_once(&state, &route, cli.json).await?;
            } else {
                cli::chat::loop_runner::run_chat_loop(&state, &route).await?;
            }
        }

        Commands::Send {
            id,
            text,
            attachments,
            direct,
            send_as,
        } => {
            let request = cli::send::SendRequest {
                route: route_for(&id, direct),
                text,
                attachments,
                send_as,
            };
            cli::send::send_message(&state, request, cli.json, cli.quiet).await?;
        }

        Commands::Call { id, direct } => {
            cli::send::start_call(&state, &route_for(&id, direct), cli.json).await?;
        }

        Commands::End { id } => {
            cli::send::end_session(&state, &route_for(&id, false), cli.json).await?;
        }

        Commands::Badge => {
            cli::badge::show_badge(&state, cli.json).await?;
        }

        Commands::Completions { .. } => unreachable!("handled above"),
    }

    Ok(())
}
