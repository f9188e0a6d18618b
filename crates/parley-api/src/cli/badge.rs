//! Unread notification badge command.

use anyhow::{Context, Result};
use console::style;

use crate::state::AppState;

pub async fn show_badge(state: &AppState, json: bool) -> Result<()> {
    let count = state
        .notification_badge()
        .refresh()
        .await
        .context("Failed to load notifications")?;

    if json {
        println!("{}", serde_json::json!({ "unread": count }));
    } else if count == 0 {
        println!("  {} No unread notifications.", style("✓").green());
    } else {
        println!(
            "  {} {} unread notification{}",
            style("●").yellow(),
            style(count).bold(),
            if count == 1 { "" } else { "s" }
        );
    }
    Ok(())
}
