//! Application state wiring the backend client and the acting viewer.
//!
//! The messaging core is generic over `ChatBackend`; AppState pins it to the
//! REST implementation from parley-infra.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;

use parley_core::notification::NotificationBadge;
use parley_core::view::ChatView;
use parley_infra::HttpChatBackend;
use parley_infra::config::{load_chat_config, resolve_token};
use parley_infra::filesystem::resolve_data_dir;
use parley_types::config::ChatConfig;
use parley_types::viewer::Viewer;

use crate::cli::Cli;

pub type ConcreteChatView = ChatView<HttpChatBackend>;

/// Shared state for every command.
pub struct AppState {
    pub backend: Arc<HttpChatBackend>,
    pub config: ChatConfig,
    pub viewer: Viewer,
    pub data_dir: PathBuf,
}

impl AppState {
    /// Load config, apply CLI overrides and build the backend client.
    pub async fn init(cli: &Cli) -> anyhow::Result<Self> {
        let data_dir = resolve_data_dir();
        let mut config = load_chat_config(&data_dir).await;
        if let Some(base_url) = &cli.base_url {
            config.base_url = base_url.clone();
        }

        let user = cli
            .user
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .context("No user given. Pass --user or set PARLEY_USER")?;
        let viewer = Viewer::new(user, cli.role);

        let token = resolve_token(cli.token.clone());
        if token.is_none() {
            tracing::debug!("No bearer token configured, requests are unauthenticated");
        }

        let backend = HttpChatBackend::from_config(&config, token)
            .with_context(|| format!("Invalid backend URL '{}'", config.base_url))?;

        tracing::debug!(
            base_url = %config.base_url,
            user = %viewer.id,
            role = %viewer.role,
            data_dir = %data_dir.display(),
            "Application state ready"
        );

        Ok(Self {
            backend: Arc::new(backend),
            config,
            viewer,
            data_dir,
        })
    }

    pub fn chat_view(&self) -> ConcreteChatView {
        ChatView::new(self.backend.clone(), self.viewer.clone(), &self.config)
    }

    pub fn notification_badge(&self) -> NotificationBadge<HttpChatBackend> {
        NotificationBadge::new(self.backend.clone())
    }
}
