//! Cached conversation list.
//!
//! The resolver consults this cache before ever treating an identity as a
//! booking, and the CLI renders it as the conversation sidebar. The list is
//! replaced wholesale on every refresh.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use parley_types::chat::Conversation;
use parley_types::error::BackendError;

use crate::backend::ChatBackend;
use crate::feed::poller::{PollControl, PollHandle, spawn_poller};

/// Shared, cheaply cloneable conversation cache.
pub struct ConversationDirectory<B> {
    backend: Arc<B>,
    conversations: Arc<watch::Sender<Vec<Conversation>>>,
}

impl<B> Clone for ConversationDirectory<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            conversations: self.conversations.clone(),
        }
    }
}

impl<B: ChatBackend + 'static> ConversationDirectory<B> {
    pub fn new(backend: Arc<B>) -> Self {
        let (tx, _) = watch::channel(Vec::new());
        Self {
            backend,
            conversations: Arc::new(tx),
        }
    }

    /// Reload the list from the backend. Returns the number of entries.
    pub async fn refresh(&self) -> Result<usize, BackendError> {
        let list = self.backend.list_conversations().await?;
        let count = list.len();
        self.conversations.send_if_modified(|current| {
            if *current == list {
                return false;
            }
            *current = list;
            true
        });
        debug!(count, "Conversation list refreshed");
        Ok(count)
    }

    /// Current cached list.
    pub fn snapshot(&self) -> Vec<Conversation> {
        self.conversations.borrow().clone()
    }

    /// Cached entry referring to `identity` as a direct session. No network.
    pub fn find_session(&self, identity: &str) -> Option<Conversation> {
        self.conversations
            .borrow()
            .iter()
            .find(|c| c.matches_session(identity))
            .cloned()
    }

    /// Cache lookup, refreshing once on a miss.
    ///
    /// A failed refresh is logged and treated as a miss.
    pub async fn lookup(&self, identity: &str) -> Option<Conversation> {
        if let Some(hit) = self.find_session(identity) {
            return Some(hit);
        }
        if let Err(err) = self.refresh().await {
            warn!(identity, error = %err, "Conversation refresh failed during lookup");
            return None;
        }
        self.find_session(identity)
    }

    /// Sum of unread counts across conversations.
    pub fn total_unread(&self) -> u32 {
        self.conversations
            .borrow()
            .iter()
            .map(|c| c.unread_count)
            .sum()
    }

    pub fn subscribe(&self) -> watch::Receiver<Vec<Conversation>> {
        self.conversations.subscribe()
    }

    /// Refresh the list every `interval` until the handle is dropped.
    ///
    /// Failures are logged and retried on the next tick.
    pub fn start_polling(&self, interval: Duration) -> PollHandle {
        let directory = self.clone();
        spawn_poller("conversations", interval, CancellationToken::new(), move || {
            let directory = directory.clone();
            async move {
                if let Err(err) = directory.refresh().await {
                    debug!(error = %err, "Conversation poll failed, will retry");
                }
                PollControl::Continue
            }
        })
    }
}
