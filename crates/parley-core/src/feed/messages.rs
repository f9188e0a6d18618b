//! Polling message feed for one session.
//!
//! Each poll replaces the full message list; there is no incremental merge.
//! Unread messages from other participants are marked as read once seen.
//! A forbidden or not-found response flags the snapshot and ends polling,
//! while transient failures keep the last list and retry on the next tick.

use std::sync::Arc;
use std::time::Duration;

use futures_util::Stream;
use serde::Serialize;
use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use parley_types::chat::Message;
use parley_types::error::FailureKind;

use crate::backend::ChatBackend;

use super::poller::{PollControl, PollHandle, spawn_poller};

/// Latest view of a session's messages.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedSnapshot {
    pub session_id: String,
    /// Complete list as of the last successful poll, oldest first.
    pub messages: Vec<Message>,
    pub access_denied: bool,
    pub not_found: bool,
    /// Message of the most recent failed poll, cleared by the next success.
    pub last_error: Option<String>,
    /// Bumped on every published change.
    pub revision: u64,
}

impl FeedSnapshot {
    /// Whether the feed stopped on a terminal failure.
    pub fn is_terminal(&self) -> bool {
        self.access_denied || self.not_found
    }

    pub fn failure(&self) -> Option<FailureKind> {
        if self.access_denied {
            Some(FailureKind::Forbidden)
        } else if self.not_found {
            Some(FailureKind::NotFound)
        } else {
            None
        }
    }
}

struct FeedWorker<B> {
    backend: Arc<B>,
    session_id: String,
    viewer_id: String,
    tx: watch::Sender<FeedSnapshot>,
}

impl<B: ChatBackend> FeedWorker<B> {
    async fn poll_once(&self) -> PollControl {
        let messages = match self.backend.get_messages(&self.session_id).await {
            Ok(messages) => messages,
            Err(err) => {
                let kind = err.classify();
                let reason = err.to_string();
                self.tx.send_modify(|s| {
                    match kind {
                        FailureKind::Forbidden => s.access_denied = true,
                        FailureKind::NotFound => s.not_found = true,
                        FailureKind::Transient => {}
                    }
                    s.last_error = Some(reason);
                    s.revision += 1;
                });
                return match kind {
                    FailureKind::Transient => {
                        debug!(session_id = %self.session_id, error = %err, "Message poll failed, will retry");
                        PollControl::Continue
                    }
                    FailureKind::Forbidden | FailureKind::NotFound => {
                        warn!(session_id = %self.session_id, error = %err, "Message poll hit a terminal failure");
                        PollControl::Stop
                    }
                };
            }
        };

        let has_unread = messages.iter().any(|m| m.is_unread_for(&self.viewer_id));

        self.tx.send_if_modified(|s| {
            if s.messages == messages && s.last_error.is_none() {
                return false;
            }
            s.messages = messages;
            s.last_error = None;
            s.revision += 1;
            true
        });

        if has_unread {
            if let Err(err) = self.backend.mark_as_read(&self.session_id).await {
                warn!(session_id = %self.session_id, error = %err, "Failed to mark messages as read");
            }
        }
        PollControl::Continue
    }
}

/// Starts message feeds against a backend.
pub struct MessageFeed<B> {
    backend: Arc<B>,
    viewer_id: String,
    interval: Duration,
}

impl<B: ChatBackend + 'static> MessageFeed<B> {
    pub fn new(backend: Arc<B>, viewer_id: impl Into<String>, interval: Duration) -> Self {
        Self {
            backend,
            viewer_id: viewer_id.into(),
            interval,
        }
    }

    /// Begin polling `session_id`. The first poll runs immediately.
    pub fn start(&self, session_id: &str) -> FeedHandle {
        let (tx, rx) = watch::channel(FeedSnapshot {
            session_id: session_id.to_string(),
            ..Default::default()
        });
        let worker = Arc::new(FeedWorker {
            backend: self.backend.clone(),
            session_id: session_id.to_string(),
            viewer_id: self.viewer_id.clone(),
            tx,
        });

        debug!(session_id, interval_secs = self.interval.as_secs(), "Starting message feed");
        let poller = spawn_poller("messages", self.interval, CancellationToken::new(), move || {
            let worker = worker.clone();
            async move { worker.poll_once().await }
        });

        FeedHandle {
            session_id: session_id.to_string(),
            rx,
            poller,
        }
    }
}

/// Subscription to a running feed. Dropping it unsubscribes.
#[derive(Debug)]
pub struct FeedHandle {
    session_id: String,
    rx: watch::Receiver<FeedSnapshot>,
    poller: PollHandle,
}

impl FeedHandle {
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub fn snapshot(&self) -> FeedSnapshot {
        self.rx.borrow().clone()
    }

    pub fn messages(&self) -> Vec<Message> {
        self.rx.borrow().messages.clone()
    }

    /// A receiver that observes every published snapshot.
    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.rx.clone()
    }

    /// Snapshots as a stream. Ends when the feed is stopped.
    pub fn updates(&self) -> impl Stream<Item = FeedSnapshot> + Send + 'static {
        let mut rx = self.rx.clone();
        async_stream::stream! {
            while rx.changed().await.is_ok() {
                let snapshot = rx.borrow_and_update().clone();
                yield snapshot;
            }
        }
    }

    /// Poll now instead of waiting for the next tick (e.g. after a send).
    pub fn refresh(&self) {
        self.poller.refresh();
    }

    pub fn is_active(&self) -> bool {
        !self.poller.is_stopped()
    }

    /// Stop polling. Responses still in flight are discarded.
    pub fn unsubscribe(&self) {
        self.poller.stop();
    }
}
