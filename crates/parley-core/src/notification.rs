//! Unread notification badge.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::debug;

use parley_types::error::BackendError;

use crate::backend::ChatBackend;
use crate::feed::poller::{PollControl, PollHandle, spawn_poller};

/// Polls the unread notification count and keeps the last known value.
pub struct NotificationBadge<B> {
    backend: Arc<B>,
    count: Arc<watch::Sender<u32>>,
}

impl<B> Clone for NotificationBadge<B> {
    fn clone(&self) -> Self {
        Self {
            backend: self.backend.clone(),
            count: self.count.clone(),
        }
    }
}

impl<B: ChatBackend + 'static> NotificationBadge<B> {
    pub fn new(backend: Arc<B>) -> Self {
        let (tx, _) = watch::channel(0);
        Self {
            backend,
            count: Arc::new(tx),
        }
    }

    pub async fn refresh(&self) -> Result<u32, BackendError> {
        let count = self.backend.unread_notification_count().await?;
        self.count.send_if_modified(|current| {
            let changed = *current != count;
            *current = count;
            changed
        });
        Ok(count)
    }

    pub fn count(&self) -> u32 {
        *self.count.borrow()
    }

    pub fn subscribe(&self) -> watch::Receiver<u32> {
        self.count.subscribe()
    }

    /// Poll every `interval`. A failed poll keeps the previous count.
    pub fn start_polling(&self, interval: Duration) -> PollHandle {
        let badge = self.clone();
        spawn_poller("notifications", interval, CancellationToken::new(), move || {
            let badge = badge.clone();
            async move {
                if let Err(err) = badge.refresh().await {
                    debug!(error = %err, "Notification poll failed");
                }
                PollControl::Continue
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockBackend;

    #[tokio::test]
    async fn test_refresh_updates_count() {
        let backend = Arc::new(MockBackend::new());
        backend.set_notification_count(4);
        let badge = NotificationBadge::new(backend.clone());
        assert_eq!(badge.count(), 0);
        assert_eq!(badge.refresh().await.unwrap(), 4);
        assert_eq!(badge.count(), 4);
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_poll_keeps_previous_count() {
        let backend = Arc::new(MockBackend::new());
        backend.set_notification_count(2);
        let badge = NotificationBadge::new(backend.clone());
        let mut rx = badge.subscribe();
        let _poll = badge.start_polling(Duration::from_secs(30));
        rx.wait_for(|c| *c == 2).await.unwrap();

        backend.fail_notifications(Some(BackendError::Transport("down".into())));
        tokio::time::advance(Duration::from_secs(30)).await;
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
        assert_eq!(backend.calls("unread_notification_count"), 2);
        assert_eq!(badge.count(), 2);
    }
}
