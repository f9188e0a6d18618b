//! Cancellable fixed-interval poll loop.
//!
//! Every periodic refresh in the core (messages, conversation list,
//! notification badge) runs on one of these. The first tick fires
//! immediately; a tick that is still running when cancellation arrives is
//! dropped, so nothing it would have published reaches subscribers.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Returned by a tick to keep or end the loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollControl {
    Continue,
    Stop,
}

/// Owner handle for a running poll loop. Dropping it stops the loop.
#[derive(Debug)]
pub struct PollHandle {
    name: &'static str,
    cancel: CancellationToken,
    refresh: Arc<Notify>,
    task: Option<JoinHandle<()>>,
}

impl PollHandle {
    /// Stop the loop. Idempotent.
    pub fn stop(&self) {
        if !self.cancel.is_cancelled() {
            debug!(poller = self.name, "Stopping poller");
            self.cancel.cancel();
        }
    }

    /// Run the next tick now instead of waiting for the interval.
    pub fn refresh(&self) {
        self.refresh.notify_one();
    }

    /// Whether the loop has been stopped or ended on its own.
    pub fn is_stopped(&self) -> bool {
        self.cancel.is_cancelled() || self.task.as_ref().is_none_or(JoinHandle::is_finished)
    }

    /// Wait for the loop task to exit.
    pub async fn join(mut self) {
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

impl Drop for PollHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

/// Spawn a poll loop that calls `tick` every `period` until it returns
/// [`PollControl::Stop`] or `cancel` fires.
pub fn spawn_poller<F, Fut>(
    name: &'static str,
    period: Duration,
    cancel: CancellationToken,
    mut tick: F,
) -> PollHandle
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = PollControl> + Send + 'static,
{
    let refresh = Arc::new(Notify::new());
    let token = cancel.clone();
    let wake = refresh.clone();

    let task = tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = token.cancelled() => break,
                _ = interval.tick() => {}
                _ = wake.notified() => interval.reset(),
            }

            let control = tokio::select! {
                biased;
                _ = token.cancelled() => break,
                control = tick() => control,
            };
            if control == PollControl::Stop {
                debug!(poller = name, "Poller ended itself");
                break;
            }
        }
        debug!(poller = name, "Poller exited");
    });

    PollHandle {
        name,
        cancel,
        refresh,
        task: Some(task),
    }
}
