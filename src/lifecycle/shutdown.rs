//! Shutdown coordination for the daemon.
//!
//! ```text
//! Starting → Running → (CancellationRequested | ServiceErrored) → Closing → Closed
//! ```
//!
//! States only move forward. Whichever of cancellation or a service error
//! happens first is the one recorded.

use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::lifecycle::completion::CompletionSignal;
use crate::lifecycle::signals::CancellationSignal;

/// Daemon lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownState {
    /// Acquiring the repository, building the node, launching services.
    Starting,
    /// Node built and the control API serving.
    Running,
    /// The external cancellation signal fired.
    CancellationRequested,
    /// A service reported an error.
    ServiceErrored,
    /// The node is being torn down.
    Closing,
    /// Teardown finished.
    Closed,
}

impl ShutdownState {
    fn rank(self) -> u8 {
        match self {
            ShutdownState::Starting => 0,
            ShutdownState::Running => 1,
            ShutdownState::CancellationRequested | ShutdownState::ServiceErrored => 2,
            ShutdownState::Closing => 3,
            ShutdownState::Closed => 4,
        }
    }
}

/// How a daemon that started successfully came to stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownOutcome {
    /// Stopped because cancellation was requested.
    Graceful,
    /// Every service finished on its own without error.
    Completed,
}

/// Coordinator for graceful shutdown.
#[derive(Debug)]
pub struct ShutdownCoordinator {
    state: Arc<watch::Sender<ShutdownState>>,
    cancel: CancellationSignal,
}

impl ShutdownCoordinator {
    /// Create a coordinator in the `Starting` state.
    pub fn new(cancel: CancellationSignal) -> Self {
        let (state, _) = watch::channel(ShutdownState::Starting);
        Self {
            state: Arc::new(state),
            cancel,
        }
    }

    /// Current state.
    pub fn state(&self) -> ShutdownState {
        *self.state.borrow()
    }

    /// Subscribe to state changes.
    pub fn subscribe(&self) -> watch::Receiver<ShutdownState> {
        self.state.subscribe()
    }

    /// The cancellation signal this coordinator observes.
    pub fn cancellation(&self) -> &CancellationSignal {
        &self.cancel
    }

    /// Spawn the cancellation watcher.
    ///
    /// It only records and announces the request; stopping services is the
    /// node's job. The watcher exits on its own once teardown is done.
    pub fn watch_cancellation(&self) -> JoinHandle<()> {
        let cancel = self.cancel.clone();
        let state = Arc::clone(&self.state);
        let mut closed = self.state.subscribe();

        tokio::spawn(async move {
            tokio::select! {
                _ = cancel.fired() => {
                    println!("Received interrupt signal, shutting down...");
                    tracing::info!("Cancellation requested");
                    advance(&state, ShutdownState::CancellationRequested);
                }
                _ = closed.wait_for(|s| *s == ShutdownState::Closed) => {}
            }
        })
    }

    /// Mark the daemon as serving.
    pub fn mark_running(&self) {
        advance(&self.state, ShutdownState::Running);
    }

    /// Block on the merged completion signal until the first error or until
    /// every service has finished.
    pub async fn supervise<E>(&self, mut merged: CompletionSignal<E>) -> Result<(), E> {
        match merged.recv().await {
            Some(err) => {
                advance(&self.state, ShutdownState::ServiceErrored);
                Err(err)
            }
            None => Ok(()),
        }
    }

    /// Mark the start of teardown.
    pub fn begin_closing(&self) {
        advance(&self.state, ShutdownState::Closing);
    }

    /// Mark teardown as finished and report how the daemon stopped.
    pub fn mark_closed(&self) -> ShutdownOutcome {
        advance(&self.state, ShutdownState::Closed);
        if self.cancel.is_fired() {
            tracing::info!("Gracefully shut down daemon");
            ShutdownOutcome::Graceful
        } else {
            ShutdownOutcome::Completed
        }
    }
}

fn advance(state: &watch::Sender<ShutdownState>, to: ShutdownState) -> bool {
    let changed = state.send_if_modified(|current| {
        if to.rank() > current.rank() {
            *current = to;
            true
        } else {
            false
        }
    });
    if changed {
        tracing::debug!(state = ?to, "Daemon state changed");
    }
    changed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::completion::{completion_channel, merge};
    use std::time::Duration;

    #[tokio::test]
    async fn first_error_wins_whichever_service_sends_it() {
        for failing in 0..2 {
            let coordinator = ShutdownCoordinator::new(CancellationSignal::new());
            coordinator.mark_running();

            let (api_tx, api) = completion_channel::<String>();
            let (gw_tx, gateway) = completion_channel::<String>();
            let merged = merge([Some(api), Some(gateway)]);

            let senders = [api_tx, gw_tx];
            let [first, second] = senders;
            let (failing_tx, other_tx) = if failing == 0 { (first, second) } else { (second, first) };
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(10)).await;
                failing_tx.finish(Err(format!("service {failing} broke"))).await;
            });

            let err = coordinator.supervise(merged).await.unwrap_err();
            assert_eq!(err, format!("service {failing} broke"));
            assert_eq!(coordinator.state(), ShutdownState::ServiceErrored);
            drop(other_tx);
        }
    }

    #[tokio::test]
    async fn clean_close_is_not_an_error() {
        let coordinator = ShutdownCoordinator::new(CancellationSignal::new());
        coordinator.mark_running();

        let (tx, signal) = completion_channel::<String>();
        tx.finish(Ok(())).await;
        assert!(coordinator.supervise(merge([Some(signal)])).await.is_ok());

        coordinator.begin_closing();
        assert_eq!(coordinator.mark_closed(), ShutdownOutcome::Completed);
    }

    #[tokio::test]
    async fn cancellation_is_recorded_and_reported_as_graceful() {
        let cancel = CancellationSignal::new();
        let coordinator = ShutdownCoordinator::new(cancel.clone());
        let watcher = coordinator.watch_cancellation();
        coordinator.mark_running();

        let mut states = coordinator.subscribe();
        cancel.fire();
        tokio::time::timeout(
            Duration::from_secs(1),
            states.wait_for(|s| *s == ShutdownState::CancellationRequested),
        )
        .await
        .unwrap()
        .unwrap();

        coordinator.begin_closing();
        assert_eq!(coordinator.mark_closed(), ShutdownOutcome::Graceful);
        watcher.await.unwrap();
    }

    #[tokio::test]
    async fn watcher_exits_after_teardown_without_cancellation() {
        let coordinator = ShutdownCoordinator::new(CancellationSignal::new());
        let watcher = coordinator.watch_cancellation();

        coordinator.begin_closing();
        coordinator.mark_closed();
        tokio::time::timeout(Duration::from_secs(1), watcher)
            .await
            .unwrap()
            .unwrap();
    }

    #[test]
    fn states_never_move_backwards() {
        let coordinator = ShutdownCoordinator::new(CancellationSignal::new());
        coordinator.begin_closing();
        coordinator.mark_running();
        assert_eq!(coordinator.state(), ShutdownState::Closing);
    }
}
