use std::future::pending;
use std::time::Duration;

use futures::{Stream, StreamExt};
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::warn;

/// A cancellation signal and optional deadline for an update attempt.
///
/// Cloning is cheap; every clone observes the same signal.
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    signal: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

/// Triggers the [`Cancellation`] it was created with.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }

    /// Cancels on the first item of `signals`. Returns true once a second
    /// item arrives, or false if the stream ends first.
    pub async fn cancel_on<S>(self, signals: S) -> bool
    where
        S: Stream<Item = ()>,
    {
        let mut signals = std::pin::pin!(signals);
        if signals.next().await.is_none() {
            return false;
        }
        warn!("interrupt received, cancelling update (interrupt again to exit)");
        self.cancel();
        signals.next().await.is_some()
    }
}

impl Cancellation {
    /// A cancellation that never fires.
    pub fn none() -> Self {
        Self::default()
    }

    /// A cancellation fired through the returned handle.
    pub fn new() -> (CancelHandle, Self) {
        let (tx, rx) = watch::channel(false);
        (
            CancelHandle { tx },
            Self {
                signal: Some(rx),
                deadline: None,
            },
        )
    }

    /// Adds a deadline `timeout` from now.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.deadline = Some(Instant::now() + timeout);
        self
    }

    /// Resolves once the signal fires or the deadline passes, returning
    /// the reason. Never resolves if neither can happen.
    pub async fn cancelled(&self) -> String {
        let signal = async {
            match &self.signal {
                Some(rx) => {
                    let mut rx = rx.clone();
                    // A dropped handle can no longer cancel.
                    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                        pending::<()>().await;
                    }
                }
                None => pending::<()>().await,
            }
        };
        let deadline = async {
            match self.deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => pending::<()>().await,
            }
        };

        tokio::select! {
            _ = signal => "cancellation requested".to_string(),
            _ = deadline => "deadline exceeded".to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_handle_cancels() {
        let (handle, cancel) = Cancellation::new();
        handle.cancel();
        assert_eq!(cancel.cancelled().await, "cancellation requested");
    }

    #[tokio::test]
    async fn test_first_signal_cancels_second_escalates() {
        let (handle, cancel) = Cancellation::new();
        let (tx, rx) = futures::channel::mpsc::unbounded::<()>();
        let watcher = tokio::spawn(handle.cancel_on(rx));

        tx.unbounded_send(()).unwrap();
        assert_eq!(cancel.cancelled().await, "cancellation requested");
        assert!(!watcher.is_finished());

        tx.unbounded_send(()).unwrap();
        assert!(watcher.await.unwrap());
    }

    #[tokio::test]
    async fn test_single_signal_does_not_escalate() {
        let (handle, cancel) = Cancellation::new();

        let escalated = handle.cancel_on(futures::stream::iter([()])).await;

        assert!(!escalated);
        assert_eq!(cancel.cancelled().await, "cancellation requested");
    }

    #[tokio::test(start_paused = true)]
    async fn test_deadline() {
        let start = Instant::now();
        let cancel = Cancellation::none().with_timeout(Duration::from_secs(30));

        assert_eq!(cancel.cancelled().await, "deadline exceeded");
        assert!(start.elapsed() >= Duration::from_secs(30));
    }

    #[tokio::test(start_paused = true)]
    async fn test_dropped_handle_never_fires() {
        let (handle, cancel) = Cancellation::new();
        drop(handle);

        let fired = tokio::time::timeout(Duration::from_secs(60), cancel.cancelled()).await;
        assert!(fired.is_err());
    }
}
