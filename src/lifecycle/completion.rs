//! Completion signals and fan-in.
//!
//! A [`CompletionSignal`] is the read side of a service's termination
//! channel: zero or more values, then closure once the producer is gone.
//! [`merge`] combines any number of them into one.

use tokio::sync::mpsc;

/// Capacity of completion channels. Producers send at most a handful of
/// values, so sends never wait in practice.
const COMPLETION_BUFFER: usize = 16;

/// Read-only stream of values that closes when its producer terminates.
#[derive(Debug)]
pub struct CompletionSignal<T> {
    rx: mpsc::Receiver<T>,
}

/// Write side of a [`CompletionSignal`].
#[derive(Debug)]
pub struct CompletionSender<T> {
    tx: mpsc::Sender<T>,
}

/// Create a connected sender/signal pair.
pub fn completion_channel<T>() -> (CompletionSender<T>, CompletionSignal<T>) {
    let (tx, rx) = mpsc::channel(COMPLETION_BUFFER);
    (CompletionSender { tx }, CompletionSignal { rx })
}

impl<T> CompletionSender<T> {
    /// Push a value. Returns `false` if the signal has been dropped.
    pub async fn report(&self, value: T) -> bool {
        self.tx.send(value).await.is_ok()
    }

    /// Deliver the producer's terminal result and close the signal.
    ///
    /// An error is pushed as the final value; a clean exit only closes.
    pub async fn finish(self, result: Result<(), T>) {
        if let Err(value) = result {
            let _ = self.tx.send(value).await;
        }
    }
}

impl<T> CompletionSignal<T> {
    /// A signal that is already closed and carries no values.
    pub fn closed() -> Self {
        let (_, signal) = completion_channel();
        signal
    }

    /// Wait for the next value, or `None` once the signal has closed.
    pub async fn recv(&mut self) -> Option<T> {
        self.rx.recv().await
    }

    /// Drain every remaining value until the signal closes.
    pub async fn collect(mut self) -> Vec<T> {
        let mut values = Vec::new();
        while let Some(value) = self.rx.recv().await {
            values.push(value);
        }
        values
    }
}

/// Fan-in: combine many completion signals into one.
///
/// One forwarding task per present input copies its values to the output
/// until the input closes. Every forwarding task holds a clone of the output
/// sender, so the output closes exactly when the last of them finishes.
/// `None` inputs are skipped; with no inputs at all the output is closed
/// immediately. Values from different inputs may interleave in any order.
///
/// Must be called within a Tokio runtime.
pub fn merge<T, I>(signals: I) -> CompletionSignal<T>
where
    T: Send + 'static,
    I: IntoIterator<Item = Option<CompletionSignal<T>>>,
{
    let (tx, rx) = mpsc::channel(COMPLETION_BUFFER);
    let mut inputs = 0usize;

    for mut signal in signals.into_iter().flatten() {
        inputs += 1;
        let tx = tx.clone();
        tokio::spawn(async move {
            while let Some(value) = signal.recv().await {
                if tx.send(value).await.is_err() {
                    // consumer went away
                    break;
                }
            }
        });
    }

    tracing::trace!(inputs, "Merging completion signals");
    CompletionSignal { rx }
}
