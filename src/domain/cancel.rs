//! Cooperative cancellation
//!
//! A [`Cancellation`] observes the same `watch` shutdown channel the CLI
//! flips on Ctrl-C/SIGTERM. Every store call is raced against it.

use tokio::sync::watch;

/// Caller-supplied cancellation signal
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    signal: Option<watch::Receiver<bool>>,
}

impl Cancellation {
    /// A signal that never fires
    pub fn none() -> Self {
        Self { signal: None }
    }

    /// Observes a shutdown channel; `true` means cancelled
    pub fn new(signal: watch::Receiver<bool>) -> Self {
        Self {
            signal: Some(signal),
        }
    }

    /// Creates a linked sender and cancellation pair
    pub fn channel() -> (watch::Sender<bool>, Self) {
        let (tx, rx) = watch::channel(false);
        (tx, Self::new(rx))
    }

    /// Whether cancellation has been requested
    pub fn is_cancelled(&self) -> bool {
        self.signal.as_ref().is_some_and(|rx| *rx.borrow())
    }

    /// Resolves once cancellation is requested
    ///
    /// Never resolves for [`Cancellation::none`], or when the sender is
    /// dropped without having signalled.
    pub async fn cancelled(&self) {
        let Some(rx) = &self.signal else {
            return std::future::pending().await;
        };

        let mut rx = rx.clone();
        if rx.wait_for(|cancelled| *cancelled).await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}
