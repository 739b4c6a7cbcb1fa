//! Process-wide cooperative cancellation
//!
//! Every long-running task holds a clone of the same [`Shutdown`] token and
//! races its suspension points against [`Shutdown::cancelled`].

use std::sync::Arc;

use tokio::sync::watch;

/// Cloneable cancellation token backed by a watch channel
#[derive(Debug, Clone)]
pub struct Shutdown {
    tx: Arc<watch::Sender<bool>>,
    rx: watch::Receiver<bool>,
}

impl Shutdown {
    pub fn new() -> Self {
        let (tx, rx) = watch::channel(false);
        Self {
            tx: Arc::new(tx),
            rx,
        }
    }

    /// Signal every holder of this token
    pub fn cancel(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolve once [`Shutdown::cancel`] has been called
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        // Sender is kept alive by `self`
        let _ = rx.wait_for(|cancelled| *cancelled).await;
    }
}

impl Default for Shutdown {
    fn default() -> Self {
        Self::new()
    }
}
