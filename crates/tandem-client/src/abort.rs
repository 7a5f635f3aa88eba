//! Cooperative cancellation.
//!
//! An [`AbortController`] owns the right to cancel; the [`AbortSignal`]s it
//! hands out let a transport observe the cancellation and tear down the
//! network call. Aborting is sticky and idempotent.

use std::future::Future;
use std::sync::Arc;

use tandem_common::RpcError;
use tokio::sync::watch;

#[derive(Debug, Clone)]
pub struct AbortController {
    tx: Arc<watch::Sender<bool>>,
}

impl AbortController {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(false);
        Self { tx: Arc::new(tx) }
    }

    pub fn signal(&self) -> AbortSignal {
        AbortSignal {
            rx: self.tx.subscribe(),
        }
    }

    /// Marks the controller as aborted and wakes every waiting signal.
    pub fn abort(&self) {
        self.tx.send_replace(true);
    }

    pub fn is_aborted(&self) -> bool {
        *self.tx.borrow()
    }
}

impl Default for AbortController {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct AbortSignal {
    rx: watch::Receiver<bool>,
}

impl AbortSignal {
    /// A signal that never fires.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_aborted(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the owning controller aborts.
    ///
    /// If the controller is dropped without aborting, this never resolves.
    pub async fn aborted(&self) {
        let mut rx = self.rx.clone();
        if rx.wait_for(|aborted| *aborted).await.is_err() {
            std::future::pending::<()>().await;
        }
    }

    /// Runs `work` until it completes or the signal fires, whichever is first.
    ///
    /// Losing the race drops `work`, which cancels any I/O it was awaiting.
    pub async fn guard<T, F>(&self, work: F) -> Result<T, RpcError>
    where
        F: Future<Output = Result<T, RpcError>>,
    {
        if self.is_aborted() {
            return Err(RpcError::aborted());
        }

        tokio::select! {
            biased;
            _ = self.aborted() => Err(RpcError::aborted()),
            result = work => result,
        }
    }
}
