//! External cancellation for in-flight requests and backoff sleeps.
//!
//! 外部取消信号：用于中止进行中的请求以及重试等待。

use std::future::pending;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::Instant;

/// Fires a [`Cancellation`].
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    /// Cancels every clone of the paired [`Cancellation`].
    pub fn cancel(&self) {
        // an error only means nobody is listening any more
        let _ = self.tx.send(true);
    }
}

/// A cancellation signal with an optional deadline.
///
/// 取消信号，可附带截止时间。
#[derive(Debug, Clone, Default)]
pub struct Cancellation {
    signal: Option<watch::Receiver<bool>>,
    deadline: Option<Instant>,
}

impl Cancellation {
    /// A signal that never fires.
    pub fn none() -> Self {
        Self::default()
    }

    /// A signal fired through the returned handle.
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

    /// Also fire at `deadline`.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(match self.deadline {
            Some(existing) => existing.min(deadline),
            None => deadline,
        });
        self
    }

    /// Also fire once `timeout` has elapsed from now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    pub fn is_cancelled(&self) -> bool {
        let signalled = self.signal.as_ref().is_some_and(|rx| *rx.borrow());
        let expired = self.deadline.is_some_and(|d| Instant::now() >= d);
        signalled || expired
    }

    /// Resolves once the signal fires or the deadline passes.
    pub async fn cancelled(&self) {
        let signal = async {
            match &self.signal {
                Some(rx) => {
                    let mut rx = rx.clone();
                    if rx.wait_for(|cancelled| *cancelled).await.is_err() {
                        // handle dropped without cancelling
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
            _ = signal => {}
            _ = deadline => {}
        }
    }
}
