//! Timer primitives scoped to one sandbox.
//!
//! Every timer observes the sandbox's cancellation token, so discarding the
//! sandbox stops its pending timers.

use std::future::Future;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Handle to a scheduled timeout or interval.
#[derive(Debug)]
pub struct TimerHandle {
    task: JoinHandle<()>,
}

impl TimerHandle {
    /// Cancel the timer. Has no effect once a timeout has fired.
    pub fn clear(&self) {
        self.task.abort();
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

/// Timer surface injected into the sandbox.
#[derive(Debug, Clone, Default)]
pub struct Timers {
    cancel: CancellationToken,
}

impl Timers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Token cancelled when the sandbox is discarded or abandoned.
    pub fn cancellation(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Sleep for `duration`. Returns `false` if the sandbox was discarded first.
    pub async fn sleep(&self, duration: Duration) -> bool {
        tokio::select! {
            () = self.cancel.cancelled() => false,
            () = tokio::time::sleep(duration) => true,
        }
    }

    /// Run `f` once after `delay`.
    pub fn set_timeout<F>(&self, delay: Duration, f: F) -> TimerHandle
    where
        F: FnOnce() + Send + 'static,
    {
        let cancel = self.cancel.clone();
        TimerHandle {
            task: tokio::spawn(async move {
                tokio::select! {
                    () = cancel.cancelled() => {}
                    () = tokio::time::sleep(delay) => f(),
                }
            }),
        }
    }

    /// Run `f` every `period` until cleared or the sandbox is discarded.
    pub fn set_interval<F>(&self, period: Duration, mut f: F) -> TimerHandle
    where
        F: FnMut() + Send + 'static,
    {
        let cancel = self.cancel.clone();
        TimerHandle {
            task: tokio::spawn(async move {
                let mut ticker = tokio::time::interval(period);
                // The first tick completes immediately.
                ticker.tick().await;
                loop {
                    tokio::select! {
                        () = cancel.cancelled() => break,
                        _ = ticker.tick() => f(),
                    }
                }
            }),
        }
    }

    /// Spawn background work that stops with the sandbox.
    pub fn spawn<Fut>(&self, fut: Fut) -> TimerHandle
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let cancel = self.cancel.clone();
        TimerHandle {
            task: tokio::spawn(async move {
                tokio::select! {
                    () = cancel.cancelled() => {}
                    () = fut => {}
                }
            }),
        }
    }

    /// Stop every timer bound to this sandbox.
    pub(crate) fn cancel_all(&self) {
        self.cancel.cancel();
    }
}
