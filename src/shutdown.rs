//! Graceful shutdown on SIGTERM or Ctrl-C.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::Notify;
use tracing::{info, warn};

#[derive(Debug, Default)]
struct Inner {
    terminate: AtomicBool,
    notify: Notify,
}

/// Shared flag set once the process has been asked to stop.
#[derive(Debug, Clone, Default)]
pub struct ShutdownFlag {
    inner: Arc<Inner>,
}

impl ShutdownFlag {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a flag that is set by SIGTERM or Ctrl-C.
    ///
    /// Must be called from within a tokio runtime.
    pub fn install() -> Self {
        let flag = Self::new();
        let listener = flag.clone();
        tokio::spawn(async move {
            wait_for_signal().await;
            listener.trigger();
        });
        flag
    }

    pub fn trigger(&self) {
        if !self.inner.terminate.swap(true, Ordering::SeqCst) {
            info!("Shutdown requested");
        }
        self.inner.notify.notify_waiters();
    }

    pub fn is_set(&self) -> bool {
        self.inner.terminate.load(Ordering::SeqCst)
    }

    /// Resolves once the flag is set.
    pub async fn wait(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_set() {
                return;
            }
            notified.await;
        }
    }
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = sigterm.recv() => {}
                _ = tokio::signal::ctrl_c() => {}
            }
        }
        Err(e) => {
            warn!(error = %e, "Failed to install SIGTERM handler, listening for Ctrl-C only");
            let _ = tokio::signal::ctrl_c().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    let _ = tokio::signal::ctrl_c().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_starts_unset() {
        assert!(!ShutdownFlag::new().is_set());
    }

    #[test]
    fn test_trigger_is_shared_between_clones() {
        let flag = ShutdownFlag::new();
        let other = flag.clone();
        other.trigger();
        assert!(flag.is_set());
    }

    #[tokio::test]
    async fn test_wait_returns_after_trigger() {
        let flag = ShutdownFlag::new();
        let waiter = flag.clone();
        let task = tokio::spawn(async move { waiter.wait().await });

        tokio::time::sleep(Duration::from_millis(10)).await;
        flag.trigger();

        tokio::time::timeout(Duration::from_secs(1), task)
            .await
            .expect("wait did not return")
            .unwrap();
    }

    #[tokio::test]
    async fn test_wait_returns_immediately_when_already_set() {
        let flag = ShutdownFlag::new();
        flag.trigger();
        tokio::time::timeout(Duration::from_millis(100), flag.wait())
            .await
            .unwrap();
    }
}
