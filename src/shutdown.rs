//! Process-wide cooperative cancellation.
//!
//! One [`Shutdown`] fires, every [`ShutdownListener`] clone observes it.

use tokio::sync::watch;
use tracing::info;

pub struct Shutdown {
    tx: watch::Sender<bool>,
}

#[derive(Clone, Debug)]
pub struct ShutdownListener {
    rx: watch::Receiver<bool>,
}

pub fn channel() -> (Shutdown, ShutdownListener) {
    let (tx, rx) = watch::channel(false);
    (Shutdown { tx }, ShutdownListener { rx })
}

impl Shutdown {
    pub fn subscribe(&self) -> ShutdownListener {
        ShutdownListener {
            rx: self.tx.subscribe(),
        }
    }

    /// Fire the signal. Repeated calls are no-ops.
    pub fn trigger(&self) {
        let fired = self.tx.send_if_modified(|cancelled| {
            if *cancelled {
                false
            } else {
                *cancelled = true;
                true
            }
        });
        if fired {
            info!("shutdown signalled");
        }
    }

    pub fn is_triggered(&self) -> bool {
        *self.tx.borrow()
    }
}

impl ShutdownListener {
    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    /// Resolves once the signal has fired (immediately if it already has).
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            let fired = *rx.borrow_and_update();
            if fired {
                return;
            }
            // A dropped `Shutdown` counts as fired.
            if rx.changed().await.is_err() {
                return;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn starts_not_cancelled() {
        let (shutdown, listener) = channel();
        assert!(!listener.is_cancelled());
        assert!(!shutdown.is_triggered());
    }

    #[tokio::test]
    async fn trigger_reaches_every_clone() {
        let (shutdown, listener) = channel();
        let other = listener.clone();
        let late = shutdown.subscribe();

        shutdown.trigger();
        shutdown.trigger();

        assert!(listener.is_cancelled());
        assert!(other.is_cancelled());
        assert!(late.is_cancelled());
        tokio::time::timeout(Duration::from_secs(1), late.cancelled())
            .await
            .expect("cancelled() should resolve after trigger");
    }

    #[tokio::test]
    async fn dropping_sender_releases_waiters() {
        let (shutdown, listener) = channel();
        drop(shutdown);
        tokio::time::timeout(Duration::from_secs(1), listener.cancelled())
            .await
            .expect("waiters must not hang once the sender is gone");
    }
}
