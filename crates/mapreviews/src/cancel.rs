// Copyright 2026 Mapreviews Contributors
// SPDX-License-Identifier: Apache-2.0

//! Cooperative cancellation over a `watch` channel.

use std::time::Duration;
use tokio::sync::watch;

/// Caller side: flips the flag.
#[derive(Debug)]
pub struct CancelHandle {
    tx: watch::Sender<bool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        let _ = self.tx.send(true);
    }
}

/// Engine side: checked at job boundaries, between loader attempts and
/// during every pause.
#[derive(Debug, Clone)]
pub struct CancelToken {
    rx: watch::Receiver<bool>,
}

/// Marker returned when a wait was interrupted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Cancelled;

pub fn cancel_pair() -> (CancelHandle, CancelToken) {
    let (tx, rx) = watch::channel(false);
    (CancelHandle { tx }, CancelToken { rx })
}

impl CancelToken {
    /// A token that is never cancelled.
    pub fn never() -> Self {
        let (_tx, rx) = watch::channel(false);
        Self { rx }
    }

    pub fn is_cancelled(&self) -> bool {
        *self.rx.borrow()
    }

    pub fn check(&self) -> Result<(), Cancelled> {
        if self.is_cancelled() {
            Err(Cancelled)
        } else {
            Ok(())
        }
    }

    /// Resolves once cancellation is requested; pends forever otherwise.
    pub async fn cancelled(&self) {
        let mut rx = self.rx.clone();
        loop {
            if *rx.borrow_and_update() {
                return;
            }
            if rx.changed().await.is_err() {
                std::future::pending::<()>().await;
            }
        }
    }

    /// Sleep for `duration` unless cancelled first.
    pub async fn sleep(&self, duration: Duration) -> Result<(), Cancelled> {
        self.check()?;
        if duration.is_zero() {
            return Ok(());
        }
        tokio::select! {
            _ = tokio::time::sleep(duration) => Ok(()),
            _ = self.cancelled() => Err(Cancelled),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn test_sleep_completes() {
        let token = CancelToken::never();
        assert_eq!(token.sleep(Duration::from_secs(60)).await, Ok(()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_interrupts_sleep() {
        let (handle, token) = cancel_pair();
        let waiter = tokio::spawn(async move { token.sleep(Duration::from_secs(3600)).await });
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.cancel();
        assert_eq!(waiter.await.unwrap(), Err(Cancelled));
    }

    #[test]
    fn test_check() {
        let (handle, token) = cancel_pair();
        assert!(token.check().is_ok());
        handle.cancel();
        assert_eq!(token.check(), Err(Cancelled));
        assert!(token.clone().is_cancelled());
    }
}
