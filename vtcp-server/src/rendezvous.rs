//! Blocking waits for connect, accept and recv.
//!
//! A waiter re-runs its check whenever the registry signals a change, and at
//! least once per poll interval. Every cycle re-checks the running flag and
//! the shutdown channel, so shutdown releases all waiters within one
//! interval.

use crate::error::ServerError;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, Notify};
use tokio::time::Instant;
use vtcp_core::CoreError;

/// Change notification and wait policy shared by all handlers.
pub struct Rendezvous {
    changed: Notify,
    poll_interval: Duration,
    timeout: Option<Duration>,
    running: Arc<AtomicBool>,
}

impl Rendezvous {
    pub fn new(poll_interval: Duration, timeout: Option<Duration>, running: Arc<AtomicBool>) -> Self {
        Self {
            changed: Notify::new(),
            poll_interval,
            timeout,
            running,
        }
    }

    /// Wakes every waiter so it re-runs its check.
    pub fn notify(&self) {
        self.changed.notify_waiters();
    }

    /// Runs `check` until it yields a value.
    ///
    /// Errors from `check` are returned immediately. Without a configured
    /// timeout this only stops on success, error or shutdown.
    pub async fn wait_for<T, F>(
        &self,
        shutdown: &mut broadcast::Receiver<()>,
        mut check: F,
    ) -> Result<T, ServerError>
    where
        F: FnMut() -> Result<Option<T>, CoreError>,
    {
        let deadline = self.timeout.map(|t| Instant::now() + t);

        loop {
            if !self.running.load(Ordering::SeqCst) {
                return Err(ServerError::ShuttingDown);
            }

            // Register before checking so a change between the check and the
            // await is not missed.
            let notified = self.changed.notified();
            tokio::pin!(notified);
            notified.as_mut().enable();

            if let Some(value) = check()? {
                return Ok(value);
            }

            let sleep_for = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return Err(ServerError::RendezvousTimeout);
                    }
                    self.poll_interval.min(deadline - now)
                }
                None => self.poll_interval,
            };

            tokio::select! {
                _ = &mut notified => {}
                _ = tokio::time::sleep(sleep_for) => {}
                _ = shutdown.recv() => return Err(ServerError::ShuttingDown),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    fn rendezvous(timeout: Option<Duration>) -> (Arc<Rendezvous>, Arc<AtomicBool>) {
        let running = Arc::new(AtomicBool::new(true));
        let r = Rendezvous::new(Duration::from_millis(20), timeout, running.clone());
        (Arc::new(r), running)
    }

    #[tokio::test]
    async fn test_ready_immediately() {
        let (r, _running) = rendezvous(None);
        let (_tx, mut rx) = broadcast::channel(1);
        let value = r.wait_for(&mut rx, || Ok(Some(7))).await.unwrap();
        assert_eq!(value, 7);
    }

    #[tokio::test]
    async fn test_check_error_is_returned() {
        let (r, _running) = rendezvous(None);
        let (_tx, mut rx) = broadcast::channel(1);
        let result: Result<(), _> = r
            .wait_for(&mut rx, || Err(CoreError::InvalidHandle { handle: 1, len: 0 }))
            .await;
        assert!(matches!(result, Err(ServerError::Core(_))));
    }

    #[tokio::test]
    async fn test_polls_until_ready() {
        let (r, _running) = rendezvous(None);
        let (_tx, mut rx) = broadcast::channel(1);
        let calls = AtomicUsize::new(0);

        let value = r
            .wait_for(&mut rx, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                Ok(if n >= 3 { Some(n) } else { None })
            })
            .await
            .unwrap();
        assert_eq!(value, 3);
    }

    #[tokio::test]
    async fn test_notify_wakes_waiter() {
        let (r, _running) = rendezvous(None);
        let flag = Arc::new(AtomicBool::new(false));

        let waiter = {
            let r = r.clone();
            let flag = flag.clone();
            tokio::spawn(async move {
                let (_tx, mut rx) = broadcast::channel::<()>(1);
                r.wait_for(&mut rx, || Ok(flag.load(Ordering::SeqCst).then_some(())))
                    .await
            })
        };

        tokio::time::sleep(Duration::from_millis(5)).await;
        flag.store(true, Ordering::SeqCst);
        r.notify();

        waiter.await.unwrap().unwrap();
    }

    #[tokio::test]
    async fn test_timeout() {
        let (r, _running) = rendezvous(Some(Duration::from_millis(50)));
        let (_tx, mut rx) = broadcast::channel(1);
        let result: Result<(), _> = r.wait_for(&mut rx, || Ok(None)).await;
        assert!(matches!(result, Err(ServerError::RendezvousTimeout)));
    }

    #[tokio::test]
    async fn test_shutdown_signal_releases_waiter() {
        let (r, _running) = rendezvous(None);
        let (tx, mut rx) = broadcast::channel(1);

        let waiter = {
            let r = r.clone();
            tokio::spawn(async move { r.wait_for(&mut rx, || Ok(None::<()>)).await })
        };

        tokio::time::sleep(Duration::from_millis(5)).await;
        tx.send(()).unwrap();

        let result = waiter.await.unwrap();
        assert!(matches!(result, Err(ServerError::ShuttingDown)));
    }

    #[tokio::test]
    async fn test_running_flag_checked_each_cycle() {
        let (r, running) = rendezvous(None);
        let (_tx, mut rx) = broadcast::channel(1);

        let waiter = {
            let r = r.clone();
            tokio::spawn(async move { r.wait_for(&mut rx, || Ok(None::<()>)).await })
        };

        tokio::time::sleep(Duration::from_millis(5)).await;
        running.store(false, Ordering::SeqCst);

        let result = tokio::time::timeout(Duration::from_secs(1), waiter)
            .await
            .unwrap()
            .unwrap();
        assert!(matches!(result, Err(ServerError::ShuttingDown)));
    }
}
