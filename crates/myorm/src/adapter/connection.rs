//! Lazily opened, mutex-guarded connection cell shared by all backends.

use crate::config::RetryPolicy;
use crate::error::{OrmError, OrmResult};
use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use tokio::sync::{MappedMutexGuard, Mutex, MutexGuard};

/// Snapshot of a connection's lifecycle counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConnectionStats {
    /// Successful opens.
    pub connects: u64,
    /// Open attempts that failed (each retry counts).
    pub failed_attempts: u64,
    /// Connections released through `close()` or replaced by `open()`.
    pub closes: u64,
    /// Whether a connection is currently held.
    pub connected: bool,
}

/// Holds at most one connection of type `C`.
///
/// Opening, closing and every use of the connection happen under the same mutex, so
/// concurrent callers of one adapter are serialized.
pub struct ConnectionSlot<C> {
    adapter: String,
    retry: RetryPolicy,
    conn: Mutex<Option<C>>,
    init_done: AtomicBool,
    connected: AtomicBool,
    connects: AtomicU64,
    failed_attempts: AtomicU64,
    closes: AtomicU64,
}

impl<C: Send> ConnectionSlot<C> {
    pub fn new(adapter: impl Into<String>, retry: RetryPolicy) -> Self {
        Self {
            adapter: adapter.into(),
            retry,
            conn: Mutex::new(None),
            init_done: AtomicBool::new(false),
            connected: AtomicBool::new(false),
            connects: AtomicU64::new(0),
            failed_attempts: AtomicU64::new(0),
            closes: AtomicU64::new(0),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    pub fn init_done(&self) -> bool {
        self.init_done.load(Ordering::Acquire)
    }

    pub fn stats(&self) -> ConnectionStats {
        ConnectionStats {
            connects: self.connects.load(Ordering::Relaxed),
            failed_attempts: self.failed_attempts.load(Ordering::Relaxed),
            closes: self.closes.load(Ordering::Relaxed),
            connected: self.connected.load(Ordering::Relaxed),
        }
    }

    /// Lock the cached connection, opening it first if there is none.
    pub async fn acquire<F, Fut>(&self, open: F) -> OrmResult<MappedMutexGuard<'_, C>>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = OrmResult<C>>,
    {
        let mut guard = self.conn.lock().await;
        if guard.is_none() {
            *guard = Some(self.open_with_retry(&open).await?);
        }
        MutexGuard::try_map(guard, Option::as_mut)
            .map_err(|_| OrmError::connection(format!("adapter \"{}\": no connection", self.adapter)))
    }

    /// Open a new connection, handing any existing one to `close` first.
    pub async fn reopen<F, Fut, G, GFut>(&self, open: F, close: G) -> OrmResult<()>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = OrmResult<C>>,
        G: FnOnce(C) -> GFut,
        GFut: Future<Output = OrmResult<()>>,
    {
        let mut guard = self.conn.lock().await;
        if let Some(old) = guard.take() {
            self.release(old, close).await?;
        }
        *guard = Some(self.open_with_retry(&open).await?);
        Ok(())
    }

    /// Take the connection out and hand it to `close`. No-op when nothing is open.
    pub async fn close<G, GFut>(&self, close: G) -> OrmResult<()>
    where
        G: FnOnce(C) -> GFut,
        GFut: Future<Output = OrmResult<()>>,
    {
        let mut guard = self.conn.lock().await;
        match guard.take() {
            Some(conn) => self.release(conn, close).await,
            None => Ok(()),
        }
    }

    async fn release<G, GFut>(&self, conn: C, close: G) -> OrmResult<()>
    where
        G: FnOnce(C) -> GFut,
        GFut: Future<Output = OrmResult<()>>,
    {
        self.init_done.store(false, Ordering::Release);
        self.connected.store(false, Ordering::Relaxed);
        self.closes.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(target: "myorm.adapter", adapter = %self.adapter, "closing connection");
        close(conn).await
    }

    async fn open_with_retry<F, Fut>(&self, open: &F) -> OrmResult<C>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = OrmResult<C>>,
    {
        let attempts = self.retry.attempts();
        let mut last_error = None;

        for attempt in 1..=attempts {
            match open().await {
                Ok(conn) => {
                    self.connects.fetch_add(1, Ordering::Relaxed);
                    self.connected.store(true, Ordering::Relaxed);
                    self.init_done.store(true, Ordering::Release);
                    tracing::debug!(
                        target: "myorm.adapter",
                        adapter = %self.adapter,
                        attempt,
                        "connection opened"
                    );
                    return Ok(conn);
                }
                Err(err) => {
                    self.failed_attempts.fetch_add(1, Ordering::Relaxed);
                    tracing::warn!(
                        target: "myorm.adapter",
                        adapter = %self.adapter,
                        attempt,
                        max_attempts = attempts,
                        error = %err,
                        "error during db connection"
                    );
                    last_error = Some(err);
                    if attempt < attempts && !self.retry.delay.is_zero() {
                        tokio::time::sleep(self.retry.delay).await;
                    }
                }
            }
        }

        let last = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempt made".to_string());
        tracing::error!(
            target: "myorm.adapter",
            adapter = %self.adapter,
            attempts,
            "giving up on connection"
        );
        Err(OrmError::connection(format!(
            "adapter \"{}\": could not connect after {attempts} attempt(s): {last}",
            self.adapter
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::AtomicU32;
    use std::time::Duration;

    fn slot(attempts: u32) -> ConnectionSlot<u32> {
        ConnectionSlot::new("test", RetryPolicy::new(attempts, Duration::ZERO))
    }

    #[tokio::test]
    async fn opens_lazily_once() {
        let slot = slot(1);
        let opens = AtomicU32::new(0);
        let open = || async {
            Ok(opens.fetch_add(1, Ordering::SeqCst) + 100)
        };

        assert!(!slot.stats().connected);
        assert_eq!(*slot.acquire(open).await.unwrap(), 100);
        assert_eq!(*slot.acquire(open).await.unwrap(), 100);
        assert_eq!(opens.load(Ordering::SeqCst), 1);
        assert!(slot.init_done());
        assert_eq!(slot.stats().connects, 1);
    }

    #[tokio::test]
    async fn retries_are_bounded_and_counted() {
        let slot = slot(3);
        let calls = AtomicU32::new(0);
        let err = slot
            .acquire(|| async {
                calls.fetch_add(1, Ordering::SeqCst);
                Err::<u32, _>(OrmError::connection("refused"))
            })
            .await
            .unwrap_err();

        assert!(err.is_connection());
        assert!(err.to_string().contains("3 attempt(s)"));
        assert!(err.to_string().contains("refused"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let stats = slot.stats();
        assert_eq!(stats.failed_attempts, 3);
        assert_eq!(stats.connects, 0);
        assert!(!slot.init_done());
    }

    #[tokio::test]
    async fn recovers_on_a_later_attempt() {
        let slot = slot(3);
        let calls = AtomicU32::new(0);
        let open = || async {
            if calls.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(OrmError::connection("not yet"))
            } else {
                Ok(7)
            }
        };
        assert_eq!(*slot.acquire(open).await.unwrap(), 7);
        assert_eq!(slot.stats().failed_attempts, 1);
        assert_eq!(slot.stats().connects, 1);
    }

    #[tokio::test]
    async fn close_is_idempotent() {
        let slot = slot(1);
        let closed = Arc::new(AtomicU32::new(0));

        let c = closed.clone();
        slot.close(move |_| async move {
            c.fetch_add(1, Ordering::SeqCst);
            Ok(())
        })
        .await
        .unwrap();
        assert_eq!(closed.load(Ordering::SeqCst), 0);

        drop(slot.acquire(|| async { Ok(1) }).await.unwrap());
        for _ in 0..2 {
            let c = closed.clone();
            slot.close(move |_| async move {
                c.fetch_add(1, Ordering::SeqCst);
                Ok(())
            })
            .await
            .unwrap();
        }
        assert_eq!(closed.load(Ordering::SeqCst), 1);
        assert!(!slot.init_done());
        assert!(!slot.stats().connected);
        assert_eq!(slot.stats().closes, 1);
    }

    #[tokio::test]
    async fn reopen_replaces_connection() {
        let slot = slot(1);
        drop(slot.acquire(|| async { Ok(1) }).await.unwrap());
        slot.reopen(|| async { Ok(2) }, |_| async { Ok(()) })
            .await
            .unwrap();
        assert_eq!(*slot.acquire(|| async { Ok(3) }).await.unwrap(), 2);
        assert_eq!(slot.stats().connects, 2);
        assert_eq!(slot.stats().closes, 1);
    }
}
