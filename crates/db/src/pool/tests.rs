//! Tests for the connection pool, using an in-memory connector.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::Instant;

use super::{ConnectionPool, Connector, PoolError, PoolOptions};

#[derive(Debug, thiserror::Error)]
#[error("connection refused")]
struct Refused;

#[derive(Debug)]
struct FakeConn {
    serial: usize,
    alive: Arc<AtomicBool>,
}

impl FakeConn {
    fn kill(&self) {
        self.alive.store(false, Ordering::SeqCst);
    }
}

#[derive(Debug, Default)]
struct FakeConnector {
    opened: AtomicUsize,
    closed: AtomicUsize,
    failures_left: AtomicUsize,
    connect_delay: Option<Duration>,
}

impl FakeConnector {
    fn failing(times: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(times),
            ..Self::default()
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            connect_delay: Some(delay),
            ..Self::default()
        }
    }
}

#[async_trait]
impl Connector for Arc<FakeConnector> {
    type Connection = FakeConn;
    type Error = Refused;

    async fn connect(&self) -> Result<FakeConn, Refused> {
        if let Some(delay) = self.connect_delay {
            tokio::time::sleep(delay).await;
        }
        let fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if fail {
            return Err(Refused);
        }
        let serial = self.opened.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(FakeConn {
            serial,
            alive: Arc::new(AtomicBool::new(true)),
        })
    }

    async fn is_valid(&self, conn: &mut FakeConn) -> bool {
        conn.alive.load(Ordering::SeqCst)
    }

    async fn close(&self, _conn: FakeConn) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

fn options(max_size: usize) -> PoolOptions {
    PoolOptions {
        max_size,
        acquire_timeout: Duration::from_secs(5),
        connect_timeout: Duration::from_secs(1),
        connect_attempts: 2,
    }
}

fn pool(max_size: usize) -> (ConnectionPool<Arc<FakeConnector>>, Arc<FakeConnector>) {
    let connector = Arc::new(FakeConnector::default());
    (
        ConnectionPool::new(Arc::clone(&connector), options(max_size)),
        connector,
    )
}

#[tokio::test]
async fn test_acquires_up_to_size_without_blocking() {
    let (pool, connector) = pool(3);

    let mut slots = Vec::new();
    for _ in 0..3 {
        let slot = tokio::time::timeout(Duration::from_millis(50), pool.acquire())
            .await
            .expect("acquire within pool size must not block")
            .unwrap();
        slots.push(slot);
    }

    let status = pool.status();
    assert_eq!(status.leased, 3);
    assert_eq!(status.available, 0);
    assert_eq!(connector.opened.load(Ordering::SeqCst), 3);
}

#[tokio::test(start_paused = true)]
async fn test_extra_acquire_blocks_until_release() {
    let (pool, _) = pool(2);
    let first = pool.acquire().await.unwrap();
    let _second = pool.acquire().await.unwrap();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await.map(|slot| slot.id()) })
    };
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert!(!waiter.is_finished());
    assert_eq!(pool.status().waiting, 1);

    let first_id = first.id();
    pool.release(first);
    assert_eq!(waiter.await.unwrap().unwrap(), first_id);
    assert_eq!(pool.status().waiting, 0);
}

#[tokio::test(start_paused = true)]
async fn test_third_holder_waits_for_a_release() {
    let (pool, _) = pool(2);
    let started = Instant::now();

    let handles: Vec<_> = (0..3)
        .map(|_| {
            let pool = pool.clone();
            tokio::spawn(async move {
                let requested = Instant::now();
                let slot = pool.acquire().await.unwrap();
                let waited = requested.elapsed();
                tokio::time::sleep(Duration::from_millis(100)).await;
                slot.release();
                waited
            })
        })
        .collect();

    let mut waits = Vec::new();
    for handle in futures::future::join_all(handles).await {
        waits.push(handle.unwrap());
    }
    waits.sort();

    assert_eq!(waits[0], Duration::ZERO);
    assert_eq!(waits[1], Duration::ZERO);
    assert!(waits[2] >= Duration::from_millis(100));
    assert!(started.elapsed() >= Duration::from_millis(200));
    assert_eq!(pool.status().leased, 0);
}

#[tokio::test(start_paused = true)]
async fn test_timeout_when_pool_exhausted() {
    let connector = Arc::new(FakeConnector::default());
    let pool = ConnectionPool::new(
        connector,
        PoolOptions {
            acquire_timeout: Duration::from_millis(100),
            ..options(1)
        },
    );
    let _held = pool.acquire().await.unwrap();

    match pool.acquire().await.unwrap_err() {
        PoolError::Timeout { waited } => assert!(waited >= Duration::from_millis(100)),
        other => panic!("expected timeout, got {other:?}"),
    }
    assert_eq!(pool.status().waiting, 0);
}

#[tokio::test]
async fn test_released_connection_is_reused() {
    let (pool, connector) = pool(2);

    let slot = pool.acquire().await.unwrap();
    let id = slot.id();
    slot.release();
    assert_eq!(pool.status().idle, 1);

    let again = pool.acquire().await.unwrap();
    assert_eq!(again.id(), id);
    assert_eq!(connector.opened.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_dead_idle_connection_is_replaced() {
    let (pool, connector) = pool(1);

    let slot = pool.acquire().await.unwrap();
    slot.kill();
    slot.release();

    let fresh = pool.acquire().await.unwrap();
    assert_eq!(fresh.serial, 2);
    assert!(fresh.alive.load(Ordering::SeqCst));
    assert_eq!(connector.closed.load(Ordering::SeqCst), 1);
    assert_eq!(pool.status().leased, 1);
}

#[tokio::test]
async fn test_connection_failing_mid_use_is_discarded() {
    let (pool, connector) = pool(2);

    let mut slot = pool.acquire().await.unwrap();
    slot.kill();
    slot.mark_broken();
    drop(slot);

    let status = pool.status();
    assert_eq!(status.idle, 0);
    assert_eq!(status.leased, 0);
    assert_eq!(status.available, 2);

    let next = pool.acquire().await.unwrap();
    assert!(next.alive.load(Ordering::SeqCst));
    assert_eq!(connector.opened.load(Ordering::SeqCst), 2);

    let _other = pool.acquire().await.unwrap();
    assert_eq!(pool.status().available, 0);
}

#[tokio::test]
async fn test_discard_closes_connection() {
    let (pool, connector) = pool(1);

    let slot = pool.acquire().await.unwrap();
    slot.discard().await;

    assert_eq!(connector.closed.load(Ordering::SeqCst), 1);
    assert_eq!(pool.status().idle, 0);
    assert_eq!(pool.status().available, 1);
}

#[tokio::test]
async fn test_connect_is_retried_once() {
    let connector = Arc::new(FakeConnector::failing(1));
    let pool = ConnectionPool::new(Arc::clone(&connector), options(1));

    let slot = pool.acquire().await.unwrap();
    assert_eq!(slot.serial, 1);
}

#[tokio::test]
async fn test_connect_gives_up_after_attempts() {
    let connector = Arc::new(FakeConnector::failing(5));
    let pool = ConnectionPool::new(Arc::clone(&connector), options(1));

    let err = pool.acquire().await.unwrap_err();
    assert_eq!(
        err,
        PoolError::ConnectionUnavailable {
            attempts: 2,
            message: "connection refused".into(),
        }
    );
    // The slot is handed back for the next caller.
    assert_eq!(pool.status().available, 1);
    assert_eq!(pool.status().leased, 0);
}

#[tokio::test(start_paused = true)]
async fn test_slow_connect_times_out() {
    let connector = Arc::new(FakeConnector::slow(Duration::from_secs(5)));
    let pool = ConnectionPool::new(Arc::clone(&connector), options(1));

    match pool.acquire().await.unwrap_err() {
        PoolError::ConnectionUnavailable { attempts, message } => {
            assert_eq!(attempts, 2);
            assert!(message.contains("timed out"));
        }
        other => panic!("expected unavailable, got {other:?}"),
    }
}

#[tokio::test]
async fn test_no_leak_after_repeated_failures() {
    let (pool, _) = pool(3);

    async fn failing_use(pool: &ConnectionPool<Arc<FakeConnector>>) -> Result<(), &'static str> {
        let _slot = pool.acquire().await.map_err(|_| "acquire")?;
        Err("query failed")
    }

    for _ in 0..100 {
        assert!(failing_use(&pool).await.is_err());
    }

    let status = pool.status();
    assert_eq!(status.leased, 0);
    assert_eq!(status.available, 3);
    assert_eq!(status.idle, 1);
}

#[tokio::test(start_paused = true)]
async fn test_cancelled_acquire_leaks_nothing() {
    let (pool, _) = pool(1);
    let held = pool.acquire().await.unwrap();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await.map(|slot| slot.id()) })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;
    waiter.abort();
    assert!(waiter.await.unwrap_err().is_cancelled());

    drop(held);
    let status = pool.status();
    assert_eq!(status.waiting, 0);
    assert_eq!(status.leased, 0);
    assert_eq!(status.available, 1);
}

#[tokio::test]
async fn test_shutdown_closes_idle_and_rejects_callers() {
    let (pool, connector) = pool(2);
    let idle = pool.acquire().await.unwrap();
    let leased = pool.acquire().await.unwrap();
    idle.release();

    pool.shutdown().await;

    assert_eq!(connector.closed.load(Ordering::SeqCst), 1);
    assert_eq!(pool.acquire().await.unwrap_err(), PoolError::Closed);

    leased.release();
    let status = pool.status();
    assert!(status.closed);
    assert_eq!(status.idle, 0);
    assert_eq!(status.leased, 0);
}

#[tokio::test(start_paused = true)]
async fn test_shutdown_wakes_waiters() {
    let (pool, _) = pool(1);
    let _held = pool.acquire().await.unwrap();

    let waiter = {
        let pool = pool.clone();
        tokio::spawn(async move { pool.acquire().await.map(|slot| slot.id()) })
    };
    tokio::time::sleep(Duration::from_millis(10)).await;

    pool.shutdown().await;
    assert_eq!(waiter.await.unwrap().unwrap_err(), PoolError::Closed);
}

#[test]
#[should_panic(expected = "pool max_size must be > 0")]
fn test_zero_size_panics() {
    let _ = ConnectionPool::new(Arc::new(FakeConnector::default()), options(0));
}
