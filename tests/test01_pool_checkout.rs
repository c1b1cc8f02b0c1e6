use std::sync::{Arc, Mutex};
use std::time::Duration;

use ifx_middleware::test_utils::HarnessDriver;
use ifx_middleware::{ConnectParams, IfxMiddlewareError, Pool, PoolOptions};

fn test_pool(max_size: usize, timeout_ms: u64) -> (Arc<HarnessDriver>, Pool) {
    let driver = Arc::new(HarnessDriver::new());
    let pool = Pool::new(
        driver.clone(),
        ConnectParams::new("test@informixoltp_tcp", "informix", "1nf0rm1x"),
        PoolOptions::new(max_size).with_acquire_timeout(Duration::from_millis(timeout_ms)),
    );
    (driver, pool)
}

#[tokio::test]
async fn saturated_pool_times_out_the_extra_acquire() {
    let (_driver, pool) = test_pool(2, 100);

    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    assert_ne!(a.id(), b.id());

    let err = pool.acquire().await.unwrap_err();
    assert!(matches!(err, IfxMiddlewareError::PoolExhausted(_)));
}

#[tokio::test]
async fn release_wakes_waiters_first_come_first_served() {
    let (_driver, pool) = test_pool(1, 2_000);
    let held = pool.acquire().await.unwrap();

    let order = Arc::new(Mutex::new(Vec::new()));

    let pool1 = pool.clone();
    let order1 = Arc::clone(&order);
    let waiter1 = tokio::spawn(async move {
        let conn = pool1.acquire().await.unwrap();
        order1.lock().unwrap().push(1);
        pool1.release(conn).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let pool2 = pool.clone();
    let order2 = Arc::clone(&order);
    let waiter2 = tokio::spawn(async move {
        let conn = pool2.acquire().await.unwrap();
        order2.lock().unwrap().push(2);
        pool2.release(conn).await;
    });
    tokio::time::sleep(Duration::from_millis(50)).await;

    pool.release(held).await;
    waiter1.await.unwrap();
    waiter2.await.unwrap();

    assert_eq!(*order.lock().unwrap(), vec![1, 2]);
}

#[tokio::test]
async fn pool_of_one_hands_the_released_connection_to_the_waiter() {
    let (_driver, pool) = test_pool(1, 2_000);

    let conn = pool.acquire().await.unwrap();
    let held_id = conn.id().to_owned();
    assert_eq!(conn.index(), 0);

    let pool2 = pool.clone();
    let waiter = tokio::spawn(async move { pool2.acquire().await.unwrap() });
    tokio::time::sleep(Duration::from_millis(50)).await;

    pool.release(conn).await;
    let handed = waiter.await.unwrap();
    assert_eq!(handed.id(), held_id);
}

#[tokio::test]
async fn connect_failure_surfaces_to_the_triggering_acquire_only() {
    let (driver, pool) = test_pool(1, 100);
    driver.fail_next_connect(-951, "Incorrect password or user is not known on the database server.");

    let err = pool.acquire().await.unwrap_err();
    match err {
        IfxMiddlewareError::ConnectionError(native) => {
            assert_eq!(native.sqlcode, -951);
            assert!(native.to_string().starts_with("[-951]"));
        }
        other => panic!("expected ConnectionError, got {other:?}"),
    }

    // The slot was returned; a later acquire retries and succeeds.
    let conn = pool.acquire().await.unwrap();
    assert_eq!(conn.index(), 0);
    assert_eq!(driver.connection_count(), 1);
}

#[tokio::test]
async fn grow_failure_wakes_a_queued_waiter_to_retry() {
    let (driver, pool) = test_pool(1, 2_000);
    driver.delay_connects(Duration::from_millis(100));
    driver.fail_next_connect(-908, "Attempt to connect to database server failed.");

    // First caller triggers growth; its connect is in flight and will fail.
    let pool1 = pool.clone();
    let loser = tokio::spawn(async move { pool1.acquire().await });
    tokio::time::sleep(Duration::from_millis(20)).await;

    // Second caller queues as a waiter while the pool is nominally full.
    // The failed grow frees the slot and must wake it to retry, well before
    // its full acquisition timeout.
    let conn = pool.acquire().await.unwrap();
    assert_eq!(conn.index(), 0);

    let err = loser.await.unwrap().unwrap_err();
    assert!(matches!(err, IfxMiddlewareError::ConnectionError(_)));
    assert_eq!(driver.connection_count(), 1);
}

#[tokio::test]
async fn connections_are_reused_across_checkout_cycles() {
    let (driver, pool) = test_pool(3, 100);

    for _ in 0..4 {
        let conn = pool.acquire().await.unwrap();
        pool.release(conn).await;
    }
    assert_eq!(driver.connection_count(), 1);
}
