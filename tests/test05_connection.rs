use std::sync::Arc;
use std::time::Duration;

use ifx_middleware::connection::Connection;
use ifx_middleware::test_utils::HarnessDriver;
use ifx_middleware::{ConnectParams, IfxMiddlewareError, Pool, PoolOptions};

fn params() -> ConnectParams {
    ConnectParams::new("test@informixoltp_tcp", "informix", "1nf0rm1x")
}

#[tokio::test]
async fn pooled_connections_report_their_slot_index() {
    let driver = Arc::new(HarnessDriver::new());
    let pool = Pool::new(
        driver.clone(),
        params(),
        PoolOptions::new(2).with_acquire_timeout(Duration::from_millis(100)),
    );

    let a = pool.acquire().await.unwrap();
    let b = pool.acquire().await.unwrap();
    assert_eq!(a.index(), 0);
    assert_eq!(b.index(), 1);
}

#[tokio::test]
async fn unpooled_connection_reports_minus_one_and_release_is_a_noop() {
    let driver = Arc::new(HarnessDriver::new());
    let conn = Connection::new(driver.clone());
    assert_eq!(conn.index(), -1);

    conn.connect(&params()).await.unwrap();
    conn.release().await;

    // Still usable after the no-op release.
    let stmt = conn.prepare("select count(*) from systables").await.unwrap();
    stmt.free().await.unwrap();
}

#[tokio::test]
async fn prepare_before_connect_is_rejected() {
    let driver = Arc::new(HarnessDriver::new());
    let conn = Connection::new(driver.clone());

    assert!(matches!(
        conn.prepare("select count(*) from systables").await.unwrap_err(),
        IfxMiddlewareError::NotConnected
    ));
}

#[tokio::test]
async fn connect_writes_the_server_target_before_the_session_opens() {
    let driver = Arc::new(HarnessDriver::new());
    let conn = Connection::new(driver.clone());

    conn.connect(&params().with_server("informixoltp_tcp"))
        .await
        .unwrap();
    assert_eq!(driver.server().as_deref(), Some("informixoltp_tcp"));
}

#[tokio::test]
async fn connect_is_idempotent_for_an_established_session() {
    let driver = Arc::new(HarnessDriver::new());
    let conn = Connection::new(driver.clone());

    conn.connect(&params()).await.unwrap();
    conn.connect(&params()).await.unwrap();
    assert_eq!(driver.connection_count(), 1);
}

#[tokio::test]
async fn racing_connects_issue_a_single_driver_connect() {
    let driver = Arc::new(HarnessDriver::new());
    driver.delay_connects(Duration::from_millis(50));
    let conn = Connection::new(driver.clone());

    let racer = Arc::clone(&conn);
    let task = tokio::spawn(async move { racer.connect(&params()).await });
    conn.connect(&params()).await.unwrap();
    task.await.unwrap().unwrap();

    assert_eq!(driver.connection_count(), 1);
}

#[tokio::test]
async fn connect_failure_carries_the_native_code_and_message() {
    let driver = Arc::new(HarnessDriver::new());
    driver.fail_next_connect(-908, "Attempt to connect to database server failed.");

    let conn = Connection::new(driver.clone());
    let err = conn.connect(&params()).await.unwrap_err();
    assert_eq!(
        err.to_string(),
        "Connection error: [-908] Attempt to connect to database server failed."
    );
}
