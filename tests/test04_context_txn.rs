use std::sync::Arc;
use std::time::Duration;

use ifx_middleware::test_utils::HarnessDriver;
use ifx_middleware::{
    ConnectParams, Context, FetchOptions, IfxMiddlewareError, Pool, PoolOptions, SqlValue,
};

fn test_pool(max_size: usize) -> (Arc<HarnessDriver>, Pool) {
    let driver = Arc::new(HarnessDriver::new());
    let pool = Pool::new(
        driver.clone(),
        ConnectParams::new("test@informixoltp_tcp", "informix", "1nf0rm1x"),
        PoolOptions::new(max_size).with_acquire_timeout(Duration::from_millis(200)),
    );
    (driver, pool)
}

#[tokio::test]
async fn query_runs_through_a_single_use_statement() {
    let (driver, pool) = test_pool(1);
    driver.rows_for("from systables", vec![vec![SqlValue::Int(57)]]);

    let ctx = Context::new(pool);
    let cursor = ctx.query("select count(*) from systables;").await.unwrap();
    let rows = cursor.fetch_all(FetchOptions::and_close()).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0][0].as_int(), Some(57));

    // Closing the cursor auto-freed the statement behind the query.
    assert_eq!(driver.live_statements(), 0);
    ctx.end().await.unwrap();
}

#[tokio::test]
async fn query_with_binds_arguments() {
    let (driver, pool) = test_pool(1);
    driver.rows_for(
        "from tcustomers",
        vec![vec![SqlValue::Int(1)], vec![SqlValue::Int(2)]],
    );

    let ctx = Context::new(pool);

    // Placeholders with no arguments are rejected before the driver runs.
    assert!(matches!(
        ctx.query("select * from tcustomers where id < ?;").await.unwrap_err(),
        IfxMiddlewareError::MissingArguments
    ));

    let cursor = ctx
        .query_with(
            "select * from tcustomers where id < ?;",
            &[SqlValue::Int(5)],
        )
        .await
        .unwrap();
    let rows = cursor.fetch_all(FetchOptions::and_close()).await.unwrap();
    assert_eq!(rows.len(), 2);
    ctx.end().await.unwrap();
}

#[tokio::test]
async fn prepare_returns_a_reusable_statement() {
    let (_driver, pool) = test_pool(1);
    let ctx = Context::new(pool);

    let stmt = ctx
        .prepare("select count(*) from systables where tabname like ?;")
        .await
        .unwrap();
    stmt.free().await.unwrap();
    ctx.end().await.unwrap();
}

#[tokio::test]
async fn transaction_state_misuse_is_surfaced() {
    let (_driver, pool) = test_pool(1);
    let ctx = Context::new(pool);

    assert!(matches!(
        ctx.commit().await.unwrap_err(),
        IfxMiddlewareError::NoActiveTransaction
    ));
    assert!(matches!(
        ctx.rollback().await.unwrap_err(),
        IfxMiddlewareError::NoActiveTransaction
    ));

    ctx.begin().await.unwrap();
    assert!(matches!(
        ctx.begin().await.unwrap_err(),
        IfxMiddlewareError::TransactionError(_)
    ));

    ctx.commit().await.unwrap();
    assert!(matches!(
        ctx.commit().await.unwrap_err(),
        IfxMiddlewareError::NoActiveTransaction
    ));

    ctx.end().await.unwrap();
}

#[tokio::test]
async fn control_statements_are_prepared_once_and_reused() {
    let (driver, pool) = test_pool(1);
    let ctx = Context::new(pool);

    ctx.begin().await.unwrap();
    ctx.commit().await.unwrap();
    ctx.begin().await.unwrap();
    ctx.rollback().await.unwrap();

    assert_eq!(driver.prepares_of("begin work"), 1);
    assert_eq!(driver.prepares_of("commit work"), 1);
    assert_eq!(driver.prepares_of("rollback work"), 1);
    assert_eq!(driver.execs_of("begin work"), 2);

    ctx.end().await.unwrap();
    // Teardown freed the cached control statements.
    assert_eq!(driver.live_statements(), 0);
}

#[tokio::test]
async fn end_rolls_back_before_releasing_the_connection() {
    let (driver, pool) = test_pool(1);
    let ctx = Context::new(pool.clone());

    ctx.begin().await.unwrap();
    ctx.end().await.unwrap();
    assert_eq!(driver.execs_of("rollback work"), 1);

    // The connection is back in the pool: a pool of one hands it out again.
    let conn = pool.acquire().await.unwrap();
    assert_eq!(conn.index(), 0);
}

#[tokio::test]
async fn serial_is_visible_inside_a_transaction() {
    let (driver, pool) = test_pool(1);
    driver.serial_for("insert into tcustomers", 7);

    let ctx = Context::new(pool);
    ctx.begin().await.unwrap();
    let cursor = ctx
        .query_with(
            "insert into tcustomers( fname, lname ) values( ?, ? );",
            &[SqlValue::from("Name"), SqlValue::from(ctx.id())],
        )
        .await
        .unwrap();
    assert_eq!(cursor.serial(), 7);
    cursor.close().await.unwrap();
    ctx.rollback().await.unwrap();
    ctx.end().await.unwrap();
}

#[tokio::test]
async fn context_id_is_identifier_shaped() {
    let (_driver, pool) = test_pool(1);
    let ctx = Context::new(pool);
    assert!(ctx.id().starts_with('_'));
    assert!(!ctx.id().contains('-'));
}
