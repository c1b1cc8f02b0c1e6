//! The boundary with the native ESQL driver.
//!
//! The driver performs one blocking request/response operation at a time per
//! connection and reports each call's outcome through a single completion.
//! Everything above this trait is cooperative bookkeeping; the driver itself
//! has no internal locking and no safety net against misuse.

use async_trait::async_trait;

use crate::config::ConnectParams;
use crate::error::DriverError;
use crate::types::{Row, SqlValue};

/// Single-completion asynchronous operations keyed by opaque string ids.
///
/// Ordering contract: calls issued against the same connection id complete in
/// issuance order; calls against different connections are unordered relative
/// to each other. No call is cancellable once issued.
#[async_trait]
pub trait Driver: Send + Sync {
    /// Set the process-wide target server consulted by the next `connect`.
    ///
    /// This is shared global state; callers must serialize "set target, then
    /// connect" themselves (see [`Connection::connect`](crate::Connection::connect)).
    fn set_server(&self, server: &str);

    /// Establish a session under the caller-minted connection id.
    async fn connect(&self, conn_id: &str, params: &ConnectParams) -> Result<String, DriverError>;

    /// Prepare `sql` under `stmt_id` on the given connection. Does not execute.
    async fn prepare(&self, conn_id: &str, stmt_id: &str, sql: &str) -> Result<String, DriverError>;

    /// Execute a prepared statement, opening a result cursor under `cursor_id`.
    async fn exec(
        &self,
        conn_id: &str,
        stmt_id: &str,
        cursor_id: &str,
        args: &[SqlValue],
    ) -> Result<String, DriverError>;

    /// Fetch the next row from an open cursor; `None` once exhausted.
    async fn fetch(&self, cursor_id: &str) -> Result<Option<Row>, DriverError>;

    /// Close an open cursor, releasing its server-side result stream.
    async fn close(&self, cursor_id: &str) -> Result<String, DriverError>;

    /// Free a prepared statement's driver-side resources.
    async fn free(&self, stmt_id: &str) -> Result<String, DriverError>;

    /// Serial value generated by the most recent insert on the cursor's
    /// connection. Synchronous; returns 0 when no insert has run.
    fn serial(&self, cursor_id: &str) -> i64;
}
