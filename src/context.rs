use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::connection::Connection;
use crate::cursor::Cursor;
use crate::error::IfxMiddlewareError;
use crate::ids;
use crate::pool::Pool;
use crate::statement::{ExecOptions, Statement, StatementOptions};
use crate::types::SqlValue;

#[derive(Clone, Copy)]
enum Control {
    Begin,
    Commit,
    Rollback,
}

impl Control {
    fn sql(self) -> &'static str {
        match self {
            Control::Begin => "begin work;",
            Control::Commit => "commit work;",
            Control::Rollback => "rollback work;",
        }
    }
}

#[derive(Default)]
struct ControlStatements {
    begin: Option<Arc<Statement>>,
    commit: Option<Arc<Statement>>,
    rollback: Option<Arc<Statement>>,
}

impl ControlStatements {
    fn slot(&mut self, which: Control) -> &mut Option<Arc<Statement>> {
        match which {
            Control::Begin => &mut self.begin,
            Control::Commit => &mut self.commit,
            Control::Rollback => &mut self.rollback,
        }
    }

    fn drain(&mut self) -> Vec<Arc<Statement>> {
        [
            self.begin.take(),
            self.commit.take(),
            self.rollback.take(),
        ]
        .into_iter()
        .flatten()
        .collect()
    }
}

#[derive(Default)]
struct ContextInner {
    conn: Option<Arc<Connection>>,
    transaction: bool,
    controls: ControlStatements,
}

/// A transaction-scoped façade over one pool-acquired connection.
///
/// The connection is fetched from the pool lazily on first use and held for
/// the context's lifetime. BEGIN/COMMIT/ROLLBACK run through prepared
/// statements that are cached after first use, so transaction control is
/// never re-prepared.
pub struct Context {
    id: String,
    pool: Pool,
    inner: Mutex<ContextInner>,
}

impl Context {
    #[must_use]
    pub fn new(pool: Pool) -> Self {
        Self {
            id: ids::mint(),
            pool,
            inner: Mutex::new(ContextInner::default()),
        }
    }

    /// Caller-visible context identifier, usable to tag rows with the
    /// originating session. Interpolating it (or anything else) into raw SQL
    /// is the caller's responsibility; prefer bound parameters.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Prepare and execute `sql` in one step.
    ///
    /// The statement behind the returned cursor is single-use: closing the
    /// cursor frees it automatically.
    ///
    /// # Errors
    /// Propagates pool acquisition, prepare, and exec failures.
    pub async fn query(&self, sql: &str) -> Result<Cursor, IfxMiddlewareError> {
        self.query_with(sql, &[]).await
    }

    /// [`Context::query`] with bound input parameters.
    ///
    /// # Errors
    /// Propagates pool acquisition, prepare, and exec failures, including the
    /// argument-count checks of [`Statement::exec`].
    pub async fn query_with(
        &self,
        sql: &str,
        args: &[SqlValue],
    ) -> Result<Cursor, IfxMiddlewareError> {
        let conn = self.connection().await?;
        let stmt = conn.prepare_with(sql, StatementOptions::single_use()).await?;
        stmt.exec(args, ExecOptions::default()).await
    }

    /// Prepare a reusable statement on the held connection.
    ///
    /// # Errors
    /// Propagates pool acquisition and prepare failures.
    pub async fn prepare(&self, sql: &str) -> Result<Arc<Statement>, IfxMiddlewareError> {
        let conn = self.connection().await?;
        conn.prepare(sql).await
    }

    /// Open a transaction.
    ///
    /// # Errors
    /// Returns [`IfxMiddlewareError::TransactionError`] when a transaction is
    /// already active on this context (begin does not nest and is not treated
    /// as a no-op).
    pub async fn begin(&self) -> Result<(), IfxMiddlewareError> {
        let mut inner = self.inner.lock().await;
        if inner.transaction {
            return Err(IfxMiddlewareError::TransactionError(
                "a transaction is already active on this context".to_owned(),
            ));
        }
        self.run_control(&mut inner, Control::Begin).await?;
        inner.transaction = true;
        debug!(ctx = %self.id, "transaction started");
        Ok(())
    }

    /// Commit the active transaction.
    ///
    /// # Errors
    /// Returns [`IfxMiddlewareError::NoActiveTransaction`] without a
    /// preceding [`Context::begin`].
    pub async fn commit(&self) -> Result<(), IfxMiddlewareError> {
        let mut inner = self.inner.lock().await;
        if !inner.transaction {
            return Err(IfxMiddlewareError::NoActiveTransaction);
        }
        self.run_control(&mut inner, Control::Commit).await?;
        inner.transaction = false;
        debug!(ctx = %self.id, "transaction committed");
        Ok(())
    }

    /// Roll back the active transaction.
    ///
    /// # Errors
    /// Returns [`IfxMiddlewareError::NoActiveTransaction`] without a
    /// preceding [`Context::begin`].
    pub async fn rollback(&self) -> Result<(), IfxMiddlewareError> {
        let mut inner = self.inner.lock().await;
        if !inner.transaction {
            return Err(IfxMiddlewareError::NoActiveTransaction);
        }
        self.run_control(&mut inner, Control::Rollback).await?;
        inner.transaction = false;
        debug!(ctx = %self.id, "transaction rolled back");
        Ok(())
    }

    /// Graceful teardown: roll back any open transaction, free the cached
    /// control statements, and release the connection to the pool.
    ///
    /// The rollback-before-release ordering is mandatory; a connection must
    /// never return to the pool mid-transaction.
    ///
    /// # Errors
    /// Propagates a rollback failure. Control-statement cleanup failures are
    /// logged and swallowed so the connection still makes it back to the pool.
    pub async fn end(&self) -> Result<(), IfxMiddlewareError> {
        let mut inner = self.inner.lock().await;
        if inner.transaction {
            self.run_control(&mut inner, Control::Rollback).await?;
            inner.transaction = false;
            debug!(ctx = %self.id, "open transaction rolled back at end");
        }
        for stmt in inner.controls.drain() {
            if let Err(err) = stmt.free().await {
                warn!(ctx = %self.id, stmt = %stmt.id(), %err, "failed to free cached control statement");
            }
        }
        if let Some(conn) = inner.conn.take() {
            conn.release().await;
        }
        Ok(())
    }

    /// Lazily acquire (and then hold) the context's connection.
    async fn connection(&self) -> Result<Arc<Connection>, IfxMiddlewareError> {
        let mut inner = self.inner.lock().await;
        Self::connection_locked(&self.pool, &mut inner).await
    }

    async fn connection_locked(
        pool: &Pool,
        inner: &mut ContextInner,
    ) -> Result<Arc<Connection>, IfxMiddlewareError> {
        if let Some(conn) = inner.conn.as_ref() {
            return Ok(Arc::clone(conn));
        }
        let conn = pool.acquire().await?;
        inner.conn = Some(Arc::clone(&conn));
        Ok(conn)
    }

    /// Execute one of the cached BEGIN/COMMIT/ROLLBACK statements, preparing
    /// it on first use.
    async fn run_control(
        &self,
        inner: &mut ContextInner,
        which: Control,
    ) -> Result<(), IfxMiddlewareError> {
        let conn = Self::connection_locked(&self.pool, inner).await?;
        let stmt = match inner.controls.slot(which).clone() {
            Some(stmt) => stmt,
            None => {
                let stmt = conn.prepare(which.sql()).await?;
                *inner.controls.slot(which) = Some(Arc::clone(&stmt));
                stmt
            }
        };
        let cursor = stmt.exec(&[], ExecOptions::default()).await?;
        cursor.close().await?;
        Ok(())
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("id", &self.id)
            .field("pool", &self.pool)
            .finish_non_exhaustive()
    }
}
