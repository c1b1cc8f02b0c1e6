use std::sync::Arc;
use std::sync::Weak;
use std::sync::atomic::{AtomicBool, Ordering};

use lazy_static::lazy_static;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::config::ConnectParams;
use crate::driver::Driver;
use crate::error::IfxMiddlewareError;
use crate::ids;
use crate::pool::PoolShared;
use crate::statement::{Statement, StatementOptions};

lazy_static! {
    // The driver's server-target setting is process-wide; "set target, then
    // connect" must run as one unit even when connects race across tasks.
    static ref SERVER_TARGET: Mutex<()> = Mutex::new(());
}

/// One driver-level session.
///
/// A connection is owned by whichever [`Context`](crate::Context) or caller
/// currently holds it. Pooled connections are reused across acquire/release
/// cycles and are never closed at the driver level; the pool keeps them for
/// the life of the process.
pub struct Connection {
    id: String,
    driver: Arc<dyn Driver>,
    index: i32,
    pool: Weak<PoolShared>,
    connected: AtomicBool,
    // The driver is not re-entrant per connection: exactly one in-flight
    // operation at a time, enforced by everything routing through this lock.
    op_lock: Mutex<()>,
}

impl Connection {
    /// Create a connection outside any pool. `index()` reports −1.
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>) -> Arc<Self> {
        Self::build(driver, -1, Weak::new())
    }

    #[allow(clippy::cast_possible_truncation, clippy::cast_possible_wrap)]
    pub(crate) fn pooled(driver: Arc<dyn Driver>, index: usize, pool: Weak<PoolShared>) -> Arc<Self> {
        Self::build(driver, index as i32, pool)
    }

    fn build(driver: Arc<dyn Driver>, index: i32, pool: Weak<PoolShared>) -> Arc<Self> {
        Arc::new(Self {
            id: ids::mint(),
            driver,
            index,
            pool,
            connected: AtomicBool::new(false),
            op_lock: Mutex::new(()),
        })
    }

    /// Establish the underlying driver session.
    ///
    /// Already-connected connections are left alone. The process-wide server
    /// target is written and the connect issued under one global lock so
    /// concurrent connects against different servers cannot cross-talk.
    ///
    /// # Errors
    /// Returns [`IfxMiddlewareError::ConnectionError`] with the driver's
    /// native SQLCODE and message on authentication or network failure.
    pub async fn connect(&self, params: &ConnectParams) -> Result<(), IfxMiddlewareError> {
        if self.connected.load(Ordering::Acquire) {
            return Ok(());
        }
        let _op = self.op_lock.lock().await;
        // A concurrent connect may have won the lock first; re-check so the
        // driver never sees a second connect under the same connection id.
        if self.connected.load(Ordering::Acquire) {
            return Ok(());
        }
        let _target = SERVER_TARGET.lock().await;
        if let Some(server) = params.server.as_deref() {
            self.driver.set_server(server);
        }
        self.driver
            .connect(&self.id, params)
            .await
            .map_err(IfxMiddlewareError::ConnectionError)?;
        self.connected.store(true, Ordering::Release);
        debug!(conn = %self.id, database = %params.database, "connection established");
        Ok(())
    }

    /// Prepare a reusable statement bound to this connection. Does not execute.
    ///
    /// # Errors
    /// Returns [`IfxMiddlewareError::NotConnected`] before `connect`, or
    /// [`IfxMiddlewareError::SyntaxError`] when the driver rejects the text.
    pub async fn prepare(self: &Arc<Self>, sql: &str) -> Result<Arc<Statement>, IfxMiddlewareError> {
        self.prepare_with(sql, StatementOptions::default()).await
    }

    /// Prepare a statement with explicit options (e.g. single-use).
    ///
    /// # Errors
    /// Same failure modes as [`Connection::prepare`].
    pub async fn prepare_with(
        self: &Arc<Self>,
        sql: &str,
        opts: StatementOptions,
    ) -> Result<Arc<Statement>, IfxMiddlewareError> {
        let stmt = Statement::new(Arc::clone(self), opts);
        stmt.prepare(sql).await?;
        Ok(stmt)
    }

    /// Pool slot index, or −1 when constructed outside a pool.
    #[must_use]
    pub fn index(&self) -> i32 {
        self.index
    }

    /// Return this connection to the pool that constructed it.
    ///
    /// A no-op for unpooled connections.
    pub async fn release(self: &Arc<Self>) {
        if let Some(pool) = self.pool.upgrade() {
            PoolShared::release(&pool, Arc::clone(self)).await;
        }
    }

    /// Client-minted connection identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    pub(crate) fn driver(&self) -> &Arc<dyn Driver> {
        &self.driver
    }

    pub(crate) fn ensure_connected(&self) -> Result<(), IfxMiddlewareError> {
        if self.connected.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(IfxMiddlewareError::NotConnected)
        }
    }

    /// Serialize a driver call on this connection.
    pub(crate) async fn guard(&self) -> MutexGuard<'_, ()> {
        self.op_lock.lock().await
    }
}

impl std::fmt::Debug for Connection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.id)
            .field("index", &self.index)
            .field("connected", &self.connected.load(Ordering::Relaxed))
            .finish_non_exhaustive()
    }
}
