//! Bounded connection pool with FIFO waiter hand-off.
//!
//! Connections are created lazily up to `max_size` and never destroyed
//! implicitly; the pool owns their lifetime for the life of the process. A
//! release hands the connection directly to the first live waiter rather
//! than round-tripping it through the idle set, so waiters are served in
//! first-come-first-served order.

use std::collections::VecDeque;
use std::sync::Arc;

use tokio::sync::{Mutex, oneshot};
use tokio::time::{Instant, timeout_at};
use tracing::debug;

use crate::config::{ConnectParams, PoolOptions};
use crate::connection::Connection;
use crate::driver::Driver;
use crate::error::IfxMiddlewareError;

/// Message handed to a queued waiter: either a released connection, or
/// permission to retry growing the pool after a failed connect freed a slot.
enum Handoff {
    Conn(Arc<Connection>),
    Retry,
}

struct PoolState {
    idle: VecDeque<Arc<Connection>>,
    total: usize,
    waiters: VecDeque<oneshot::Sender<Handoff>>,
}

pub(crate) struct PoolShared {
    driver: Arc<dyn Driver>,
    params: ConnectParams,
    options: PoolOptions,
    // The idle/checked-out partition is the only concurrently-mutated shared
    // structure; no await happens while this lock is held.
    state: Mutex<PoolState>,
}

impl PoolShared {
    /// Put a connection back, waking the first waiter still listening.
    pub(crate) async fn release(self: &Arc<Self>, conn: Arc<Connection>) {
        let mut state = self.state.lock().await;
        let mut conn = conn;
        while let Some(waiter) = state.waiters.pop_front() {
            match waiter.send(Handoff::Conn(conn)) {
                Ok(()) => {
                    debug!("connection handed to waiter");
                    return;
                }
                // Receiver timed out and went away; try the next waiter.
                Err(Handoff::Conn(returned)) => conn = returned,
                Err(Handoff::Retry) => unreachable!("release only sends connections"),
            }
        }
        debug!(conn = %conn.id(), "connection returned to idle set");
        state.idle.push_back(conn);
    }
}

/// A bounded, reusable set of connections with acquire/release semantics.
///
/// Cloning is cheap and shares the same underlying pool.
#[derive(Clone)]
pub struct Pool {
    shared: Arc<PoolShared>,
}

enum Plan {
    Ready(Arc<Connection>),
    Grow(usize),
    Wait(oneshot::Receiver<Handoff>),
}

impl Pool {
    #[must_use]
    pub fn new(driver: Arc<dyn Driver>, params: ConnectParams, options: PoolOptions) -> Self {
        Self {
            shared: Arc::new(PoolShared {
                driver,
                params,
                options,
                state: Mutex::new(PoolState {
                    idle: VecDeque::new(),
                    total: 0,
                    waiters: VecDeque::new(),
                }),
            }),
        }
    }

    /// Check out a connection not currently held by anyone else.
    ///
    /// Grows the pool lazily while under `max_size`; once saturated, the
    /// caller suspends until a release occurs or the acquisition timeout
    /// elapses.
    ///
    /// # Errors
    /// Returns [`IfxMiddlewareError::PoolExhausted`] on timeout, or
    /// [`IfxMiddlewareError::ConnectionError`] when establishing a new
    /// connection fails (the failure surfaces to this caller only; the slot
    /// is returned so later acquires may retry).
    pub async fn acquire(&self) -> Result<Arc<Connection>, IfxMiddlewareError> {
        let deadline = Instant::now() + self.shared.options.acquire_timeout;
        loop {
            let plan = {
                let mut state = self.shared.state.lock().await;
                if let Some(conn) = state.idle.pop_front() {
                    Plan::Ready(conn)
                } else if state.total < self.shared.options.max_size {
                    state.total += 1;
                    Plan::Grow(state.total - 1)
                } else {
                    let (tx, rx) = oneshot::channel();
                    state.waiters.push_back(tx);
                    Plan::Wait(rx)
                }
            };

            match plan {
                Plan::Ready(conn) => {
                    debug!(conn = %conn.id(), "connection checked out from idle set");
                    return Ok(conn);
                }
                Plan::Grow(index) => return self.grow(index).await,
                Plan::Wait(rx) => match self.wait(deadline, rx).await? {
                    Handoff::Conn(conn) => return Ok(conn),
                    // A failed grow freed a slot; go again and claim it.
                    Handoff::Retry => {}
                },
            }
        }
    }

    /// Return a checked-out connection to the pool.
    pub async fn release(&self, conn: Arc<Connection>) {
        PoolShared::release(&self.shared, conn).await;
    }

    /// Bind a new connection into slot `index` and establish its session.
    async fn grow(&self, index: usize) -> Result<Arc<Connection>, IfxMiddlewareError> {
        let conn = Connection::pooled(
            Arc::clone(&self.shared.driver),
            index,
            Arc::downgrade(&self.shared),
        );
        match conn.connect(&self.shared.params).await {
            Ok(()) => {
                debug!(conn = %conn.id(), index, "pool grown with new connection");
                Ok(conn)
            }
            Err(err) => {
                let mut state = self.shared.state.lock().await;
                state.total -= 1;
                // The freed slot must not strand queued waiters; wake the
                // first one still listening so it can retry growth. The
                // connect failure itself surfaces only to this caller.
                while let Some(waiter) = state.waiters.pop_front() {
                    if waiter.send(Handoff::Retry).is_ok() {
                        break;
                    }
                }
                Err(err)
            }
        }
    }

    async fn wait(
        &self,
        deadline: Instant,
        mut rx: oneshot::Receiver<Handoff>,
    ) -> Result<Handoff, IfxMiddlewareError> {
        let wait = self.shared.options.acquire_timeout;
        match timeout_at(deadline, &mut rx).await {
            Ok(Ok(handoff)) => Ok(handoff),
            Ok(Err(_)) => Err(IfxMiddlewareError::PoolExhausted(wait)),
            Err(_) => {
                // A release may have raced the timeout and already sent us a
                // hand-off; take it rather than losing it.
                rx.close();
                match rx.try_recv() {
                    Ok(handoff) => Ok(handoff),
                    Err(_) => Err(IfxMiddlewareError::PoolExhausted(wait)),
                }
            }
        }
    }

    /// Maximum number of connections this pool will ever open.
    #[must_use]
    pub fn max_size(&self) -> usize {
        self.shared.options.max_size
    }
}

impl std::fmt::Debug for Pool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("max_size", &self.shared.options.max_size)
            .field("acquire_timeout", &self.shared.options.acquire_timeout)
            .finish_non_exhaustive()
    }
}
