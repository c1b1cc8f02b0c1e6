use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::connection::Connection;
use crate::error::IfxMiddlewareError;
use crate::statement::Statement;
use crate::types::Row;

/// Options supplied to [`Cursor::fetch_all`].
#[derive(Debug, Clone, Default)]
pub struct FetchOptions {
    /// Close the cursor once the result set is drained.
    pub close: bool,
}

impl FetchOptions {
    #[must_use]
    pub fn and_close() -> Self {
        Self { close: true }
    }
}

enum CursorState {
    Open { stmt: Arc<Statement> },
    Closed,
}

/// A handle to one executed statement's pending result stream.
///
/// The cursor keeps a handle to its originating statement only while open:
/// `close` takes it, clears the statement's open-cursor mark, runs the
/// auto-free cascade for single-use statements, and drops it. Past close the
/// association is gone, so the cursor never keeps a statement alive beyond
/// its own open window.
pub struct Cursor {
    id: String,
    conn: Arc<Connection>,
    auto_free: bool,
    state: Mutex<CursorState>,
}

impl Cursor {
    pub(crate) fn new(
        id: String,
        conn: Arc<Connection>,
        stmt: Arc<Statement>,
        auto_free: bool,
    ) -> Self {
        Self {
            id,
            conn,
            auto_free,
            state: Mutex::new(CursorState::Open { stmt }),
        }
    }

    /// Fetch one result row, or `None` once the result set is exhausted.
    ///
    /// Exhaustion does not close the cursor; fetching again keeps returning
    /// `None` until [`Cursor::close`] is called.
    ///
    /// # Errors
    /// Returns [`IfxMiddlewareError::InvalidCursor`] on a closed cursor, or
    /// [`IfxMiddlewareError::Driver`] when the driver reports a fetch failure.
    pub async fn fetch(&self) -> Result<Option<Row>, IfxMiddlewareError> {
        let state = self.state.lock().await;
        if matches!(*state, CursorState::Closed) {
            return Err(IfxMiddlewareError::InvalidCursor);
        }
        let _op = self.conn.guard().await;
        Ok(self.conn.driver().fetch(&self.id).await?)
    }

    /// Fetch every remaining row, in arrival order.
    ///
    /// With `opts.close` set, the cursor is closed after accumulation (which
    /// cascades into statement auto-free for single-use statements) and any
    /// close failure surfaces as this call's failure.
    ///
    /// # Errors
    /// Same failure modes as [`Cursor::fetch`] and [`Cursor::close`].
    pub async fn fetch_all(&self, opts: FetchOptions) -> Result<Vec<Row>, IfxMiddlewareError> {
        let mut rows = Vec::new();
        while let Some(row) = self.fetch().await? {
            rows.push(row);
        }
        if opts.close {
            self.close().await?;
        }
        Ok(rows)
    }

    /// Close the cursor, releasing its server-side result stream.
    ///
    /// When the originating statement is single-use, its `free` is chained
    /// here; a failure to free propagates as the close's failure.
    ///
    /// # Errors
    /// Returns [`IfxMiddlewareError::InvalidCursor`] on a second close, or
    /// [`IfxMiddlewareError::Driver`] when the driver reports a close failure.
    pub async fn close(&self) -> Result<String, IfxMiddlewareError> {
        let mut state = self.state.lock().await;
        if matches!(*state, CursorState::Closed) {
            return Err(IfxMiddlewareError::InvalidCursor);
        }
        {
            let _op = self.conn.guard().await;
            self.conn.driver().close(&self.id).await?;
        }
        let stmt = match std::mem::replace(&mut *state, CursorState::Closed) {
            CursorState::Open { stmt } => Some(stmt),
            CursorState::Closed => None,
        };
        drop(state);
        debug!(cursor = %self.id, "cursor closed");

        if let Some(stmt) = stmt {
            stmt.cursor_closed().await;
            if self.auto_free {
                stmt.free().await?;
            }
        }
        Ok(self.id.clone())
    }

    /// Serial value generated by the most recent insert executed through this
    /// cursor's connection. Synchronous; no driver round-trip is awaited.
    #[must_use]
    pub fn serial(&self) -> i64 {
        self.conn.driver().serial(&self.id)
    }

    /// The cursor's identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }
}

impl std::fmt::Debug for Cursor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cursor")
            .field("id", &self.id)
            .field("auto_free", &self.auto_free)
            .finish_non_exhaustive()
    }
}
