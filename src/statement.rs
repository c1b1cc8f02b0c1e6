use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;

use crate::connection::Connection;
use crate::cursor::Cursor;
use crate::error::IfxMiddlewareError;
use crate::ids;
use crate::scan;
use crate::types::SqlValue;

/// Options supplied when constructing a [`Statement`].
#[derive(Debug, Clone)]
pub struct StatementOptions {
    /// When false the statement is single-use: closing the cursor produced by
    /// `exec` frees the statement automatically, and any later use fails with
    /// [`IfxMiddlewareError::InvalidStatement`].
    pub reusable: bool,
}

impl Default for StatementOptions {
    fn default() -> Self {
        Self { reusable: true }
    }
}

impl StatementOptions {
    #[must_use]
    pub fn single_use() -> Self {
        Self { reusable: false }
    }

    #[must_use]
    pub fn with_reusable(mut self, reusable: bool) -> Self {
        self.reusable = reusable;
        self
    }
}

/// Options supplied to [`Statement::exec`].
#[derive(Debug, Clone, Default)]
pub struct ExecOptions {
    /// Explicit cursor identifier; minted when absent.
    pub id: Option<String>,
}

impl ExecOptions {
    #[must_use]
    pub fn with_id(id: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
        }
    }
}

enum StmtState {
    Unprepared,
    Prepared { param_count: usize, cursor_open: bool },
    Freed,
}

/// A handle to one prepared SQL text.
///
/// Lifecycle: `unprepared → prepared → freed`. While prepared, at most one
/// derived cursor may be open; the statement cannot be re-executed or freed
/// until that cursor closes. After `free` every operation fails with
/// [`IfxMiddlewareError::InvalidStatement`] — the driver gives no second
/// chances on a freed handle.
pub struct Statement {
    id: String,
    conn: Arc<Connection>,
    reusable: bool,
    state: Mutex<StmtState>,
}

impl Statement {
    #[must_use]
    pub fn new(conn: Arc<Connection>, opts: StatementOptions) -> Arc<Self> {
        Arc::new(Self {
            id: ids::mint(),
            conn,
            reusable: opts.reusable,
            state: Mutex::new(StmtState::Unprepared),
        })
    }

    /// Prepare `sql` on the owning connection.
    ///
    /// The expected input-parameter count is recorded by scanning the text
    /// for `?` placeholders (string literals and comments excluded).
    ///
    /// # Errors
    /// Returns [`IfxMiddlewareError::SyntaxError`] when the driver rejects
    /// the text, or [`IfxMiddlewareError::InvalidStatement`] when the
    /// statement is already prepared or freed.
    pub async fn prepare(&self, sql: &str) -> Result<(), IfxMiddlewareError> {
        self.conn.ensure_connected()?;
        let mut state = self.state.lock().await;
        if !matches!(*state, StmtState::Unprepared) {
            return Err(IfxMiddlewareError::InvalidStatement);
        }
        let param_count = scan::count_placeholders(sql);
        {
            let _op = self.conn.guard().await;
            self.conn
                .driver()
                .prepare(self.conn.id(), &self.id, sql)
                .await
                .map_err(IfxMiddlewareError::SyntaxError)?;
        }
        *state = StmtState::Prepared {
            param_count,
            cursor_open: false,
        };
        debug!(stmt = %self.id, param_count, "statement prepared");
        Ok(())
    }

    /// Execute the prepared statement, producing a [`Cursor`] over its results.
    ///
    /// Argument counts are validated against the placeholder count before any
    /// driver call is made.
    ///
    /// # Errors
    /// - [`IfxMiddlewareError::MissingArguments`] — placeholders expected, none given.
    /// - [`IfxMiddlewareError::UnexpectedArguments`] — no placeholders, arguments given.
    /// - [`IfxMiddlewareError::ArityMismatch`] — counts differ.
    /// - [`IfxMiddlewareError::InvalidStatement`] — statement freed or never prepared.
    /// - [`IfxMiddlewareError::CursorStillOpen`] — a previous execution's cursor is open.
    /// - [`IfxMiddlewareError::Driver`] — the driver reported an exec failure.
    pub async fn exec(
        self: &Arc<Self>,
        args: &[SqlValue],
        opts: ExecOptions,
    ) -> Result<Cursor, IfxMiddlewareError> {
        let mut state = self.state.lock().await;
        let param_count = match &*state {
            StmtState::Prepared {
                cursor_open: true, ..
            } => return Err(IfxMiddlewareError::CursorStillOpen),
            StmtState::Prepared { param_count, .. } => *param_count,
            StmtState::Unprepared | StmtState::Freed => {
                return Err(IfxMiddlewareError::InvalidStatement);
            }
        };

        if param_count > 0 && args.is_empty() {
            return Err(IfxMiddlewareError::MissingArguments);
        }
        if param_count == 0 && !args.is_empty() {
            return Err(IfxMiddlewareError::UnexpectedArguments);
        }
        if args.len() != param_count {
            return Err(IfxMiddlewareError::ArityMismatch {
                expected: param_count,
                supplied: args.len(),
            });
        }

        let cursor_id = opts.id.unwrap_or_else(ids::mint);
        {
            let _op = self.conn.guard().await;
            self.conn
                .driver()
                .exec(self.conn.id(), &self.id, &cursor_id, args)
                .await?;
        }
        *state = StmtState::Prepared {
            param_count,
            cursor_open: true,
        };
        debug!(stmt = %self.id, cursor = %cursor_id, "statement executed");
        Ok(Cursor::new(
            cursor_id,
            Arc::clone(&self.conn),
            Arc::clone(self),
            !self.reusable,
        ))
    }

    /// Free the statement's driver-side resources.
    ///
    /// # Errors
    /// Returns [`IfxMiddlewareError::CursorStillOpen`] while a derived cursor
    /// is open, and [`IfxMiddlewareError::InvalidStatement`] when called on a
    /// freed or never-prepared statement (freeing is not idempotent).
    pub async fn free(&self) -> Result<String, IfxMiddlewareError> {
        let mut state = self.state.lock().await;
        match &*state {
            StmtState::Prepared {
                cursor_open: true, ..
            } => Err(IfxMiddlewareError::CursorStillOpen),
            StmtState::Prepared { .. } => {
                {
                    let _op = self.conn.guard().await;
                    self.conn.driver().free(&self.id).await?;
                }
                *state = StmtState::Freed;
                debug!(stmt = %self.id, "statement freed");
                Ok(self.id.clone())
            }
            StmtState::Unprepared | StmtState::Freed => Err(IfxMiddlewareError::InvalidStatement),
        }
    }

    /// Whether this statement survives its cursor closing.
    #[must_use]
    pub fn reusable(&self) -> bool {
        self.reusable
    }

    /// Client-minted statement identifier.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Called by the derived cursor once it has closed.
    pub(crate) async fn cursor_closed(&self) {
        let mut state = self.state.lock().await;
        if let StmtState::Prepared { cursor_open, .. } = &mut *state {
            *cursor_open = false;
        }
    }
}

impl std::fmt::Debug for Statement {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("id", &self.id)
            .field("reusable", &self.reusable)
            .finish_non_exhaustive()
    }
}
