use std::time::Duration;

use thiserror::Error;

/// Native failure reported by the ESQL driver.
///
/// Carries the SQLCODE and message text exactly as the driver produced them,
/// e.g. `[-201] A syntax error has occurred.`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("[{sqlcode}] {message}")]
pub struct DriverError {
    pub sqlcode: i32,
    pub message: String,
}

impl DriverError {
    #[must_use]
    pub fn new(sqlcode: i32, message: impl Into<String>) -> Self {
        Self {
            sqlcode,
            message: message.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum IfxMiddlewareError {
    /// Authentication or network failure while establishing a session.
    #[error("Connection error: {0}")]
    ConnectionError(DriverError),

    /// The driver rejected the SQL text during prepare.
    #[error("Syntax error: {0}")]
    SyntaxError(DriverError),

    /// The statement declares input placeholders but no arguments were supplied.
    #[error("This statement requires input arguments.")]
    MissingArguments,

    /// The statement declares no input placeholders but arguments were supplied.
    #[error("This statement does not expect any input arguments.")]
    UnexpectedArguments,

    /// The supplied argument count does not match the placeholder count.
    #[error("Too many or too few host variables given (expected {expected}, got {supplied}).")]
    ArityMismatch { expected: usize, supplied: usize },

    /// Use of a freed or never-prepared statement.
    #[error("Invalid statement ID.")]
    InvalidStatement,

    /// Free attempted while a cursor derived from the statement is still open.
    #[error("A cursor derived from this statement is still open.")]
    CursorStillOpen,

    /// Use of a closed cursor.
    #[error("Invalid cursor ID.")]
    InvalidCursor,

    /// Operation on a connection that has not been established yet.
    #[error("Connection is not established.")]
    NotConnected,

    /// No connection was released within the acquisition timeout.
    #[error("Connection pool exhausted; no connection released within {0:?}")]
    PoolExhausted(Duration),

    /// Transaction-state misuse, e.g. `begin` while a transaction is active.
    #[error("Transaction error: {0}")]
    TransactionError(String),

    /// `commit` or `rollback` without an active transaction.
    #[error("No active transaction.")]
    NoActiveTransaction,

    /// Any other native driver failure (exec, fetch, close, free).
    #[error(transparent)]
    Driver(#[from] DriverError),
}
