//! Async resource-lifecycle middleware over a blocking Informix ESQL driver.
//!
//! The native driver performs one blocking operation at a time per connection
//! and reports each call through a single completion. This crate layers the
//! cooperative bookkeeping that makes such a driver usable from async Rust:
//! a bounded [`Pool`] of reusable connections, [`Statement`] and [`Cursor`]
//! state machines with reuse and auto-free rules, and a transaction-scoped
//! [`Context`] with cached BEGIN/COMMIT/ROLLBACK control statements.
//!
//! The driver itself is an external collaborator behind the [`Driver`] trait;
//! a scriptable in-memory harness ships behind the `test-utils` feature.

pub mod config;
pub mod connection;
pub mod context;
pub mod cursor;
pub mod driver;
pub mod error;
mod ids;
pub mod pool;
mod scan;
pub mod statement;
#[cfg(feature = "test-utils")]
pub mod test_utils;
pub mod types;

pub use config::{ConnectParams, PoolOptions};
pub use connection::Connection;
pub use context::Context;
pub use cursor::{Cursor, FetchOptions};
pub use driver::Driver;
pub use error::{DriverError, IfxMiddlewareError};
pub use pool::Pool;
pub use statement::{ExecOptions, Statement, StatementOptions};
pub use types::{Row, SqlValue};
