use std::time::Duration;

use serde::Deserialize;

/// Session parameters handed to the driver at connect time.
///
/// `database` uses the usual `db@server` form; when `server` is set it is
/// written to the process-wide server-target configuration (INFORMIXSERVER)
/// immediately before the connect call, under a global lock.
#[derive(Debug, Clone, Deserialize)]
pub struct ConnectParams {
    pub database: String,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub server: Option<String>,
}

impl ConnectParams {
    #[must_use]
    pub fn new(
        database: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            username: username.into(),
            password: password.into(),
            server: None,
        }
    }

    #[must_use]
    pub fn with_server(mut self, server: impl Into<String>) -> Self {
        self.server = Some(server.into());
        self
    }
}

/// Options for configuring a connection pool.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct PoolOptions {
    /// Upper bound on the number of connections the pool will ever open.
    pub max_size: usize,
    /// How long `acquire` waits for a release before failing with
    /// [`IfxMiddlewareError::PoolExhausted`](crate::IfxMiddlewareError::PoolExhausted).
    pub acquire_timeout: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_size: 5,
            acquire_timeout: Duration::from_secs(30),
        }
    }
}

impl PoolOptions {
    #[must_use]
    pub fn new(max_size: usize) -> Self {
        Self {
            max_size,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_acquire_timeout(mut self, acquire_timeout: Duration) -> Self {
        self.acquire_timeout = acquire_timeout;
        self
    }
}
