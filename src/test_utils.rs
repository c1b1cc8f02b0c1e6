//! Scriptable in-memory stand-in for the native ESQL driver.
//!
//! The harness honours the driver facade's single-completion contract and its
//! resource bookkeeping (unknown ids fail with plausible SQLCODEs) without
//! talking to a server. Result rows and serial values are keyed by SQL
//! substring fixtures registered before the test runs.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::config::ConnectParams;
use crate::driver::Driver;
use crate::error::DriverError;
use crate::types::{Row, SqlValue};

struct Fixture {
    needle: String,
    rows: Vec<Row>,
    serial: i64,
}

struct Rejection {
    needle: String,
    error: DriverError,
}

struct HarnessStatement {
    sql: String,
}

struct HarnessCursor {
    pending: VecDeque<Row>,
    serial: i64,
}

#[derive(Default)]
struct HarnessState {
    server: Option<String>,
    connect_delay: Option<std::time::Duration>,
    connections: Vec<String>,
    statements: HashMap<String, HarnessStatement>,
    cursors: HashMap<String, HarnessCursor>,
    fixtures: Vec<Fixture>,
    rejections: Vec<Rejection>,
    connect_failures: VecDeque<DriverError>,
    prepare_log: Vec<String>,
    exec_log: Vec<String>,
}

/// In-memory [`Driver`] implementation for tests.
#[derive(Default)]
pub struct HarnessDriver {
    state: Mutex<HarnessState>,
}

impl HarnessDriver {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register result rows for any statement whose SQL contains `needle`.
    pub fn rows_for(&self, needle: &str, rows: Vec<Row>) {
        let mut state = self.state.lock().expect("harness state poisoned");
        state.fixtures.push(Fixture {
            needle: needle.to_owned(),
            rows,
            serial: 0,
        });
    }

    /// Register a serial value for any statement whose SQL contains `needle`.
    pub fn serial_for(&self, needle: &str, serial: i64) {
        let mut state = self.state.lock().expect("harness state poisoned");
        state.fixtures.push(Fixture {
            needle: needle.to_owned(),
            rows: Vec::new(),
            serial,
        });
    }

    /// Reject prepare of any SQL containing `needle` with a native error.
    pub fn reject_sql(&self, needle: &str, sqlcode: i32, message: &str) {
        let mut state = self.state.lock().expect("harness state poisoned");
        state.rejections.push(Rejection {
            needle: needle.to_owned(),
            error: DriverError::new(sqlcode, message),
        });
    }

    /// Make every connect attempt sleep before completing, so tests can
    /// overlap other calls with an in-flight connect.
    pub fn delay_connects(&self, delay: std::time::Duration) {
        let mut state = self.state.lock().expect("harness state poisoned");
        state.connect_delay = Some(delay);
    }

    /// Fail the next connect attempt with a native error.
    pub fn fail_next_connect(&self, sqlcode: i32, message: &str) {
        let mut state = self.state.lock().expect("harness state poisoned");
        state
            .connect_failures
            .push_back(DriverError::new(sqlcode, message));
    }

    /// Last value written through `set_server`.
    #[must_use]
    pub fn server(&self) -> Option<String> {
        self.state
            .lock()
            .expect("harness state poisoned")
            .server
            .clone()
    }

    /// How many sessions have been established.
    #[must_use]
    pub fn connection_count(&self) -> usize {
        self.state
            .lock()
            .expect("harness state poisoned")
            .connections
            .len()
    }

    /// How many prepares carried SQL containing `needle`.
    #[must_use]
    pub fn prepares_of(&self, needle: &str) -> usize {
        let state = self.state.lock().expect("harness state poisoned");
        state
            .prepare_log
            .iter()
            .filter(|sql| sql.contains(needle))
            .count()
    }

    /// How many execs ran statements whose SQL contains `needle`.
    #[must_use]
    pub fn execs_of(&self, needle: &str) -> usize {
        let state = self.state.lock().expect("harness state poisoned");
        state
            .exec_log
            .iter()
            .filter(|sql| sql.contains(needle))
            .count()
    }

    /// Prepared statements not yet freed.
    #[must_use]
    pub fn live_statements(&self) -> usize {
        self.state
            .lock()
            .expect("harness state poisoned")
            .statements
            .len()
    }

    /// Cursors not yet closed.
    #[must_use]
    pub fn live_cursors(&self) -> usize {
        self.state
            .lock()
            .expect("harness state poisoned")
            .cursors
            .len()
    }
}

#[async_trait]
impl Driver for HarnessDriver {
    fn set_server(&self, server: &str) {
        let mut state = self.state.lock().expect("harness state poisoned");
        state.server = Some(server.to_owned());
    }

    async fn connect(&self, conn_id: &str, _params: &ConnectParams) -> Result<String, DriverError> {
        let delay = {
            let state = self.state.lock().expect("harness state poisoned");
            state.connect_delay
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state.lock().expect("harness state poisoned");
        if let Some(err) = state.connect_failures.pop_front() {
            return Err(err);
        }
        state.connections.push(conn_id.to_owned());
        Ok(conn_id.to_owned())
    }

    async fn prepare(&self, conn_id: &str, stmt_id: &str, sql: &str) -> Result<String, DriverError> {
        let mut state = self.state.lock().expect("harness state poisoned");
        if !state.connections.iter().any(|id| id == conn_id) {
            return Err(DriverError::new(-1803, "Connection has been broken."));
        }
        if let Some(rejection) = state
            .rejections
            .iter()
            .find(|rejection| sql.contains(&rejection.needle))
        {
            return Err(rejection.error.clone());
        }
        state.prepare_log.push(sql.to_owned());
        state.statements.insert(
            stmt_id.to_owned(),
            HarnessStatement {
                sql: sql.to_owned(),
            },
        );
        Ok(stmt_id.to_owned())
    }

    async fn exec(
        &self,
        _conn_id: &str,
        stmt_id: &str,
        cursor_id: &str,
        _args: &[SqlValue],
    ) -> Result<String, DriverError> {
        let mut state = self.state.lock().expect("harness state poisoned");
        let sql = match state.statements.get(stmt_id) {
            Some(stmt) => stmt.sql.clone(),
            None => return Err(DriverError::new(-404, "The cursor or statement is not available.")),
        };
        state.exec_log.push(sql.clone());
        let (pending, serial) = state
            .fixtures
            .iter()
            .find(|fixture| sql.contains(&fixture.needle))
            .map_or((VecDeque::new(), 0), |fixture| {
                (
                    fixture.rows.iter().cloned().collect::<VecDeque<Row>>(),
                    fixture.serial,
                )
            });
        state
            .cursors
            .insert(cursor_id.to_owned(), HarnessCursor { pending, serial });
        Ok(cursor_id.to_owned())
    }

    async fn fetch(&self, cursor_id: &str) -> Result<Option<Row>, DriverError> {
        let mut state = self.state.lock().expect("harness state poisoned");
        match state.cursors.get_mut(cursor_id) {
            Some(cursor) => Ok(cursor.pending.pop_front()),
            None => Err(DriverError::new(-400, "Fetch attempted on unopened cursor.")),
        }
    }

    async fn close(&self, cursor_id: &str) -> Result<String, DriverError> {
        let mut state = self.state.lock().expect("harness state poisoned");
        match state.cursors.remove(cursor_id) {
            Some(_) => Ok(cursor_id.to_owned()),
            None => Err(DriverError::new(-404, "The cursor or statement is not available.")),
        }
    }

    async fn free(&self, stmt_id: &str) -> Result<String, DriverError> {
        let mut state = self.state.lock().expect("harness state poisoned");
        match state.statements.remove(stmt_id) {
            Some(_) => Ok(stmt_id.to_owned()),
            None => Err(DriverError::new(-404, "The cursor or statement is not available.")),
        }
    }

    fn serial(&self, cursor_id: &str) -> i64 {
        let state = self.state.lock().expect("harness state poisoned");
        state
            .cursors
            .get(cursor_id)
            .map_or(0, |cursor| cursor.serial)
    }
}
