//! A deterministic **in-process stand-in** for a SQL driver.
//!
//! Every fake "server" is identified by the `host` parameter. Tests create a
//! unique host, then inspect what the managers did to it through
//! [`state_for`]: how often it was connected, closed, which statements ran.

use qakit::connections::connection::{Cursor, DbConnection, Reconnect, SqlDriver};
use qakit::connections::errors::ConnectionError;
use qakit::connections::sql::value::{render_positional, Row, SqlValue};
use qakit::Params;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, OnceLock};
use std::thread;
use std::time::Duration;

#[derive(Debug, Default)]
pub struct FakeState {
    pub connects: u32,
    pub reconnects: u32,
    pub closes: u32,
    pub commits: u32,
    pub cursor_closes: u32,
    pub alive: bool,
    /// Every autocommit value set, in order.
    pub autocommit: Vec<bool>,
    pub executed: Vec<String>,
    /// How long each execute takes.
    pub execute_delay: Duration,
    /// Statements containing this text fail.
    pub fail_on: Option<String>,
    /// Render bound parameters like a driver with a mogrify capability.
    pub render: bool,
}

type Servers = Mutex<HashMap<String, Arc<Mutex<FakeState>>>>;

fn servers() -> &'static Servers {
    static SERVERS: OnceLock<Servers> = OnceLock::new();
    SERVERS.get_or_init(|| Mutex::new(HashMap::new()))
}

/// Shared state of the fake server behind `host`.
pub fn state_for(host: &str) -> Arc<Mutex<FakeState>> {
    servers()
        .lock()
        .unwrap()
        .entry(host.to_string())
        .or_default()
        .clone()
}

pub fn lock(state: &Arc<Mutex<FakeState>>) -> MutexGuard<'_, FakeState> {
    state.lock().unwrap()
}

/// A host name no other test uses.
pub fn unique_host() -> String {
    format!("fake-{}", uuid::Uuid::new_v4())
}

pub struct FakeDriver;

impl SqlDriver for FakeDriver {
    const NAME: &'static str = "fake";

    type Connection = FakeConnection;

    fn connect(params: &Params) -> Result<Self::Connection, ConnectionError> {
        let host = params
            .str_of(&["host"])
            .ok_or_else(|| ConnectionError::Usage("fake driver needs a host".into()))?;
        let state = state_for(&host);
        {
            let mut s = lock(&state);
            s.connects += 1;
            s.alive = true;
        }
        Ok(FakeConnection { state })
    }
}

pub struct FakeConnection {
    state: Arc<Mutex<FakeState>>,
}

impl Reconnect for FakeConnection {
    fn is_alive(&mut self) -> bool {
        lock(&self.state).alive
    }

    fn reconnect(&mut self) -> Result<(), ConnectionError> {
        let mut s = lock(&self.state);
        s.reconnects += 1;
        s.alive = true;
        Ok(())
    }
}

impl DbConnection for FakeConnection {
    type Cursor<'a> = FakeCursor;

    fn cursor(&mut self) -> Result<Self::Cursor<'_>, ConnectionError> {
        if !lock(&self.state).alive {
            return Err(ConnectionError::NotConnected);
        }
        Ok(FakeCursor {
            state: self.state.clone(),
            rows: Vec::new(),
            row_count: 0,
            last_statement: None,
        })
    }

    fn set_autocommit(&mut self, on: bool) -> Result<(), ConnectionError> {
        lock(&self.state).autocommit.push(on);
        Ok(())
    }

    fn commit(&mut self) -> Result<(), ConnectionError> {
        lock(&self.state).commits += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), ConnectionError> {
        let mut s = lock(&self.state);
        s.closes += 1;
        s.alive = false;
        Ok(())
    }
}

pub struct FakeCursor {
    state: Arc<Mutex<FakeState>>,
    rows: Vec<Row>,
    row_count: u64,
    last_statement: Option<String>,
}

impl Cursor for FakeCursor {
    fn execute(&mut self, statement: &str, params: &[SqlValue]) -> Result<u64, ConnectionError> {
        let (alive, delay, fail_on) = {
            let s = lock(&self.state);
            (s.alive, s.execute_delay, s.fail_on.clone())
        };
        if !alive {
            return Err(ConnectionError::NotConnected);
        }
        thread::sleep(delay);
        if fail_on.is_some_and(|needle| statement.contains(&needle)) {
            return Err(ConnectionError::Sql(format!("syntax error near '{}'", statement)));
        }

        lock(&self.state).executed.push(statement.to_string());
        self.last_statement = Some(statement.to_string());
        let mut row = vec![SqlValue::Text(statement.to_string())];
        row.extend(params.iter().cloned());
        self.rows = vec![row];
        self.row_count = 1;
        Ok(1)
    }

    fn fetch_all(&mut self) -> Vec<Row> {
        std::mem::take(&mut self.rows)
    }

    fn row_count(&self) -> u64 {
        self.row_count
    }

    fn last_statement(&self) -> Option<&str> {
        self.last_statement.as_deref()
    }

    fn render_statement(&self, statement: &str, params: &[SqlValue]) -> String {
        if lock(&self.state).render {
            render_positional(statement, params)
        } else {
            self.last_statement().unwrap_or(statement).to_string()
        }
    }

    fn close(&mut self) -> Result<(), ConnectionError> {
        lock(&self.state).cursor_closes += 1;
        Ok(())
    }
}
