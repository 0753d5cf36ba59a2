//! Instrumenting decorators for database connections and cursors.
//!
//! `ConnectionProxy` and `CursorProxy` implement the same traits as the
//! driver objects they wrap. Only `execute`, `close` and `cursor` are
//! intercepted; every other operation is forwarded to the delegate.

use log::{error, log, warn, Level};
use std::time::{Duration, Instant};

use super::value::{Row, SqlValue};
use crate::connections::connection::{Cursor, DbConnection, Reconnect};
use crate::connections::errors::ConnectionError;

/// Statements at or above this latency are logged as warnings.
pub const DEFAULT_SLOW_QUERY_THRESHOLD: Duration = Duration::from_millis(3000);

/// Log level for a statement that took `elapsed`.
pub fn latency_level(elapsed: Duration, threshold: Duration) -> Level {
    if elapsed < threshold {
        Level::Info
    } else {
        Level::Warn
    }
}

/// Wraps a shared database connection.
///
/// `close` is a logged no-op so one test cannot kill a connection other tests
/// reuse; use [`ConnectionProxy::forced_close`] to really shut it down.
pub struct ConnectionProxy<C> {
    inner: C,
    slow_query_threshold: Duration,
}

impl<C: DbConnection> ConnectionProxy<C> {
    pub fn new(inner: C) -> Self {
        Self {
            inner,
            slow_query_threshold: DEFAULT_SLOW_QUERY_THRESHOLD,
        }
    }

    pub fn slow_query_threshold(&self) -> Duration {
        self.slow_query_threshold
    }

    /// Stored on the proxy itself, unlike every other setter.
    pub fn set_slow_query_threshold(&mut self, threshold: Duration) {
        self.slow_query_threshold = threshold;
    }

    /// Actually close the underlying connection.
    pub fn forced_close(&mut self) -> Result<(), ConnectionError> {
        self.inner.close()
    }

    /// Open a cursor, hand its proxy to `f`, then close the cursor.
    ///
    /// The closure receives the proxy rather than the raw cursor so every
    /// statement run inside the scope is still logged. The closure's result
    /// is returned unchanged, errors included.
    pub fn with_cursor<T, F>(&mut self, f: F) -> Result<T, ConnectionError>
    where
        F: FnOnce(&mut dyn Cursor) -> Result<T, ConnectionError>,
    {
        let mut cursor = self.cursor()?;
        let outcome = f(&mut cursor);
        let closed = cursor.close();
        let value = outcome?;
        closed?;
        Ok(value)
    }

    pub fn inner(&self) -> &C {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut C {
        &mut self.inner
    }

    pub fn into_inner(self) -> C {
        self.inner
    }
}

impl<C: DbConnection> Reconnect for ConnectionProxy<C> {
    fn is_alive(&mut self) -> bool {
        self.inner.is_alive()
    }

    fn reconnect(&mut self) -> Result<(), ConnectionError> {
        self.inner.reconnect()
    }
}

impl<C: DbConnection> DbConnection for ConnectionProxy<C> {
    type Cursor<'a>
        = CursorProxy<C::Cursor<'a>>
    where
        Self: 'a;

    fn cursor(&mut self) -> Result<Self::Cursor<'_>, ConnectionError> {
        let threshold = self.slow_query_threshold;
        let cursor = self.inner.cursor()?;
        Ok(CursorProxy::new(cursor, threshold))
    }

    fn set_autocommit(&mut self, on: bool) -> Result<(), ConnectionError> {
        self.inner.set_autocommit(on)
    }

    fn commit(&mut self) -> Result<(), ConnectionError> {
        self.inner.commit()
    }

    fn close(&mut self) -> Result<(), ConnectionError> {
        warn!("call `forced_close` if you really want to shut down the shared connection");
        Ok(())
    }
}

/// Wraps a cursor and logs every executed statement with its latency.
pub struct CursorProxy<K> {
    inner: K,
    slow_query_threshold: Duration,
}

impl<K: Cursor> CursorProxy<K> {
    pub fn new(inner: K, slow_query_threshold: Duration) -> Self {
        Self {
            inner,
            slow_query_threshold,
        }
    }

    pub fn inner(&self) -> &K {
        &self.inner
    }

    pub fn inner_mut(&mut self) -> &mut K {
        &mut self.inner
    }
}

impl<K: Cursor> Cursor for CursorProxy<K> {
    fn execute(&mut self, statement: &str, params: &[SqlValue]) -> Result<u64, ConnectionError> {
        let start = Instant::now();
        let result = self.inner.execute(statement, params);
        let elapsed = start.elapsed();
        let execution_time = elapsed.as_millis() as u64;

        match &result {
            Ok(_) => {
                let rendered = self.inner.render_statement(statement, params);
                let level = latency_level(elapsed, self.slow_query_threshold);
                log!(level, execution_time = execution_time; "{}", rendered);
            }
            Err(e) => {
                error!(execution_time = execution_time; "{} failed: {}", statement, e);
            }
        }
        result
    }

    fn fetch_all(&mut self) -> Vec<Row> {
        self.inner.fetch_all()
    }

    fn row_count(&self) -> u64 {
        self.inner.row_count()
    }

    fn last_statement(&self) -> Option<&str> {
        self.inner.last_statement()
    }

    fn render_statement(&self, statement: &str, params: &[SqlValue]) -> String {
        self.inner.render_statement(statement, params)
    }

    fn close(&mut self) -> Result<(), ConnectionError> {
        self.inner.close()
    }
}
