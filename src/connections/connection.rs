use log::info;

use super::errors::ConnectionError;
use super::sql::value::{Row, SqlValue};
use crate::core::params::Params;

/// Liveness probe shared by every backend handle (SQL, SSH, Redis).
///
/// Drivers disagree on how they report a dropped link (an "open" flag, an
/// "is connected" probe, a failed keepalive); this pair hides the difference.
pub trait Reconnect {
    fn is_alive(&mut self) -> bool;
    fn reconnect(&mut self) -> Result<(), ConnectionError>;
}

/// A cursor-like object: executes statements and buffers their rows.
pub trait Cursor {
    /// Run `statement` with positional `params`; returns the affected row count.
    fn execute(&mut self, statement: &str, params: &[SqlValue]) -> Result<u64, ConnectionError>;

    /// Drain the rows buffered by the last `execute`.
    fn fetch_all(&mut self) -> Vec<Row>;

    fn row_count(&self) -> u64;

    fn last_statement(&self) -> Option<&str>;

    /// Text written to the log for an executed statement.
    ///
    /// Drivers able to render bound parameters override this; the default is
    /// the statement text the driver last executed.
    fn render_statement(&self, statement: &str, _params: &[SqlValue]) -> String {
        self.last_statement().unwrap_or(statement).to_string()
    }

    fn close(&mut self) -> Result<(), ConnectionError>;
}

/// A database connection handing out cursors.
pub trait DbConnection: Reconnect {
    type Cursor<'a>: Cursor
    where
        Self: 'a;

    fn cursor(&mut self) -> Result<Self::Cursor<'_>, ConnectionError>;
    fn set_autocommit(&mut self, on: bool) -> Result<(), ConnectionError>;
    fn commit(&mut self) -> Result<(), ConnectionError>;
    fn close(&mut self) -> Result<(), ConnectionError>;
}

/// Entry point of a concrete SQL driver.
pub trait SqlDriver: Send + 'static {
    /// Backend name used in log lines.
    const NAME: &'static str;

    type Connection: DbConnection + Send;

    fn connect(params: &Params) -> Result<Self::Connection, ConnectionError>;
}

/// Zero-or-one cached handle, established on first use and transparently
/// re-established when its liveness probe fails.
pub struct LazyHandle<H> {
    backend: &'static str,
    handle: Option<H>,
}

impl<H: Reconnect> LazyHandle<H> {
    pub fn new(backend: &'static str) -> Self {
        Self {
            backend,
            handle: None,
        }
    }

    /// Return the cached handle, connecting or reconnecting as needed.
    /// `on_ready` runs after every (re)connect.
    pub fn get_or_connect<C, R>(
        &mut self,
        params: &Params,
        connect: C,
        mut on_ready: R,
    ) -> Result<&mut H, ConnectionError>
    where
        C: FnOnce(&Params) -> Result<H, ConnectionError>,
        R: FnMut(&mut H) -> Result<(), ConnectionError>,
    {
        if self.handle.is_none() {
            let shown = params.to_string();
            info!(backend = self.backend, params = shown.as_str(); "start to connect {}", self.backend);
            let mut handle = connect(params)?;
            on_ready(&mut handle)?;
            self.handle = Some(handle);
        } else if let Some(handle) = self.handle.as_mut() {
            if !handle.is_alive() {
                info!(backend = self.backend; "trying to reconnect {}", self.backend);
                handle.reconnect()?;
                on_ready(handle)?;
            }
        }
        self.handle.as_mut().ok_or(ConnectionError::NotConnected)
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_some()
    }

    pub fn get_mut(&mut self) -> Option<&mut H> {
        self.handle.as_mut()
    }

    /// Forget the cached handle, handing it to the caller.
    pub fn take(&mut self) -> Option<H> {
        self.handle.take()
    }
}
