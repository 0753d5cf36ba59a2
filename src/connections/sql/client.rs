use log::error;

use super::value::{Row, SqlValue};
use crate::connections::connection::{Cursor, DbConnection, SqlDriver};
use crate::core::params::Params;

/// A plain, unshared database client.
///
/// Unlike [`super::SqlConnectionManager`] there is no memoization and no
/// instrumentation; failures are logged and reported as `None`.
pub struct SqlClient<D: SqlDriver> {
    conn: Option<D::Connection>,
}

impl<D: SqlDriver> SqlClient<D> {
    /// Connect with autocommit on. A failed connect is logged and leaves the
    /// client unusable.
    pub fn connect(params: &Params) -> Self {
        let conn = match D::connect(params) {
            Ok(mut conn) => match conn.set_autocommit(true) {
                Ok(()) => Some(conn),
                Err(e) => {
                    error!("{} client autocommit error: {}", D::NAME, e);
                    Some(conn)
                }
            },
            Err(e) => {
                error!("{} client connect error: {}", D::NAME, e);
                None
            }
        };
        Self { conn }
    }

    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    /// Run a query and return all of its rows.
    pub fn execute_query(&mut self, query: &str, params: &[SqlValue]) -> Option<Vec<Row>> {
        let conn = self.conn.as_mut()?;
        let result = conn.cursor().and_then(|mut cursor| {
            cursor.execute(query, params)?;
            Ok(cursor.fetch_all())
        });
        match result {
            Ok(rows) => Some(rows),
            Err(e) => {
                error!("{} client execute query error: {}", D::NAME, e);
                None
            }
        }
    }

    /// Run an insert/update/delete and return the affected row count,
    /// committing afterwards when `commit` is set.
    pub fn execute_no_query(&mut self, sql: &str, params: &[SqlValue], commit: bool) -> Option<u64> {
        let conn = self.conn.as_mut()?;
        let result = conn.cursor().and_then(|mut cursor| cursor.execute(sql, params));
        let affected = match result {
            Ok(n) => Some(n),
            Err(e) => {
                error!("{} client execute no_query sql error: {}", D::NAME, e);
                None
            }
        };
        if commit {
            if let Err(e) = conn.commit() {
                error!("{} client commit error: {}", D::NAME, e);
            }
        }
        affected
    }

    pub fn disconnect(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            if let Err(e) = conn.close() {
                error!("{} client close error: {}", D::NAME, e);
            }
        }
    }
}

impl<D: SqlDriver> Drop for SqlClient<D> {
    fn drop(&mut self) {
        self.disconnect();
    }
}
