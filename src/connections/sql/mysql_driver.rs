use ::mysql::consts::ColumnType;
use ::mysql::prelude::Queryable;
use ::mysql::{Conn, Opts, OptsBuilder, Value};
use log::{debug, error};

use super::value::{render_positional, Row, SqlValue};
use crate::connections::connection::{Cursor, DbConnection, Reconnect, SqlDriver};
use crate::connections::errors::ConnectionError;
use crate::core::params::Params;

/// MySQL through the blocking `mysql` crate.
pub struct MySqlDriver;

impl SqlDriver for MySqlDriver {
    const NAME: &'static str = "mysql";

    type Connection = MySqlConnection;

    fn connect(params: &Params) -> Result<Self::Connection, ConnectionError> {
        let opts = opts_from_params(params)?;
        let conn = Conn::new(opts.clone()).map_err(|e| {
            error!("mysql connect error: {}", e);
            ConnectionError::from(e)
        })?;
        Ok(MySqlConnection {
            conn: Some(conn),
            opts,
        })
    }
}

fn opts_from_params(params: &Params) -> Result<Opts, ConnectionError> {
    let mut builder = OptsBuilder::new()
        .ip_or_hostname(params.str_of(&["host", "hostname"]))
        .user(params.str_of(&["user", "username"]))
        .pass(params.str_of(&["password", "passwd"]))
        .db_name(params.str_of(&["database", "db"]));
    if let Some(port) = params.port_of(&["port"])? {
        builder = builder.tcp_port(port);
    }
    if let Some(timeout) = params.millis_of(&["connect_timeout"])? {
        builder = builder.tcp_connect_timeout(Some(timeout));
    }
    Ok(builder.into())
}

pub struct MySqlConnection {
    conn: Option<Conn>,
    opts: Opts,
}

impl MySqlConnection {
    /// The driver connection, for calls the traits don't cover.
    pub fn raw(&mut self) -> Option<&mut Conn> {
        self.conn.as_mut()
    }

    fn conn(&mut self) -> Result<&mut Conn, ConnectionError> {
        self.conn.as_mut().ok_or(ConnectionError::NotConnected)
    }
}

impl Reconnect for MySqlConnection {
    fn is_alive(&mut self) -> bool {
        match self.conn.as_mut() {
            Some(conn) => conn.query_drop("SELECT 1").is_ok(),
            None => false,
        }
    }

    fn reconnect(&mut self) -> Result<(), ConnectionError> {
        self.conn = Some(Conn::new(self.opts.clone())?);
        Ok(())
    }
}

impl DbConnection for MySqlConnection {
    type Cursor<'a> = MySqlCursor<'a>;

    fn cursor(&mut self) -> Result<Self::Cursor<'_>, ConnectionError> {
        Ok(MySqlCursor {
            conn: self.conn()?,
            rows: Vec::new(),
            row_count: 0,
            last_statement: None,
        })
    }

    fn set_autocommit(&mut self, on: bool) -> Result<(), ConnectionError> {
        let statement = if on { "SET autocommit=1" } else { "SET autocommit=0" };
        self.conn()?.query_drop(statement)?;
        Ok(())
    }

    fn commit(&mut self) -> Result<(), ConnectionError> {
        self.conn()?.query_drop("COMMIT")?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), ConnectionError> {
        // Dropping the connection sends COM_QUIT.
        if self.conn.take().is_some() {
            debug!("mysql connection closed");
        }
        Ok(())
    }
}

pub struct MySqlCursor<'a> {
    conn: &'a mut Conn,
    rows: Vec<Row>,
    row_count: u64,
    last_statement: Option<String>,
}

fn to_mysql(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::NULL,
        SqlValue::Bool(b) => Value::Int(i64::from(*b)),
        SqlValue::Int(i) => Value::Int(*i),
        SqlValue::Float(f) => Value::Double(*f),
        SqlValue::Text(s) => Value::Bytes(s.clone().into_bytes()),
        SqlValue::Bytes(b) => Value::Bytes(b.clone()),
    }
}

fn from_mysql(value: Value) -> SqlValue {
    match value {
        Value::NULL => SqlValue::Null,
        Value::Int(i) => SqlValue::Int(i),
        Value::UInt(u) => match i64::try_from(u) {
            Ok(i) => SqlValue::Int(i),
            Err(_) => SqlValue::Text(u.to_string()),
        },
        Value::Float(f) => SqlValue::Float(f64::from(f)),
        Value::Double(f) => SqlValue::Float(f),
        Value::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(s) => SqlValue::Text(s),
            Err(e) => SqlValue::Bytes(e.into_bytes()),
        },
        Value::Date(y, mo, d, h, mi, s, us) => SqlValue::Text(format!(
            "{:04}-{:02}-{:02} {}",
            y,
            mo,
            d,
            clock(u32::from(h), mi, s, us)
        )),
        Value::Time(negative, days, h, mi, s, us) => SqlValue::Text(format!(
            "{}{}",
            if negative { "-" } else { "" },
            clock(days * 24 + u32::from(h), mi, s, us)
        )),
    }
}

fn clock(hours: u32, minutes: u8, seconds: u8, micros: u32) -> String {
    match micros {
        0 => format!("{:02}:{:02}:{:02}", hours, minutes, seconds),
        _ => format!("{:02}:{:02}:{:02}.{:06}", hours, minutes, seconds, micros),
    }
}

fn is_integer(column_type: ColumnType) -> bool {
    matches!(
        column_type,
        ColumnType::MYSQL_TYPE_TINY
            | ColumnType::MYSQL_TYPE_SHORT
            | ColumnType::MYSQL_TYPE_INT24
            | ColumnType::MYSQL_TYPE_LONG
            | ColumnType::MYSQL_TYPE_LONGLONG
            | ColumnType::MYSQL_TYPE_YEAR
    )
}

/// Decode one cell using its column type.
///
/// The text protocol (statements without binds) sends every cell as bytes,
/// the binary protocol sends typed values. Both end up as the same
/// `SqlValue` for the same column.
fn decode_cell(value: Value, column_type: ColumnType) -> SqlValue {
    match value {
        Value::Bytes(bytes) if is_integer(column_type) => {
            let text = String::from_utf8_lossy(&bytes);
            match (text.parse::<i64>(), text.parse::<u64>()) {
                (Ok(i), _) => SqlValue::Int(i),
                (_, Ok(u)) => SqlValue::Text(u.to_string()),
                _ => from_mysql(Value::Bytes(bytes)),
            }
        }
        Value::Bytes(bytes)
            if matches!(column_type, ColumnType::MYSQL_TYPE_FLOAT | ColumnType::MYSQL_TYPE_DOUBLE) =>
        {
            match String::from_utf8_lossy(&bytes).parse::<f64>() {
                Ok(f) => SqlValue::Float(f),
                Err(_) => from_mysql(Value::Bytes(bytes)),
            }
        }
        Value::Date(y, mo, d, ..) if column_type == ColumnType::MYSQL_TYPE_DATE => {
            SqlValue::Text(format!("{:04}-{:02}-{:02}", y, mo, d))
        }
        other => from_mysql(other),
    }
}

impl Cursor for MySqlCursor<'_> {
    fn execute(&mut self, statement: &str, params: &[SqlValue]) -> Result<u64, ConnectionError> {
        self.last_statement = Some(statement.to_string());
        let rows: Vec<::mysql::Row> = if params.is_empty() {
            self.conn.query(statement)?
        } else {
            let values = params.iter().map(to_mysql).collect::<Vec<_>>();
            self.conn.exec(statement, ::mysql::Params::Positional(values))?
        };
        self.row_count = if rows.is_empty() {
            self.conn.affected_rows()
        } else {
            rows.len() as u64
        };
        self.rows = rows
            .into_iter()
            .map(|row| {
                let types: Vec<ColumnType> = row.columns_ref().iter().map(|c| c.column_type()).collect();
                row.unwrap_raw()
                    .into_iter()
                    .zip(types)
                    .map(|(v, ty)| v.map(|v| decode_cell(v, ty)).unwrap_or(SqlValue::Null))
                    .collect()
            })
            .collect();
        Ok(self.row_count)
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
        render_positional(statement, params)
    }

    fn close(&mut self) -> Result<(), ConnectionError> {
        self.rows.clear();
        Ok(())
    }
}
