use ::postgres::types::{to_sql_checked, FromSql, IsNull, ToSql, Type};
use ::postgres::{Client, Config, NoTls};
use bytes::BytesMut;
use chrono::{DateTime, NaiveDate, NaiveDateTime, NaiveTime, Utc};
use log::{debug, error};
use std::error::Error;
use uuid::Uuid;

use super::value::{Row, SqlValue};
use crate::connections::connection::{Cursor, DbConnection, Reconnect, SqlDriver};
use crate::connections::errors::ConnectionError;
use crate::core::params::Params;

/// PostgreSQL through the blocking `postgres` crate.
///
/// The driver cannot render bound parameters, so executed statements are
/// logged as the statement text.
pub struct PostgresDriver;

impl SqlDriver for PostgresDriver {
    const NAME: &'static str = "postgres";

    type Connection = PostgresConnection;

    fn connect(params: &Params) -> Result<Self::Connection, ConnectionError> {
        let config = config_from_params(params)?;
        let client = config.connect(NoTls).map_err(|e| {
            error!("pg connection error: {}", e);
            ConnectionError::from(e)
        })?;
        Ok(PostgresConnection {
            client: Some(client),
            config,
            autocommit: true,
            in_transaction: false,
        })
    }
}

fn config_from_params(params: &Params) -> Result<Config, ConnectionError> {
    let mut config = Config::new();
    config.host(&params.str_of(&["host", "hostname"]).unwrap_or_else(|| "localhost".into()));
    if let Some(port) = params.port_of(&["port"])? {
        config.port(port);
    }
    if let Some(user) = params.str_of(&["user", "username"]) {
        config.user(&user);
    }
    if let Some(password) = params.str_of(&["password", "passwd"]) {
        config.password(password);
    }
    if let Some(dbname) = params.str_of(&["database", "dbname", "db"]) {
        config.dbname(&dbname);
    }
    if let Some(timeout) = params.millis_of(&["connect_timeout"])? {
        config.connect_timeout(timeout);
    }
    Ok(config)
}

pub struct PostgresConnection {
    client: Option<Client>,
    config: Config,
    autocommit: bool,
    in_transaction: bool,
}

impl PostgresConnection {
    /// The driver client, for calls the traits don't cover.
    pub fn raw(&mut self) -> Option<&mut Client> {
        self.client.as_mut()
    }
}

impl Reconnect for PostgresConnection {
    fn is_alive(&mut self) -> bool {
        self.client.as_ref().is_some_and(|c| !c.is_closed())
    }

    fn reconnect(&mut self) -> Result<(), ConnectionError> {
        self.client = Some(self.config.connect(NoTls)?);
        self.in_transaction = false;
        Ok(())
    }
}

impl DbConnection for PostgresConnection {
    type Cursor<'a> = PostgresCursor<'a>;

    fn cursor(&mut self) -> Result<Self::Cursor<'_>, ConnectionError> {
        let client = self.client.as_mut().ok_or(ConnectionError::NotConnected)?;
        Ok(PostgresCursor {
            client,
            autocommit: self.autocommit,
            in_transaction: &mut self.in_transaction,
            rows: Vec::new(),
            row_count: 0,
            last_statement: None,
        })
    }

    /// Postgres has no session autocommit switch; with autocommit off a
    /// transaction is opened before the first statement.
    fn set_autocommit(&mut self, on: bool) -> Result<(), ConnectionError> {
        self.autocommit = on;
        if on && self.in_transaction {
            self.commit()?;
        }
        Ok(())
    }

    fn commit(&mut self) -> Result<(), ConnectionError> {
        if self.in_transaction {
            let client = self.client.as_mut().ok_or(ConnectionError::NotConnected)?;
            client.batch_execute("COMMIT")?;
            self.in_transaction = false;
        }
        Ok(())
    }

    fn close(&mut self) -> Result<(), ConnectionError> {
        if let Some(client) = self.client.take() {
            client.close()?;
            debug!("postgres connection closed");
        }
        self.in_transaction = false;
        Ok(())
    }
}

pub struct PostgresCursor<'a> {
    client: &'a mut Client,
    autocommit: bool,
    in_transaction: &'a mut bool,
    rows: Vec<Row>,
    row_count: u64,
    last_statement: Option<String>,
}

impl Cursor for PostgresCursor<'_> {
    fn execute(&mut self, statement: &str, params: &[SqlValue]) -> Result<u64, ConnectionError> {
        self.last_statement = Some(statement.to_string());
        if !self.autocommit && !*self.in_transaction {
            self.client.batch_execute("BEGIN")?;
            *self.in_transaction = true;
        }

        let bound: Vec<&(dyn ToSql + Sync)> = params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
        let prepared = self.client.prepare(statement)?;
        if prepared.columns().is_empty() {
            self.rows.clear();
            self.row_count = self.client.execute(&prepared, &bound)?;
        } else {
            let rows = self.client.query(&prepared, &bound)?;
            self.row_count = rows.len() as u64;
            self.rows = rows.iter().map(decode_row).collect::<Result<_, _>>()?;
        }
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

    fn close(&mut self) -> Result<(), ConnectionError> {
        self.rows.clear();
        Ok(())
    }
}

fn decode_row(row: &::postgres::Row) -> Result<Row, ConnectionError> {
    (0..row.len())
        .map(|idx| row.try_get::<_, SqlValue>(idx).map_err(ConnectionError::from))
        .collect()
}

type DecodeError = Box<dyn Error + Sync + Send>;

/// Column decoding. Types without a native `SqlValue` variant (dates, uuids,
/// json, numeric) come back as their text form; anything else is an error.
impl<'a> FromSql<'a> for SqlValue {
    fn from_sql(ty: &Type, raw: &'a [u8]) -> Result<Self, DecodeError> {
        let value = match *ty {
            Type::BOOL => SqlValue::Bool(bool::from_sql(ty, raw)?),
            Type::CHAR => SqlValue::Int(i64::from(i8::from_sql(ty, raw)?)),
            Type::INT2 => SqlValue::Int(i64::from(i16::from_sql(ty, raw)?)),
            Type::INT4 => SqlValue::Int(i64::from(i32::from_sql(ty, raw)?)),
            Type::INT8 => SqlValue::Int(i64::from_sql(ty, raw)?),
            Type::OID => SqlValue::Int(i64::from(u32::from_sql(ty, raw)?)),
            Type::FLOAT4 => SqlValue::Float(f64::from(f32::from_sql(ty, raw)?)),
            Type::FLOAT8 => SqlValue::Float(f64::from_sql(ty, raw)?),
            Type::BYTEA => SqlValue::Bytes(Vec::<u8>::from_sql(ty, raw)?),
            Type::NUMERIC => SqlValue::Text(decode_numeric(raw)?),
            Type::TIMESTAMP => SqlValue::Text(NaiveDateTime::from_sql(ty, raw)?.to_string()),
            Type::TIMESTAMPTZ => SqlValue::Text(DateTime::<Utc>::from_sql(ty, raw)?.to_rfc3339()),
            Type::DATE => SqlValue::Text(NaiveDate::from_sql(ty, raw)?.to_string()),
            Type::TIME => SqlValue::Text(NaiveTime::from_sql(ty, raw)?.to_string()),
            Type::UUID => SqlValue::Text(Uuid::from_sql(ty, raw)?.to_string()),
            Type::JSON | Type::JSONB => SqlValue::Text(serde_json::Value::from_sql(ty, raw)?.to_string()),
            _ if <&str as FromSql>::accepts(ty) => SqlValue::Text(<&str>::from_sql(ty, raw)?.to_string()),
            _ => return Err(format!("cannot decode postgres type {}", ty).into()),
        };
        Ok(value)
    }

    fn from_sql_null(_ty: &Type) -> Result<Self, DecodeError> {
        Ok(SqlValue::Null)
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }
}

fn be_u16(raw: &[u8], word: usize) -> Result<u16, DecodeError> {
    raw.get(word * 2..word * 2 + 2)
        .map(|b| u16::from_be_bytes([b[0], b[1]]))
        .ok_or_else(|| "truncated numeric value".into())
}

/// NUMERIC in binary form: digit count, weight, sign and display scale,
/// followed by base-10000 digits.
fn decode_numeric(raw: &[u8]) -> Result<String, DecodeError> {
    let ndigits = usize::from(be_u16(raw, 0)?);
    let weight = i64::from(be_u16(raw, 1)? as i16);
    let sign = be_u16(raw, 2)?;
    let scale = usize::from(be_u16(raw, 3)?);
    match sign {
        0xC000 => return Ok("NaN".into()),
        0xD000 => return Ok("Infinity".into()),
        0xF000 => return Ok("-Infinity".into()),
        _ => {}
    }
    let digits = (0..ndigits).map(|i| be_u16(raw, 4 + i)).collect::<Result<Vec<_>, _>>()?;
    let digit = |idx: i64| usize::try_from(idx).ok().and_then(|i| digits.get(i).copied()).unwrap_or(0);

    let mut out = String::new();
    if sign == 0x4000 {
        out.push('-');
    }
    if weight < 0 {
        out.push('0');
    } else {
        out.push_str(&digit(0).to_string());
        for idx in 1..=weight {
            out.push_str(&format!("{:04}", digit(idx)));
        }
    }
    if scale > 0 {
        let mut fraction = String::new();
        let mut idx = weight + 1;
        while fraction.len() < scale {
            fraction.push_str(&format!("{:04}", digit(idx)));
            idx += 1;
        }
        fraction.truncate(scale);
        out.push('.');
        out.push_str(&fraction);
    }
    Ok(out)
}

impl ToSql for SqlValue {
    fn to_sql(&self, ty: &Type, out: &mut BytesMut) -> Result<IsNull, Box<dyn Error + Sync + Send>> {
        match self {
            SqlValue::Null => Ok(IsNull::Yes),
            SqlValue::Bool(b) => b.to_sql(ty, out),
            SqlValue::Int(i) => match *ty {
                Type::INT2 => i16::try_from(*i)?.to_sql(ty, out),
                Type::INT4 => i32::try_from(*i)?.to_sql(ty, out),
                _ => i.to_sql(ty, out),
            },
            SqlValue::Float(f) => match *ty {
                Type::FLOAT4 => (*f as f32).to_sql(ty, out),
                _ => f.to_sql(ty, out),
            },
            SqlValue::Text(s) => s.to_sql(ty, out),
            SqlValue::Bytes(b) => b.to_sql(ty, out),
        }
    }

    fn accepts(_ty: &Type) -> bool {
        true
    }

    to_sql_checked!();
}
