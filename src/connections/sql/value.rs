use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};

/// A driver-independent SQL value, used for bound parameters and result rows.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SqlValue {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Text(String),
    Bytes(Vec<u8>),
}

pub type Row = Vec<SqlValue>;

impl SqlValue {
    /// SQL literal form, used when rendering statements for the log.
    pub fn to_literal(&self) -> String {
        match self {
            SqlValue::Null => "NULL".to_string(),
            SqlValue::Bool(b) => if *b { "1" } else { "0" }.to_string(),
            SqlValue::Int(i) => i.to_string(),
            SqlValue::Float(f) => f.to_string(),
            SqlValue::Text(s) => format!("'{}'", s.replace('\\', "\\\\").replace('\'', "\\'")),
            SqlValue::Bytes(b) => {
                let hex: String = b.iter().map(|byte| format!("{:02x}", byte)).collect();
                format!("x'{}'", hex)
            }
        }
    }
}

impl Display for SqlValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SqlValue::Null => write!(f, "NULL"),
            SqlValue::Text(s) => write!(f, "{}", s),
            other => write!(f, "{}", other.to_literal()),
        }
    }
}

impl From<&str> for SqlValue {
    fn from(v: &str) -> Self {
        SqlValue::Text(v.to_string())
    }
}

impl From<String> for SqlValue {
    fn from(v: String) -> Self {
        SqlValue::Text(v)
    }
}

impl From<i64> for SqlValue {
    fn from(v: i64) -> Self {
        SqlValue::Int(v)
    }
}

impl From<i32> for SqlValue {
    fn from(v: i32) -> Self {
        SqlValue::Int(i64::from(v))
    }
}

impl From<f64> for SqlValue {
    fn from(v: f64) -> Self {
        SqlValue::Float(v)
    }
}

impl From<bool> for SqlValue {
    fn from(v: bool) -> Self {
        SqlValue::Bool(v)
    }
}

impl<T: Into<SqlValue>> From<Option<T>> for SqlValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(SqlValue::Null)
    }
}

/// Replace each `?` placeholder outside quoted literals with the literal of
/// the next parameter. Surplus placeholders are left untouched.
pub fn render_positional(statement: &str, params: &[SqlValue]) -> String {
    let mut out = String::with_capacity(statement.len());
    let mut values = params.iter();
    let mut quote: Option<char> = None;
    for ch in statement.chars() {
        match (ch, quote) {
            ('\'' | '"' | '`', None) => {
                quote = Some(ch);
                out.push(ch);
            }
            (c, Some(q)) if c == q => {
                quote = None;
                out.push(ch);
            }
            ('?', None) => match values.next() {
                Some(v) => out.push_str(&v.to_literal()),
                None => out.push('?'),
            },
            _ => out.push(ch),
        }
    }
    out
}
