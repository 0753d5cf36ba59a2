use std::collections::BTreeMap;
use std::fmt::{self, Display};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::connections::errors::ConnectionError;

/// Keys whose values never show up in logs.
const MASKED_KEYS: &[&str] = &["password", "passwd", "secret"];

/// A single connection parameter value.
///
/// Only hashable, totally ordered primitives are allowed so that two
/// parameter sets can be compared by value.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Bool(bool),
    Int(i64),
    Str(String),
}

impl ParamValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ParamValue::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Integers, and strings that parse as integers.
    pub fn as_int(&self) -> Option<i64> {
        match self {
            ParamValue::Int(i) => Some(*i),
            ParamValue::Str(s) => s.trim().parse().ok(),
            ParamValue::Bool(_) => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            ParamValue::Bool(b) => Some(*b),
            ParamValue::Int(i) => Some(*i != 0),
            ParamValue::Str(s) => s.parse().ok(),
        }
    }
}

impl Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParamValue::Bool(b) => write!(f, "{}", b),
            ParamValue::Int(i) => write!(f, "{}", i),
            ParamValue::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<&str> for ParamValue {
    fn from(value: &str) -> Self {
        ParamValue::Str(value.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(value: String) -> Self {
        ParamValue::Str(value)
    }
}

impl From<i64> for ParamValue {
    fn from(value: i64) -> Self {
        ParamValue::Int(value)
    }
}

impl From<u16> for ParamValue {
    fn from(value: u16) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<i32> for ParamValue {
    fn from(value: i32) -> Self {
        ParamValue::Int(i64::from(value))
    }
}

impl From<bool> for ParamValue {
    fn from(value: bool) -> Self {
        ParamValue::Bool(value)
    }
}

/// The constructor parameters of a manager.
///
/// Backed by a `BTreeMap`, so equality and hashing ignore insertion order:
/// `host=a, port=1` and `port=1, host=a` are the same key.
#[derive(Debug, Clone, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Params(BTreeMap<String, ParamValue>);

impl Params {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<ParamValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<ParamValue>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get(&self, key: &str) -> Option<&ParamValue> {
        self.0.get(key)
    }

    /// First present string value among `keys` (e.g. `host` then `hostname`).
    pub fn str_of(&self, keys: &[&str]) -> Option<String> {
        keys.iter()
            .filter_map(|k| self.0.get(*k))
            .map(|v| v.to_string())
            .find(|s| !s.trim().is_empty())
    }

    pub fn int_of(&self, keys: &[&str]) -> Option<i64> {
        keys.iter().filter_map(|k| self.0.get(*k)).find_map(|v| v.as_int())
    }

    pub fn bool_of(&self, keys: &[&str]) -> Option<bool> {
        keys.iter().filter_map(|k| self.0.get(*k)).find_map(|v| v.as_bool())
    }

    /// A TCP port; values outside `0..=65535` are a usage error.
    pub fn port_of(&self, keys: &[&str]) -> Result<Option<u16>, ConnectionError> {
        self.int_of(keys)
            .map(|p| u16::try_from(p).map_err(|_| ConnectionError::Usage(format!("invalid port {}", p))))
            .transpose()
    }

    /// A duration given in milliseconds; negative values are a usage error.
    pub fn millis_of(&self, keys: &[&str]) -> Result<Option<Duration>, ConnectionError> {
        self.int_of(keys)
            .map(|ms| {
                u64::try_from(ms)
                    .map(Duration::from_millis)
                    .map_err(|_| ConnectionError::Usage(format!("invalid duration {}ms", ms)))
            })
            .transpose()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &ParamValue)> {
        self.0.iter()
    }

    /// Build from a JSON object.
    ///
    /// Floats, arrays, objects and `null` cannot take part in a registry key
    /// and are rejected with `UnhashableParam`.
    pub fn from_json(value: &serde_json::Value) -> Result<Self, ConnectionError> {
        let object = value
            .as_object()
            .ok_or_else(|| ConnectionError::Usage("parameters must be a JSON object".into()))?;
        let mut params = Params::new();
        for (key, value) in object {
            let value = match value {
                serde_json::Value::String(s) => ParamValue::Str(s.clone()),
                serde_json::Value::Bool(b) => ParamValue::Bool(*b),
                serde_json::Value::Number(n) => match n.as_i64() {
                    Some(i) => ParamValue::Int(i),
                    None => return Err(ConnectionError::UnhashableParam(key.clone())),
                },
                _ => return Err(ConnectionError::UnhashableParam(key.clone())),
            };
            params.insert(key.clone(), value);
        }
        Ok(params)
    }

    /// Parse `key=value` strings as typed on a command line.
    pub fn from_pairs<I, S>(pairs: I) -> Result<Self, ConnectionError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut params = Params::new();
        for pair in pairs {
            let pair = pair.as_ref();
            let (key, raw) = pair
                .split_once('=')
                .ok_or_else(|| ConnectionError::Usage(format!("expected key=value, got '{}'", pair)))?;
            let value = match raw {
                "true" => ParamValue::Bool(true),
                "false" => ParamValue::Bool(false),
                _ => match raw.parse::<i64>() {
                    Ok(i) => ParamValue::Int(i),
                    Err(_) => ParamValue::Str(raw.to_string()),
                },
            };
            params.insert(key.trim(), value);
        }
        Ok(params)
    }
}

impl<K, V> FromIterator<(K, V)> for Params
where
    K: Into<String>,
    V: Into<ParamValue>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Params(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Renders `key=value` pairs with secrets masked; used for log fields.
impl Display for Params {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for (key, value) in &self.0 {
            if !first {
                write!(f, " ")?;
            }
            first = false;
            if MASKED_KEYS.contains(&key.as_str()) {
                write!(f, "{}=***", key)?;
            } else {
                write!(f, "{}={}", key, value)?;
            }
        }
        Ok(())
    }
}
