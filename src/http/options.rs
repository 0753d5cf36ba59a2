use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::time::Duration;

/// Options of a single request. Defaults set on the client are merged with
/// per-call options; see [`RequestOptions::merge`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RequestOptions {
    pub timeout: Option<Duration>,
    pub headers: BTreeMap<String, String>,
    pub query: BTreeMap<String, String>,
    pub form: BTreeMap<String, String>,
    pub json: Option<Value>,
    pub body: Option<String>,
    /// Proxy for plain-http traffic.
    pub proxy: Option<String>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    pub fn query(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(name.into(), value.into());
        self
    }

    pub fn form(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.form.insert(name.into(), value.into());
        self
    }

    pub fn json(mut self, json: Value) -> Self {
        self.json = Some(json);
        self
    }

    pub fn body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    pub fn proxy(mut self, proxy: impl Into<String>) -> Self {
        self.proxy = Some(proxy.into());
        self
    }

    /// `self` with `overrides` applied on top.
    ///
    /// Maps are merged key by key and JSON objects recursively; on every
    /// conflict the override wins. A request carries one kind of body, so a
    /// per-call `json`, `form` or `body` drops the other kinds from `self`.
    pub fn merge(&self, overrides: &RequestOptions) -> RequestOptions {
        let mut merged = self.clone();
        if overrides.json.is_some() {
            merged.form.clear();
            merged.body = None;
        } else if !overrides.form.is_empty() {
            merged.json = None;
            merged.body = None;
        } else if overrides.body.is_some() {
            merged.json = None;
            merged.form.clear();
        }
        if overrides.timeout.is_some() {
            merged.timeout = overrides.timeout;
        }
        merged.headers.extend(overrides.headers.clone());
        merged.query.extend(overrides.query.clone());
        merged.form.extend(overrides.form.clone());
        merged.json = match (merged.json.take(), &overrides.json) {
            (Some(base), Some(over)) => Some(merge_json(base, over)),
            (base, None) => base,
            (None, Some(over)) => Some(over.clone()),
        };
        if overrides.body.is_some() {
            merged.body = overrides.body.clone();
        }
        if overrides.proxy.is_some() {
            merged.proxy = overrides.proxy.clone();
        }
        merged
    }

    /// What `"start request"` logs under `parameters`.
    pub fn to_log_value(&self) -> Value {
        let mut out = Map::new();
        if let Some(timeout) = self.timeout {
            out.insert("timeout".into(), Value::from(timeout.as_secs_f64()));
        }
        for (name, map) in [("headers", &self.headers), ("params", &self.query), ("data", &self.form)] {
            if !map.is_empty() {
                let object: Map<String, Value> =
                    map.iter().map(|(k, v)| (k.clone(), Value::String(v.clone()))).collect();
                out.insert(name.into(), Value::Object(object));
            }
        }
        if let Some(json) = &self.json {
            out.insert("json".into(), json.clone());
        }
        if let Some(body) = &self.body {
            out.insert("body".into(), Value::String(body.clone()));
        }
        if let Some(proxy) = &self.proxy {
            out.insert("proxies".into(), serde_json::json!({ "http": proxy }));
        }
        Value::Object(out)
    }
}

fn merge_json(base: Value, over: &Value) -> Value {
    match (base, over) {
        (Value::Object(mut base), Value::Object(over)) => {
            for (key, value) in over {
                let merged = match base.remove(key) {
                    Some(existing) => merge_json(existing, value),
                    None => value.clone(),
                };
                base.insert(key.clone(), merged);
            }
            Value::Object(base)
        }
        (_, over) => over.clone(),
    }
}
