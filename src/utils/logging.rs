use env_logger::Builder;
use log::kv::{self, Key, Value as KvValue, VisitSource};
use log::{LevelFilter, Record};
use serde_json::{Map, Value};
use std::io::Write;

/// Environment variable switching the output format; `json` gives one JSON
/// object per line, anything else the default human-readable format.
pub const LOG_FORMAT_VAR: &str = "QAKIT_LOG_FORMAT";

/// Collects the structured fields of a record.
struct JsonFields(Map<String, Value>);

impl<'kvs> VisitSource<'kvs> for JsonFields {
    fn visit_pair(&mut self, key: Key<'kvs>, value: KvValue<'kvs>) -> Result<(), kv::Error> {
        self.0.insert(key.as_str().to_string(), to_json(&value));
        Ok(())
    }
}

fn to_json(value: &KvValue<'_>) -> Value {
    if let Some(b) = value.to_bool() {
        Value::Bool(b)
    } else if let Some(u) = value.to_u64() {
        Value::from(u)
    } else if let Some(i) = value.to_i64() {
        Value::from(i)
    } else if let Some(f) = value.to_f64() {
        Value::from(f)
    } else {
        Value::String(value.to_string())
    }
}

/// One log line as a JSON object: level, logger, message plus every
/// structured field of the record.
pub fn record_to_json(record: &Record<'_>) -> Value {
    let mut fields = JsonFields(Map::new());
    // A failing visitor only loses extra fields.
    let _ = record.key_values().visit(&mut fields);
    let mut object = fields.0;
    object.insert("levelname".into(), Value::String(record.level().to_string()));
    object.insert("name".into(), Value::String(record.target().to_string()));
    object.insert("message".into(), Value::String(record.args().to_string()));
    Value::Object(object)
}

/// Initialize logging using env_logger.
/// By default, this reads the RUST_LOG environment variable for filtering.
/// e.g., `RUST_LOG=qakit=debug QAKIT_LOG_FORMAT=json qakit redis --host cache`
pub fn init_logging() {
    let mut builder = Builder::from_default_env();
    if std::env::var("RUST_LOG").is_err() {
        builder.filter(None, LevelFilter::Info);
    }
    if std::env::var(LOG_FORMAT_VAR).is_ok_and(|f| f.eq_ignore_ascii_case("json")) {
        builder.format(|buf, record| writeln!(buf, "{}", record_to_json(record)));
    }
    // Tests and embedding applications may have installed a logger already.
    let _ = builder.try_init();
}
