//! A logger that remembers every record emitted on the current thread.
//!
//! Records are also forwarded to `env_logger` (in test mode), so output still
//! appears with `-- --nocapture` or when a test fails. Capture is
//! thread-local, which keeps tests running in parallel from seeing each
//! other's records.

use log::kv::{self, Key, Value, VisitSource};
use log::{Level, LevelFilter, Log, Metadata, Record};
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::sync::OnceLock;

#[derive(Debug, Clone)]
pub struct Captured {
    pub level: Level,
    pub message: String,
    pub fields: BTreeMap<String, String>,
}

impl Captured {
    pub fn field(&self, key: &str) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    pub fn field_u64(&self, key: &str) -> Option<u64> {
        self.field(key).and_then(|v| v.parse().ok())
    }
}

thread_local! {
    static RECORDS: RefCell<Vec<Captured>> = const { RefCell::new(Vec::new()) };
}

struct Fields(BTreeMap<String, String>);

impl<'kvs> VisitSource<'kvs> for Fields {
    fn visit_pair(&mut self, key: Key<'kvs>, value: Value<'kvs>) -> Result<(), kv::Error> {
        self.0.insert(key.as_str().to_string(), value.to_string());
        Ok(())
    }
}

struct CaptureLogger {
    inner: env_logger::Logger,
}

impl Log for CaptureLogger {
    fn enabled(&self, _metadata: &Metadata) -> bool {
        true
    }

    fn log(&self, record: &Record) {
        let mut fields = Fields(BTreeMap::new());
        let _ = record.key_values().visit(&mut fields);
        let captured = Captured {
            level: record.level(),
            message: record.args().to_string(),
            fields: fields.0,
        };
        RECORDS.with(|records| records.borrow_mut().push(captured));

        if self.inner.matches(record) {
            self.inner.log(record);
        }
    }

    fn flush(&self) {
        self.inner.flush();
    }
}

static LOGGER: OnceLock<CaptureLogger> = OnceLock::new();

/// Install the logger (once per test binary) and forget this thread's
/// earlier records.
pub fn install() {
    let logger = LOGGER.get_or_init(|| CaptureLogger {
        inner: env_logger::Builder::from_default_env()
            .filter_level(LevelFilter::Debug)
            .is_test(true)
            .build(),
    });
    if log::set_logger(logger).is_ok() {
        log::set_max_level(LevelFilter::Trace);
    }
    RECORDS.with(|records| records.borrow_mut().clear());
}

/// Everything logged on this thread since `install`.
pub fn records() -> Vec<Captured> {
    RECORDS.with(|records| records.borrow().clone())
}

/// Records whose message contains `needle`.
pub fn find(needle: &str) -> Vec<Captured> {
    records()
        .into_iter()
        .filter(|r| r.message.contains(needle))
        .collect()
}
