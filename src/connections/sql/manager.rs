use log::info;
use std::marker::PhantomData;
use std::time::Duration;

use super::proxy::{ConnectionProxy, DEFAULT_SLOW_QUERY_THRESHOLD};
use crate::connections::connection::{DbConnection, LazyHandle, SqlDriver};
use crate::connections::errors::ConnectionError;
use crate::core::params::Params;
use crate::core::registry::Managed;

/// Owns at most one connection per parameter set and driver.
///
/// Obtain it through [`crate::Registry::get_or_create`] so that every caller
/// asking for the same parameters shares the same connection. Autocommit is
/// switched on after every connect and reconnect.
pub struct SqlConnectionManager<D: SqlDriver> {
    params: Params,
    connection: LazyHandle<ConnectionProxy<D::Connection>>,
    slow_query_threshold: Duration,
    _driver: PhantomData<fn() -> D>,
}

impl<D: SqlDriver> Managed for SqlConnectionManager<D> {
    fn new(params: Params) -> Self {
        Self {
            params,
            connection: LazyHandle::new(D::NAME),
            slow_query_threshold: DEFAULT_SLOW_QUERY_THRESHOLD,
            _driver: PhantomData,
        }
    }
}

impl<D: SqlDriver> SqlConnectionManager<D> {
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn backend(&self) -> &'static str {
        D::NAME
    }

    /// The live, instrumented connection. Connects on first use and
    /// reconnects when the cached connection reports itself dead.
    pub fn connection(&mut self) -> Result<&mut ConnectionProxy<D::Connection>, ConnectionError> {
        let threshold = self.slow_query_threshold;
        self.connection.get_or_connect(
            &self.params,
            |params| {
                let mut proxy = ConnectionProxy::new(D::connect(params)?);
                proxy.set_slow_query_threshold(threshold);
                Ok(proxy)
            },
            |proxy| proxy.set_autocommit(true),
        )
    }

    /// Applies to the current connection and to any future one.
    pub fn set_slow_query_threshold(&mut self, threshold: Duration) {
        self.slow_query_threshold = threshold;
        if let Some(proxy) = self.connection.get_mut() {
            proxy.set_slow_query_threshold(threshold);
        }
    }

    pub fn is_connected(&self) -> bool {
        self.connection.is_connected()
    }

    /// Really close the shared connection. The next call to
    /// [`SqlConnectionManager::connection`] connects again.
    pub fn forced_close(&mut self) -> Result<(), ConnectionError> {
        match self.connection.take() {
            Some(mut proxy) => {
                info!(backend = D::NAME; "closing {} connection", D::NAME);
                proxy.forced_close()
            }
            None => Ok(()),
        }
    }
}
