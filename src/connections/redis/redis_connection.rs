use log::{error, info};
use ::redis::{Client, Connection, ConnectionLike};
use std::net::Ipv6Addr;
use urlencoding::encode;

use crate::connections::connection::{LazyHandle, Reconnect};
use crate::connections::errors::ConnectionError;
use crate::core::params::Params;
use crate::core::registry::Managed;

/// Build a `redis://` URL from manager parameters. A `url` parameter wins.
pub fn redis_url(params: &Params) -> Result<String, ConnectionError> {
    if let Some(url) = params.str_of(&["url"]) {
        return Ok(url);
    }
    let host = params.str_of(&["host"]).unwrap_or_else(|| "127.0.0.1".into());
    let host = match host.parse::<Ipv6Addr>() {
        Ok(_) => format!("[{}]", host),
        Err(_) => host,
    };
    let port = params.port_of(&["port"])?.unwrap_or(6379);
    let db = params.int_of(&["db"]).unwrap_or(0);
    let auth = match (params.str_of(&["username"]), params.str_of(&["password"])) {
        (Some(user), Some(pass)) => format!("{}:{}@", encode(&user), encode(&pass)),
        (None, Some(pass)) => format!(":{}@", encode(&pass)),
        (Some(user), None) => format!("{}@", encode(&user)),
        (None, None) => String::new(),
    };
    Ok(format!("redis://{}{}:{}/{}", auth, host, port, db))
}

/// A synchronous Redis connection returning decoded strings.
pub struct RedisConnection {
    client: Client,
    conn: Connection,
}

impl RedisConnection {
    pub fn open(url: &str) -> Result<Self, ConnectionError> {
        let client = Client::open(url)?;
        let conn = client.get_connection()?;
        Ok(Self { client, conn })
    }

    pub fn get(&mut self, key: &str) -> Result<Option<String>, ConnectionError> {
        Ok(::redis::cmd("GET").arg(key).query::<Option<String>>(&mut self.conn)?)
    }

    pub fn set(&mut self, key: &str, value: &str) -> Result<(), ConnectionError> {
        ::redis::cmd("SET").arg(key).arg(value).query::<()>(&mut self.conn)?;
        Ok(())
    }

    /// Returns whether the key existed.
    pub fn delete(&mut self, key: &str) -> Result<bool, ConnectionError> {
        let deleted: i64 = ::redis::cmd("DEL").arg(key).query(&mut self.conn)?;
        Ok(deleted > 0)
    }

    pub fn ping(&mut self) -> Result<String, ConnectionError> {
        Ok(::redis::cmd("PING").query::<String>(&mut self.conn)?)
    }

    /// The driver connection, for every other command.
    pub fn raw(&mut self) -> &mut Connection {
        &mut self.conn
    }
}

impl Reconnect for RedisConnection {
    fn is_alive(&mut self) -> bool {
        self.conn.is_open()
    }

    fn reconnect(&mut self) -> Result<(), ConnectionError> {
        self.conn = self.client.get_connection()?;
        Ok(())
    }
}

/// Memoized Redis connection for one parameter set.
pub struct RedisConnectionMgr {
    params: Params,
    client: LazyHandle<RedisConnection>,
}

impl Managed for RedisConnectionMgr {
    fn new(params: Params) -> Self {
        Self {
            params,
            client: LazyHandle::new("redis"),
        }
    }
}

impl RedisConnectionMgr {
    pub fn params(&self) -> &Params {
        &self.params
    }

    pub fn client(&mut self) -> Result<&mut RedisConnection, ConnectionError> {
        self.client
            .get_or_connect(&self.params, |params| RedisConnection::open(&redis_url(params)?), |_| Ok(()))
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_connected()
    }

    /// Drop the shared connection; the next `client()` opens a new one.
    pub fn forced_close(&mut self) -> Result<(), ConnectionError> {
        if self.client.take().is_some() {
            info!("redis connection closed");
        }
        Ok(())
    }
}

/// A plain Redis client whose failures are logged, not returned.
pub struct RedisClient {
    conn: Option<RedisConnection>,
}

impl RedisClient {
    pub fn connect(params: &Params) -> Self {
        match redis_url(params).and_then(|url| RedisConnection::open(&url)) {
            Ok(conn) => Self { conn: Some(conn) },
            Err(e) => {
                error!("redis client connect error: {}", e);
                Self { conn: None }
            }
        }
    }

    /// Value stored at `key`, `None` when absent or on error.
    pub fn get_information(&mut self, key: &str) -> Option<String> {
        let conn = self.conn.as_mut()?;
        match conn.get(key) {
            Ok(value) => value,
            Err(e) => {
                error!("redis get data error: {}", e);
                None
            }
        }
    }

    /// Returns whether the value was stored.
    pub fn set_value(&mut self, key: &str, value: &str) -> bool {
        let Some(conn) = self.conn.as_mut() else {
            return false;
        };
        match conn.set(key, value) {
            Ok(()) => true,
            Err(e) => {
                error!("redis set datas error: {}", e);
                false
            }
        }
    }
}
