use std::fmt::{self, Display};

/// A central error enum for connection-related errors.
#[derive(Debug)]
pub enum ConnectionError {
    IoError(std::io::Error),
    Sql(String),
    Ssh(String),
    Redis(String),
    /// The caller supplied parameters the backend cannot work with.
    Usage(String),
    /// A parameter value that cannot take part in a registry key.
    UnhashableParam(String),
    NotConnected,
    Other(String),
}

/// Convert from std::io::Error.
impl From<std::io::Error> for ConnectionError {
    fn from(err: std::io::Error) -> ConnectionError {
        ConnectionError::IoError(err)
    }
}

/// Convert from ssh2::Error.
/// Without this, `?` won't work on the handshake and auth calls.
#[cfg(feature = "ssh")]
impl From<::ssh2::Error> for ConnectionError {
    fn from(err: ::ssh2::Error) -> Self {
        ConnectionError::Ssh(err.to_string())
    }
}

#[cfg(feature = "mysql")]
impl From<::mysql::Error> for ConnectionError {
    fn from(err: ::mysql::Error) -> Self {
        ConnectionError::Sql(err.to_string())
    }
}

#[cfg(feature = "postgres")]
impl From<::postgres::Error> for ConnectionError {
    fn from(err: ::postgres::Error) -> Self {
        ConnectionError::Sql(err.to_string())
    }
}

#[cfg(feature = "redis")]
impl From<::redis::RedisError> for ConnectionError {
    fn from(err: ::redis::RedisError) -> Self {
        ConnectionError::Redis(err.to_string())
    }
}

impl Display for ConnectionError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConnectionError::IoError(e) => write!(f, "IO error: {}", e),
            ConnectionError::Sql(msg) => write!(f, "SQL error: {}", msg),
            ConnectionError::Ssh(msg) => write!(f, "SSH error: {}", msg),
            ConnectionError::Redis(msg) => write!(f, "Redis error: {}", msg),
            ConnectionError::Usage(msg) => write!(f, "Usage error: {}", msg),
            ConnectionError::UnhashableParam(key) => {
                write!(f, "Parameter '{}' is not a string, integer or boolean", key)
            }
            ConnectionError::NotConnected => write!(f, "Not connected"),
            ConnectionError::Other(msg) => write!(f, "Other error: {}", msg),
        }
    }
}

impl std::error::Error for ConnectionError {}
