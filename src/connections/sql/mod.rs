pub mod client;
pub mod manager;
#[cfg(feature = "mysql")]
pub mod mysql_driver;
#[cfg(feature = "postgres")]
pub mod postgres_driver;
pub mod proxy;
pub mod value;

pub use client::SqlClient;
pub use manager::SqlConnectionManager;
#[cfg(feature = "mysql")]
pub use mysql_driver::MySqlDriver;
#[cfg(feature = "postgres")]
pub use postgres_driver::PostgresDriver;
pub use proxy::{ConnectionProxy, CursorProxy};
pub use value::{Row, SqlValue};

/// The MySQL manager most suites want.
#[cfg(feature = "mysql")]
pub type MySqlConnectionMgr = SqlConnectionManager<MySqlDriver>;

#[cfg(feature = "postgres")]
pub type PostgresConnectionMgr = SqlConnectionManager<PostgresDriver>;
