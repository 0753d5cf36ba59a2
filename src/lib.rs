pub mod connections;
pub mod core;
pub mod http;
#[cfg(all(feature = "mysql", feature = "postgres", feature = "ssh", feature = "redis"))]
pub mod ui;
pub mod utils;

// re-export ergonomic entry points
pub use crate::connections::errors::ConnectionError;
pub use crate::core::params::{ParamValue, Params};
pub use crate::core::registry::{Managed, Registry, Shared};
pub use crate::http::{HttpClient, HttpConfig, HttpError};
