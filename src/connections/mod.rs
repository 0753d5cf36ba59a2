pub mod connection;
pub mod errors;
#[cfg(feature = "redis")]
pub mod redis;
pub mod sql;
#[cfg(feature = "ssh")]
pub mod ssh;

// Re-export the modules here for easy import elsewhere.
pub use connection::*;
pub use errors::*;
