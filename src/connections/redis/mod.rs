pub mod redis_connection;

pub use redis_connection::{redis_url, RedisClient, RedisConnection, RedisConnectionMgr};
