#![allow(dead_code)]

pub mod capture_logger;
pub mod fake_driver;
pub mod fake_transport;
