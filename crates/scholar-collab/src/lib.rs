pub mod collaboration;
pub mod config;
pub mod error;
pub mod telemetry;
