pub mod cache;
pub mod config;
pub mod error;
pub mod links;
pub mod telemetry;
pub mod workflows;
