pub mod cards;
pub mod config;
pub mod error;
pub mod telemetry;
