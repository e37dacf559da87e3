//! Shared domain types for greenhouse telemetry and alerting.

pub mod id;
pub mod types;
