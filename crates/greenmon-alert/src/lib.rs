//! Threshold evaluation and alert deduplication for greenhouse sensors.
//!
//! A [`rules::RuleSet`] turns a [`SensorReading`] into candidate detections
//! using a per-greenhouse [`config::ThresholdConfig`]. The
//! [`engine::AlertEngine`] then suppresses candidates whose
//! (greenhouse, condition, device) key already has an unresolved alert inside
//! the cooldown window, and persists the rest. [`service::AlertService`]
//! ties the two together behind a single `on_reading` entry point.
//!
//! [`SensorReading`]: greenmon_common::types::SensorReading

pub mod config;
pub mod engine;
pub mod error;
mod keylock;
pub mod rules;
pub mod service;
