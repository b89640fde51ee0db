//! Background telemetry sampling engine.
//!
//! A [`sampler::Scheduler`] reads every enabled [`sources`] entry once per
//! interval, appends each metric to its fixed-size [`history`] window and
//! publishes one immutable [`models::StatsSnapshot`] per cycle through a
//! lock-free [`publisher::SnapshotPublisher`]. [`tips`] turns a snapshot into
//! connection advice; [`metrics`] exposes it to Prometheus.

pub mod config;
pub mod constants;
pub mod error;
pub mod history;
pub mod metrics;
pub mod models;
pub mod probe;
pub mod publisher;
pub mod sampler;
pub mod sources;
pub mod tips;
pub mod utils;
