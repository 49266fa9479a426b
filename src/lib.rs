//! # UAV Log Analyst Library
//!
//! Extract flight-health signals and summary metrics from UAV telemetry logs.
//!
//! This library provides the telemetry pipeline (flatten, filter, derive)
//! together with the session store and report log that surround it when
//! serving a conversational flight-log assistant.

pub mod config;
pub mod error;
pub mod logging;
pub mod report;
pub mod service;
pub mod session;
pub mod telemetry;
