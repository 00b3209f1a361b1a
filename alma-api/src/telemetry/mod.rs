//! ALMA Telemetry - structured logging for the API process.

pub mod tracer;

pub use tracer::{init_tracer, TelemetryConfig};
