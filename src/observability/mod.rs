//! Observability for streamed turns.
//!
//! Events are emitted through `tracing`; counters are kept in
//! [`StreamMetrics`], one instance per session unless shared explicitly.

mod logging;
mod metrics;

pub use logging::{LogFormat, LogLevel, LoggingConfig};
pub use metrics::{MetricsSnapshot, StreamMetrics};
