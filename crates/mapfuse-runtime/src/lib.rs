//! `mapfuse-runtime` – the mapping engine.
//!
//! Wires the sensor edge (`mapfuse-hal`), the map-building core
//! (`mapfuse-perception`) and the pose plumbing (`mapfuse-middleware`) into a
//! running pipeline.
//!
//! # Modules
//!
//! - [`map_builder`] – [`MapBuilder`][map_builder::MapBuilder]: converts,
//!   locates, rotates, places and merges one frame at a time, reporting each
//!   result as a [`FrameOutcome`][map_builder::FrameOutcome].
//! - [`driver`] – [`run_session`][driver::run_session]: pulls frames from an
//!   [`ImageSource`][mapfuse_hal::ImageSource] until the stream ends or
//!   shutdown is requested.
//! - [`telemetry`] – [`init_tracing`][telemetry::init_tracing]: installs the
//!   global `tracing` subscriber with an optional OTLP span exporter.  Set
//!   `OTEL_EXPORTER_OTLP_ENDPOINT` to export spans to Jaeger, Grafana Tempo,
//!   or any OTLP-compatible collector.

pub mod driver;
pub mod map_builder;
pub mod telemetry;

pub use driver::{SessionSummary, StopReason, run_session};
pub use map_builder::{FrameOutcome, MapBuilder, MapBuilderConfig, PipelineStats};
pub use telemetry::{TracerProviderGuard, init_tracing};
