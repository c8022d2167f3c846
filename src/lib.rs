// THEORY:
// This file is the main entry point for the `retina_vision` library crate.
// It follows the standard Rust convention of using `lib.rs` to define the public
// API that will be exposed to external consumers.
//
// The primary goal is to export the `TrackingPipeline` and its associated data
// structures (`PipelineConfig`, `TrackerConfig`, `Blob`, etc.) as the clean,
// high-level interface for the engine, while the internal building blocks live
// in `core_modules` for consumers that want to compose their own chains.

pub mod core_modules;
pub mod pipeline;

pub use crate::core_modules::blob::Blob;
pub use crate::core_modules::event::{ActivityEvent, Event};
pub use crate::core_modules::tracker::{BlobSink, BlobTracker, TrackedEntry, TrackedState};
pub use crate::pipeline::{ConfigError, PipelineConfig, TrackerConfig, TrackingPipeline};
