// THEORY:
// This file is the entry point for the `veer_drishti` library crate. It exports the
// three producers and views of the engine:
//
// - `pipeline::DetectionPipeline` samples a frame source, classifies each frame
//   against a watchlist, and publishes the latest detection set.
// - `simulator::EntitySimulator` evolves a fixed roster of monitored people and
//   accepts an emergency override.
// - `alerts::AlertAggregator` fuses both into a deduplicated, newest-first,
//   time-windowed alert view on demand.
//
// The building blocks (frames, sources, detectors, region extraction) live under
// `core_modules`. They are public so hosts can plug in their own frame source or
// classifier backend.

pub mod alerts;
pub mod core_modules;
pub mod error;
pub mod pipeline;
pub mod simulator;

pub use alerts::{Alert, AlertAggregator, AlertConfig, AlertKind, AlertMetadata, Severity};
pub use core_modules::detection::{BoundingBox, Detection, Watchlist};
pub use core_modules::detector::{ClassifierBackend, ClassifierLoader, Detector, MotionConfig, Prediction};
pub use core_modules::frame::Frame;
pub use core_modules::frame_source::{FrameSource, ImageSequenceSource, MemorySource};
pub use pipeline::{DetectionPipeline, PipelineConfig};
pub use simulator::{EntitySeed, EntitySimulator, EntitySnapshot, EntityStatus, Position, SimulatorConfig};
