//! Core types for single-call AprilTag detection.
//!
//! This crate owns everything around the detector but not the detector
//! itself: validating a caller-supplied raster, describing the detector
//! configuration, and projecting detection records into a caller-selected
//! subset of output matrices. The quad search and bit decoding live behind
//! the [`TagBackend`] / [`BackendSession`] traits and are provided by
//! another crate (see `tagscan` with the `apriltag` feature).

mod backend;
mod config;
mod detection;
mod error;
mod logger;
mod pipeline;
mod project;
mod raster;
mod request;

pub use backend::{BackendSession, TagBackend};
pub use config::{DetectorConfig, TagFamily};
pub use detection::{CornerRole, Detections, TagDetection};
pub use error::TagScanError;
pub use pipeline::TagDetector;
pub use project::{project, OutputMatrix, ProjectedOutputs};
pub use raster::{validate_call, HostArray, PixelType, RasterView};
pub use request::OutputRequest;

#[cfg(feature = "tracing")]
pub use logger::init_tracing;

pub use logger::{init_with_level, level_from_env};
