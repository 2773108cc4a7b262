//! Single-call AprilTag detection.
//!
//! This crate provides:
//! - re-exports of `tagscan-core` (raster validation, configuration,
//!   detection records, result projection),
//! - (feature `apriltag`) a backend over the AprilTag C library,
//! - (feature `image`) adapters from `image` buffers to rasters and host arrays,
//! - (feature `cli`) the `tagscan` command line tool.
//!
//! ## Quickstart
//!
//! ```no_run
//! # #[cfg(all(feature = "apriltag", feature = "image"))]
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! use tagscan::apriltag::AprilTagBackend;
//! use tagscan::{detect, DetectorConfig, OutputRequest, TagDetector};
//!
//! let img = image::open("tags.png")?.to_luma8();
//! let detector = TagDetector::new(AprilTagBackend, DetectorConfig::default())?;
//! let outputs = detector.detect_projected(&detect::raster_view(&img)?, OutputRequest::new(2)?)?;
//! println!("found {} tags", outputs.len());
//! # Ok(())
//! # }
//! # #[cfg(not(all(feature = "apriltag", feature = "image")))]
//! # fn main() {}
//! ```
//!
//! ## API map
//! - `tagscan::core`: the full core crate.
//! - `tagscan::apriltag` (feature `apriltag`): native backend and tag rendering.
//! - `tagscan::detect` (feature `image`): `image` crate adapters.

pub use tagscan_core as core;

pub use tagscan_core::{
    project, validate_call, BackendSession, CornerRole, Detections, DetectorConfig, HostArray,
    OutputMatrix, OutputRequest, PixelType, ProjectedOutputs, RasterView, TagBackend,
    TagDetection, TagDetector, TagFamily, TagScanError,
};

#[cfg(feature = "apriltag")]
pub mod apriltag;

#[cfg(feature = "image")]
pub mod detect;
