//! Contract toward the external tag detector.
//!
//! A backend turns a [`DetectorConfig`] into a [`BackendSession`] that owns
//! all native state (family tables, detector working memory). Sessions
//! release that state in `Drop`, so every exit path of a call tears it down.

use crate::config::DetectorConfig;
use crate::detection::Detections;
use crate::error::TagScanError;
use crate::raster::RasterView;

/// Factory for configured detector sessions.
pub trait TagBackend {
    type Session: BackendSession;

    /// Short name used in logs.
    fn name(&self) -> &'static str;

    /// Build a detector for `config`.
    ///
    /// The family descriptor is created and its border policy set before it
    /// is registered; tuning fields are applied after registration.
    fn configure(&self, config: &DetectorConfig) -> Result<Self::Session, TagScanError>;
}

/// A configured detector. Dropping it releases the detector, then the family.
pub trait BackendSession {
    /// Run detection synchronously over `raster`.
    ///
    /// Any native image header built for the call is released before this
    /// returns, whether or not detection succeeded.
    fn detect(&mut self, raster: &RasterView<'_>) -> Result<Detections, TagScanError>;
}
