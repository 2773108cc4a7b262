use log::debug;

use crate::backend::{BackendSession, TagBackend};
use crate::config::DetectorConfig;
use crate::detection::Detections;
use crate::error::TagScanError;
use crate::project::{project, ProjectedOutputs};
use crate::raster::{validate_call, HostArray, RasterView};
use crate::request::OutputRequest;

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Single-call tag detector.
///
/// Holds only the backend handle and the configuration. Every call builds
/// a fresh backend session and tears it down before returning; no detector
/// state survives between calls.
pub struct TagDetector<B> {
    backend: B,
    config: DetectorConfig,
}

impl<B: TagBackend> TagDetector<B> {
    pub fn new(backend: B, config: DetectorConfig) -> Result<Self, TagScanError> {
        config.validate()?;
        Ok(Self { backend, config })
    }

    /// Detector with [`DetectorConfig::default`].
    pub fn with_defaults(backend: B) -> Self {
        Self {
            backend,
            config: DetectorConfig::default(),
        }
    }

    #[inline]
    pub fn config(&self) -> &DetectorConfig {
        &self.config
    }

    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Detect tags and return the raw records in backend order.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, raster),
            fields(width = raster.width(), height = raster.height())
        )
    )]
    pub fn detect(&self, raster: &RasterView<'_>) -> Result<Detections, TagScanError> {
        let mut session = self.backend.configure(&self.config)?;
        let detections = session.detect(raster)?;
        debug!(
            "{}: {} tag(s) in {}x{} raster",
            self.backend.name(),
            detections.len(),
            raster.width(),
            raster.height()
        );
        Ok(detections)
    }

    /// Detect tags and project them into the containers selected by `request`.
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "info",
            skip(self, raster),
            fields(width = raster.width(), height = raster.height())
        )
    )]
    pub fn detect_projected(
        &self,
        raster: &RasterView<'_>,
        request: OutputRequest,
    ) -> Result<ProjectedOutputs, TagScanError> {
        let mut session = self.backend.configure(&self.config)?;
        let detections = session.detect(raster)?;
        debug!(
            "{}: {} tag(s), projecting {} output(s)",
            self.backend.name(),
            detections.len(),
            request.container_count()
        );
        let outputs = project(detections, request)?;
        drop(session);
        Ok(outputs)
    }

    /// Host-style entry point: validate positional inputs, then detect and project.
    ///
    /// Validation failures are reported before the backend is touched.
    pub fn call(
        &self,
        inputs: &[HostArray<'_>],
        requested_outputs: usize,
    ) -> Result<ProjectedOutputs, TagScanError> {
        let (raster, request) = validate_call(inputs, requested_outputs)?;
        self.detect_projected(&raster, request)
    }
}
