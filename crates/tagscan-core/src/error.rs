use crate::raster::PixelType;

/// Errors that abort a detection call.
///
/// Every variant carries a stable [`identifier`](TagScanError::identifier)
/// so host bindings can map it to their own error classes.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum TagScanError {
    #[error("one input required (image matrix HxW), got {got}")]
    InvalidArgumentCount { got: usize },

    #[error(
        "2D image required, got {ndim} dimension(s) (did you forget to convert to grayscale?)"
    )]
    UnsupportedDimensionality { ndim: usize },

    #[error("uint8 image required, got {got}")]
    UnsupportedPixelType { got: PixelType },

    #[error(
        "too many outputs requested ({requested}); available outputs are: id, center, corner_1..corner_4"
    )]
    TooManyOutputsRequested { requested: usize },

    #[error("invalid raster geometry: {reason}")]
    InvalidRasterGeometry { reason: String },

    #[error("invalid detector configuration: {reason}")]
    InvalidConfig { reason: String },

    #[error("failed to allocate {what}")]
    AllocationFailure { what: &'static str },

    #[error("detection backend failed: {reason}")]
    DetectionBackendFailure { reason: String },
}

impl TagScanError {
    /// Stable `component:kind` identifier for this error.
    pub fn identifier(&self) -> &'static str {
        match self {
            Self::InvalidArgumentCount { .. } => "tagscan:input",
            Self::UnsupportedDimensionality { .. } => "tagscan:inputsize",
            Self::UnsupportedPixelType { .. } => "tagscan:inputtype",
            Self::TooManyOutputsRequested { .. } => "tagscan:output",
            Self::InvalidRasterGeometry { .. } => "tagscan:geometry",
            Self::InvalidConfig { .. } => "tagscan:config",
            Self::AllocationFailure { .. } => "tagscan:alloc",
            Self::DetectionBackendFailure { .. } => "tagscan:backend",
        }
    }

    pub(crate) fn geometry(reason: impl Into<String>) -> Self {
        Self::InvalidRasterGeometry {
            reason: reason.into(),
        }
    }

    pub(crate) fn config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}
