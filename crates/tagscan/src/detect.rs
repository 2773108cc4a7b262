//! Adapters from `image` buffers.
//!
//! Only 8-bit single-channel images become rasters; anything else is
//! described faithfully as a [`HostArray`] so the validator reports why it
//! was rejected instead of silently converting it.

use ::image::{ColorType, DynamicImage, GrayImage};
use tagscan_core::{HostArray, PixelType, RasterView, TagScanError};

#[cfg(feature = "apriltag")]
use tagscan_core::{Detections, DetectorConfig, ProjectedOutputs, TagDetector};

/// Borrow an `image::GrayImage` as a raster.
pub fn raster_view(img: &GrayImage) -> Result<RasterView<'_>, TagScanError> {
    RasterView::from_gray(img.width() as usize, img.height() as usize, img.as_raw())
}

fn pixel_type(color: ColorType) -> PixelType {
    match color {
        ColorType::Rgb32F | ColorType::Rgba32F => PixelType::F32,
        ColorType::L16 | ColorType::La16 | ColorType::Rgb16 | ColorType::Rgba16 => PixelType::U16,
        _ => PixelType::U8,
    }
}

/// Describe a decoded image the way a host environment would pass it:
/// `[height, width]` for single-channel images, `[height, width, channels]`
/// otherwise.
pub fn host_array(img: &DynamicImage) -> HostArray<'_> {
    let color = img.color();
    let (width, height) = (img.width() as usize, img.height() as usize);
    let channels = usize::from(color.channel_count());
    let shape = if channels == 1 {
        vec![height, width]
    } else {
        vec![height, width, channels]
    };
    HostArray::new(shape, pixel_type(color), img.as_bytes())
}

/// Detect tags in a grayscale image with the native backend.
#[cfg(feature = "apriltag")]
pub fn detect_gray(img: &GrayImage, config: DetectorConfig) -> Result<Detections, TagScanError> {
    let detector = TagDetector::new(crate::apriltag::AprilTagBackend, config)?;
    detector.detect(&raster_view(img)?)
}

/// Validate a decoded image like a host call and project its detections.
#[cfg(feature = "apriltag")]
pub fn detect_image_outputs(
    img: &DynamicImage,
    requested_outputs: usize,
    config: DetectorConfig,
) -> Result<ProjectedOutputs, TagScanError> {
    let detector = TagDetector::new(crate::apriltag::AprilTagBackend, config)?;
    detector.call(&[host_array(img)], requested_outputs)
}
