//! Caller-side raster description and the zero-copy view handed to backends.

use std::fmt;

use crate::error::TagScanError;
use crate::request::OutputRequest;

/// Element type of a host array.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum PixelType {
    U8,
    I8,
    U16,
    I16,
    U32,
    I32,
    U64,
    I64,
    F32,
    F64,
    Bool,
    /// Anything the host cannot describe as a numeric element type.
    Other,
}

impl PixelType {
    pub fn name(self) -> &'static str {
        match self {
            Self::U8 => "uint8",
            Self::I8 => "int8",
            Self::U16 => "uint16",
            Self::I16 => "int16",
            Self::U32 => "uint32",
            Self::I32 => "int32",
            Self::U64 => "uint64",
            Self::I64 => "int64",
            Self::F32 => "float32",
            Self::F64 => "float64",
            Self::Bool => "bool",
            Self::Other => "other",
        }
    }
}

impl fmt::Display for PixelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One argument as received from a host environment, before validation.
///
/// `shape` follows the host's row/column convention: a grayscale image is
/// `[height, width]`, a color image typically `[height, width, channels]`.
/// `data` is the raw row-major byte buffer.
#[derive(Clone, Debug)]
pub struct HostArray<'a> {
    pub shape: Vec<usize>,
    pub pixel_type: PixelType,
    pub data: &'a [u8],
}

impl<'a> HostArray<'a> {
    pub fn new(shape: Vec<usize>, pixel_type: PixelType, data: &'a [u8]) -> Self {
        Self {
            shape,
            pixel_type,
            data,
        }
    }

    /// Convenience constructor for a `height x width` 8-bit grayscale buffer.
    pub fn gray_u8(width: usize, height: usize, data: &'a [u8]) -> Self {
        Self::new(vec![height, width], PixelType::U8, data)
    }

    #[inline]
    pub fn ndim(&self) -> usize {
        self.shape.len()
    }
}

/// Borrowed 8-bit single-channel raster.
///
/// Rows are `stride` bytes apart; only the first `width` bytes of each row
/// are pixels. The view never copies or owns the pixel storage.
#[derive(Clone, Copy, Debug)]
pub struct RasterView<'a> {
    width: usize,
    height: usize,
    stride: usize,
    data: &'a [u8],
}

impl<'a> RasterView<'a> {
    pub fn new(
        width: usize,
        height: usize,
        stride: usize,
        data: &'a [u8],
    ) -> Result<Self, TagScanError> {
        if width == 0 || height == 0 {
            return Err(TagScanError::geometry(format!(
                "image must be non-empty (width={width}, height={height})"
            )));
        }
        if stride < width {
            return Err(TagScanError::geometry(format!(
                "stride {stride} is smaller than width {width}"
            )));
        }
        let required = stride
            .checked_mul(height - 1)
            .and_then(|n| n.checked_add(width))
            .ok_or_else(|| TagScanError::geometry("image dimensions overflow"))?;
        if data.len() < required {
            return Err(TagScanError::geometry(format!(
                "pixel buffer holds {} bytes, expected at least {required}",
                data.len()
            )));
        }
        Ok(Self {
            width,
            height,
            stride,
            data,
        })
    }

    /// Tightly packed view (`stride == width`).
    pub fn from_gray(width: usize, height: usize, data: &'a [u8]) -> Result<Self, TagScanError> {
        Self::new(width, height, width, data)
    }

    #[inline]
    pub fn width(&self) -> usize {
        self.width
    }

    #[inline]
    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Underlying bytes, including any stride padding.
    #[inline]
    pub fn as_bytes(&self) -> &'a [u8] {
        self.data
    }

    #[inline]
    pub fn row(&self, y: usize) -> &'a [u8] {
        let start = y * self.stride;
        &self.data[start..start + self.width]
    }

    #[inline]
    pub fn pixel(&self, x: usize, y: usize) -> u8 {
        self.data[y * self.stride + x]
    }
}

/// Validate a host-style call: exactly one 2-D `uint8` input and at most six
/// requested outputs.
///
/// Checks run in a fixed order and before anything is allocated, so the
/// first violated rule is the one reported.
pub fn validate_call<'a>(
    inputs: &[HostArray<'a>],
    requested_outputs: usize,
) -> Result<(RasterView<'a>, OutputRequest), TagScanError> {
    let [input] = inputs else {
        return Err(TagScanError::InvalidArgumentCount { got: inputs.len() });
    };
    if input.ndim() != 2 {
        return Err(TagScanError::UnsupportedDimensionality { ndim: input.ndim() });
    }
    if input.pixel_type != PixelType::U8 {
        return Err(TagScanError::UnsupportedPixelType {
            got: input.pixel_type,
        });
    }
    let request = OutputRequest::new(requested_outputs)?;

    let (height, width) = (input.shape[0], input.shape[1]);
    let view = RasterView::from_gray(width, height, input.data)?;
    Ok((view, request))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn view_respects_stride() {
        let data: Vec<u8> = (0..12).collect();
        let view = RasterView::new(3, 3, 4, &data[..11]).expect("view");
        assert_eq!(view.row(1), &[4, 5, 6]);
        assert_eq!(view.pixel(2, 2), 10);
    }

    #[test]
    fn view_rejects_bad_geometry() {
        let data = [0u8; 16];
        assert!(RasterView::new(0, 4, 4, &data).is_err());
        assert!(RasterView::new(4, 0, 4, &data).is_err());
        assert!(RasterView::new(4, 4, 3, &data).is_err());
        let err = RasterView::new(4, 5, 4, &data).unwrap_err();
        assert_eq!(err.identifier(), "tagscan:geometry");
    }

    #[test]
    fn rows_skip_stride_padding() {
        let mut data = vec![7u8; 8];
        data[3] = 0;
        let view = RasterView::new(3, 2, 4, &data).expect("view");
        assert_eq!(view.row(0), &[7, 7, 7]);
        assert_eq!(view.row(1), &[7, 7, 7]);
    }

    #[test]
    fn accepts_single_gray_input() {
        let data = vec![0u8; 6];
        let (view, request) =
            validate_call(&[HostArray::gray_u8(3, 2, &data)], 6).expect("valid call");
        assert_eq!((view.width(), view.height(), view.stride()), (3, 2, 3));
        assert_eq!(request.count(), 6);
    }

    #[test]
    fn rejects_wrong_argument_count() {
        let data = vec![0u8; 4];
        let err = validate_call(&[], 1).unwrap_err();
        assert_eq!(err, TagScanError::InvalidArgumentCount { got: 0 });

        let two = [HostArray::gray_u8(2, 2, &data), HostArray::gray_u8(2, 2, &data)];
        let err = validate_call(&two, 1).unwrap_err();
        assert_eq!(err, TagScanError::InvalidArgumentCount { got: 2 });
    }

    #[test]
    fn rejects_color_raster() {
        let data = vec![0u8; 12];
        let rgb = HostArray::new(vec![2, 2, 3], PixelType::U8, &data);
        let err = validate_call(&[rgb], 1).unwrap_err();
        assert_eq!(err, TagScanError::UnsupportedDimensionality { ndim: 3 });
    }

    #[test]
    fn rejects_non_u8_pixels() {
        let data = vec![0u8; 16];
        for pixel_type in [PixelType::I8, PixelType::F32, PixelType::F64] {
            let arr = HostArray::new(vec![2, 2], pixel_type, &data);
            let err = validate_call(&[arr], 1).unwrap_err();
            assert_eq!(err, TagScanError::UnsupportedPixelType { got: pixel_type });
        }
    }

    #[test]
    fn rejects_seven_outputs() {
        let data = vec![0u8; 4];
        let err = validate_call(&[HostArray::gray_u8(2, 2, &data)], 7).unwrap_err();
        assert_eq!(err, TagScanError::TooManyOutputsRequested { requested: 7 });
    }

    #[test]
    fn dimensionality_is_checked_before_pixel_type() {
        let data = vec![0u8; 8];
        let arr = HostArray::new(vec![8], PixelType::F32, &data);
        let err = validate_call(&[arr], 9).unwrap_err();
        assert_eq!(err, TagScanError::UnsupportedDimensionality { ndim: 1 });
    }

    #[test]
    fn short_buffer_is_a_geometry_error() {
        let data = vec![0u8; 5];
        let err = validate_call(&[HostArray::gray_u8(3, 2, &data)], 1).unwrap_err();
        assert_eq!(err.identifier(), "tagscan:geometry");
    }
}
