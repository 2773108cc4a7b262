//! Backend over the AprilTag C library.
//!
//! Native objects are wrapped in guards that free them on drop. A session
//! owns the detector and the family descriptor; fields are declared so the
//! detector is destroyed before the family it references. Per-call objects
//! (image header, detection list) live inside [`BackendSession::detect`].

use std::os::raw::c_int;
use std::ptr::NonNull;

use apriltag_sys as sys;
use log::{debug, warn};
use nalgebra::Point2;
use tagscan_core::{
    BackendSession, Detections, DetectorConfig, RasterView, TagBackend, TagDetection, TagFamily,
    TagScanError,
};

#[cfg(feature = "tracing")]
use tracing::instrument;

/// Smallest side, in pixels, the library's quad search accepts after
/// decimation. Narrower images make it read outside the buffer.
const MIN_SEARCH_SIDE: usize = 3;

fn backend_failure(reason: impl Into<String>) -> TagScanError {
    TagScanError::DetectionBackendFailure {
        reason: reason.into(),
    }
}

fn to_c_int(value: usize, what: &str) -> Result<c_int, TagScanError> {
    c_int::try_from(value)
        .map_err(|_| backend_failure(format!("{what} {value} exceeds C int range")))
}

/// Side length of the image the quad search runs on, following the
/// library's decimation rule (`1.5` is a special 3-to-2 reduction).
fn decimated_side(side: usize, quad_decimate: f32) -> usize {
    if quad_decimate <= 1.0 {
        side
    } else if quad_decimate == 1.5 {
        side / 3 * 2
    } else {
        1 + side.saturating_sub(1) / quad_decimate as usize
    }
}

struct FamilyHandle {
    ptr: NonNull<sys::apriltag_family_t>,
    family: TagFamily,
}

impl FamilyHandle {
    fn create(family: TagFamily) -> Result<Self, TagScanError> {
        // SAFETY: the constructor takes no arguments; a null return is handled below.
        let raw = match family {
            TagFamily::Tag36h11 => unsafe { sys::tag36h11_create() },
        };
        let ptr = NonNull::new(raw).ok_or(TagScanError::AllocationFailure {
            what: "tag family descriptor",
        })?;
        Ok(Self { ptr, family })
    }

    fn set_black_border(&mut self, black_border: bool) {
        // SAFETY: `ptr` came from the family constructor and is not shared yet.
        unsafe {
            (*self.ptr.as_ptr()).reversed_border = (!black_border).into();
        }
    }
}

impl Drop for FamilyHandle {
    fn drop(&mut self) {
        // SAFETY: `ptr` is owned by this guard and released exactly once,
        // after any detector referencing it.
        match self.family {
            TagFamily::Tag36h11 => unsafe { sys::tag36h11_destroy(self.ptr.as_ptr()) },
        }
    }
}

struct DetectorHandle(NonNull<sys::apriltag_detector_t>);

impl DetectorHandle {
    fn create() -> Result<Self, TagScanError> {
        // SAFETY: the constructor takes no arguments; a null return is handled below.
        let raw = unsafe { sys::apriltag_detector_create() };
        NonNull::new(raw)
            .map(Self)
            .ok_or(TagScanError::AllocationFailure { what: "detector" })
    }
}

impl Drop for DetectorHandle {
    fn drop(&mut self) {
        // SAFETY: the detector is owned by this guard and released exactly once.
        unsafe { sys::apriltag_detector_destroy(self.0.as_ptr()) }
    }
}

/// Detection list returned by the detector; a `zarray` of record pointers.
struct DetectionList(NonNull<sys::zarray_t>);

impl DetectionList {
    fn len(&self) -> usize {
        // SAFETY: the list is live until this guard drops.
        let size = unsafe { (*self.0.as_ptr()).size };
        usize::try_from(size).unwrap_or(0)
    }

    fn get(&self, index: usize) -> Option<&sys::apriltag_detection_t> {
        if index >= self.len() {
            return None;
        }
        // SAFETY: the array stores `len` pointers to detections that live
        // until the list is destroyed.
        unsafe {
            let data = (*self.0.as_ptr()).data as *const *const sys::apriltag_detection_t;
            (*data.add(index)).as_ref()
        }
    }

    fn to_detections(&self) -> Result<Detections, TagScanError> {
        (0..self.len())
            .map(|i| {
                let det = self
                    .get(i)
                    .ok_or_else(|| backend_failure(format!("null detection at index {i}")))?;
                convert_detection(det)
            })
            .collect::<Result<Vec<_>, _>>()
            .map(Detections::new)
    }
}

impl Drop for DetectionList {
    fn drop(&mut self) {
        // SAFETY: the list and the records it points to are released together, once.
        unsafe { sys::apriltag_detections_destroy(self.0.as_ptr()) }
    }
}

fn convert_detection(det: &sys::apriltag_detection_t) -> Result<TagDetection, TagScanError> {
    let id = u32::try_from(det.id)
        .map_err(|_| backend_failure(format!("negative tag id {}", det.id)))?;
    Ok(TagDetection {
        id,
        hamming: u8::try_from(det.hamming).unwrap_or(u8::MAX),
        decision_margin: det.decision_margin,
        center: Point2::new(det.c[0], det.c[1]),
        corners: det.p.map(|[x, y]| Point2::new(x, y)),
    })
}

/// Backend over the AprilTag C library.
#[derive(Clone, Copy, Debug, Default)]
pub struct AprilTagBackend;

impl TagBackend for AprilTagBackend {
    type Session = AprilTagSession;

    fn name(&self) -> &'static str {
        "apriltag"
    }

    fn configure(&self, config: &DetectorConfig) -> Result<AprilTagSession, TagScanError> {
        config.validate()?;
        if config.refine_decode || config.refine_pose {
            warn!("refine_decode/refine_pose are not available in this AprilTag build; ignoring");
        }

        let mut family = FamilyHandle::create(config.family)?;
        family.set_black_border(config.black_border);

        let detector = DetectorHandle::create()?;
        let nthreads = to_c_int(config.nthreads, "nthreads")?;
        // SAFETY: both pointers are live; the detector keeps a reference to
        // the family, which the session drops after the detector.
        unsafe {
            let td = detector.0.as_ptr();
            sys::apriltag_detector_add_family_bits(
                td,
                family.ptr.as_ptr(),
                c_int::from(config.max_hamming),
            );
            (*td).nthreads = nthreads;
            (*td).quad_decimate = config.quad_decimate;
            (*td).quad_sigma = config.quad_sigma;
            (*td).refine_edges = config.refine_edges.into();
            (*td).decode_sharpening = config.decode_sharpening;
            (*td).debug = config.debug.into();
        }
        debug!(
            "configured {} detector: decimate={} sigma={} threads={}",
            config.family.name(),
            config.quad_decimate,
            config.quad_sigma,
            config.nthreads
        );

        Ok(AprilTagSession {
            detector,
            _family: family,
            tag_side: config.family.width_at_border(),
            quad_decimate: config.quad_decimate,
            blurs_in_place: config.quad_sigma != 0.0 && config.quad_decimate <= 1.0,
        })
    }
}

/// Configured native detector. Field order is the release order.
pub struct AprilTagSession {
    detector: DetectorHandle,
    _family: FamilyHandle,
    tag_side: usize,
    quad_decimate: f32,
    /// The library filters the input image in place when it does not
    /// decimate first; such calls run on a private copy.
    blurs_in_place: bool,
}

impl AprilTagSession {
    /// Whether no tag can appear in `raster`: it is narrower than one tag,
    /// or decimation leaves too little for the quad search.
    fn cannot_hold_tag(&self, raster: &RasterView<'_>) -> bool {
        let short = raster.width().min(raster.height());
        short < self.tag_side || decimated_side(short, self.quad_decimate) < MIN_SEARCH_SIDE
    }
}

impl BackendSession for AprilTagSession {
    #[cfg_attr(
        feature = "tracing",
        instrument(
            level = "debug",
            skip(self, raster),
            fields(width = raster.width(), height = raster.height())
        )
    )]
    fn detect(&mut self, raster: &RasterView<'_>) -> Result<Detections, TagScanError> {
        if self.cannot_hold_tag(raster) {
            debug!(
                "{}x{} raster (decimate {}) cannot hold a tag; skipping detection",
                raster.width(),
                raster.height(),
                self.quad_decimate
            );
            return Ok(Detections::default());
        }

        let mut scratch: Vec<u8> = Vec::new();
        let buf: *mut u8 = if self.blurs_in_place {
            scratch
                .try_reserve_exact(raster.as_bytes().len())
                .map_err(|_| TagScanError::AllocationFailure {
                    what: "raster copy",
                })?;
            scratch.extend_from_slice(raster.as_bytes());
            scratch.as_mut_ptr()
        } else {
            // Read-only for this configuration.
            raster.as_bytes().as_ptr().cast_mut()
        };

        let mut header = sys::image_u8_t {
            width: to_c_int(raster.width(), "width")?,
            height: to_c_int(raster.height(), "height")?,
            stride: to_c_int(raster.stride(), "stride")?,
            buf,
        };

        // SAFETY: the detector is live, and `header` describes a buffer of at
        // least `stride * (height - 1) + width` bytes that outlives the call.
        let raw = unsafe { sys::apriltag_detector_detect(self.detector.0.as_ptr(), &mut header) };
        let list = NonNull::new(raw)
            .map(DetectionList)
            .ok_or_else(|| backend_failure("detector returned no detection list"))?;
        list.to_detections()
    }
}

/// Canonical bitmap of one tag, one byte per pixel, row-major.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct TagBitmap {
    pub width: usize,
    pub height: usize,
    pub data: Vec<u8>,
}

struct ImageU8Handle(NonNull<sys::image_u8_t>);

impl Drop for ImageU8Handle {
    fn drop(&mut self) {
        // SAFETY: the image is owned by this guard and released exactly once.
        unsafe { sys::image_u8_destroy(self.0.as_ptr()) }
    }
}

fn rendered_side(cells: usize, scale: usize, margin: usize) -> Option<usize> {
    cells
        .checked_mul(scale)?
        .checked_add(margin.checked_mul(2)?)
}

/// Render tag `id` of `family`, each bit `scale` pixels wide, surrounded by
/// `margin` pixels of white.
///
/// The canonical image already contains the family's quiet zone.
pub fn render_tag(
    family: TagFamily,
    id: u32,
    scale: usize,
    margin: usize,
) -> Result<TagBitmap, TagScanError> {
    if id >= family.code_count() {
        return Err(TagScanError::InvalidConfig {
            reason: format!(
                "{} has {} codes, id {id} is out of range",
                family.name(),
                family.code_count()
            ),
        });
    }
    if scale == 0 {
        return Err(TagScanError::InvalidConfig {
            reason: "scale must be >= 1".to_string(),
        });
    }

    let fam = FamilyHandle::create(family)?;
    let idx = id
        .try_into()
        .map_err(|_| backend_failure(format!("tag id {id} exceeds C range")))?;
    // SAFETY: the family is live and `idx` is below its code count.
    let raw = unsafe { sys::apriltag_to_image(fam.ptr.as_ptr(), idx) };
    let canonical = NonNull::new(raw)
        .map(ImageU8Handle)
        .ok_or(TagScanError::AllocationFailure { what: "tag image" })?;

    // SAFETY: the image is live until `canonical` drops.
    let (cw, ch, cstride, cbuf) = unsafe {
        let im = &*canonical.0.as_ptr();
        (im.width as usize, im.height as usize, im.stride as usize, im.buf)
    };
    // SAFETY: the library allocates `stride * height` bytes for the image.
    let src = unsafe { std::slice::from_raw_parts(cbuf, cstride * ch) };

    let too_large = || TagScanError::InvalidConfig {
        reason: format!("tag image at scale {scale} with margin {margin} is too large"),
    };
    let width = rendered_side(cw, scale, margin).ok_or_else(too_large)?;
    let height = rendered_side(ch, scale, margin).ok_or_else(too_large)?;
    let len = width.checked_mul(height).ok_or_else(too_large)?;

    let mut data = Vec::new();
    data.try_reserve_exact(len)
        .map_err(|_| TagScanError::AllocationFailure { what: "tag bitmap" })?;
    data.resize(len, 255u8);

    let tag_width = cw * scale;
    for y in 0..ch * scale {
        let src_row = &src[(y / scale) * cstride..(y / scale) * cstride + cw];
        let start = (y + margin) * width + margin;
        for (x, px) in data[start..start + tag_width].iter_mut().enumerate() {
            *px = src_row[x / scale];
        }
    }
    Ok(TagBitmap {
        width,
        height,
        data,
    })
}
