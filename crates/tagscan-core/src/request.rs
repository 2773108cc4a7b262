use crate::error::TagScanError;

/// How many positional outputs the caller asked for.
///
/// Outputs are, in order: `id`, `center`, `corner_1` .. `corner_4`. The id
/// output is always produced, so a count of `0` behaves like `1`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Default)]
pub struct OutputRequest(u8);

impl OutputRequest {
    /// Largest accepted count: id, center and four corners.
    pub const MAX: usize = 6;

    pub fn new(count: usize) -> Result<Self, TagScanError> {
        if count > Self::MAX {
            return Err(TagScanError::TooManyOutputsRequested { requested: count });
        }
        Ok(Self(count as u8))
    }

    /// Every output.
    pub fn all() -> Self {
        Self(Self::MAX as u8)
    }

    #[inline]
    pub fn count(self) -> usize {
        usize::from(self.0)
    }

    #[inline]
    pub fn wants_center(self) -> bool {
        self.0 >= 2
    }

    /// Whether `corner_j` is requested, `j` in `1..=4`.
    #[inline]
    pub fn wants_corner(self, j: usize) -> bool {
        (1..=4).contains(&j) && self.count() >= 2 + j
    }

    /// Number of containers the projector allocates.
    #[inline]
    pub fn container_count(self) -> usize {
        self.count().max(1)
    }
}
