use nalgebra::Point2;
use serde::{Deserialize, Serialize};

/// Semantic role of a corner slot in [`TagDetection::corners`].
///
/// Roles refer to the family's canonical (upright) orientation, not to the
/// image axes: a tag rotated by 90° still reports its own upper-left first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CornerRole {
    UpperLeft,
    LowerLeft,
    LowerRight,
    UpperRight,
}

impl CornerRole {
    pub const ALL: [CornerRole; 4] = [
        CornerRole::UpperLeft,
        CornerRole::LowerLeft,
        CornerRole::LowerRight,
        CornerRole::UpperRight,
    ];

    #[inline]
    pub fn index(self) -> usize {
        match self {
            Self::UpperLeft => 0,
            Self::LowerLeft => 1,
            Self::LowerRight => 2,
            Self::UpperRight => 3,
        }
    }
}

/// One decoded tag.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TagDetection {
    pub id: u32,
    /// Number of bit errors corrected while decoding.
    pub hamming: u8,
    /// Mean difference between the bit threshold and the sampled intensities.
    pub decision_margin: f32,
    /// Tag center in pixel coordinates.
    pub center: Point2<f64>,
    /// Corners ordered as [`CornerRole::ALL`].
    pub corners: [Point2<f64>; 4],
}

impl TagDetection {
    #[inline]
    pub fn corner(&self, role: CornerRole) -> Point2<f64> {
        self.corners[role.index()]
    }

    /// Signed area of the corner polygon (shoelace formula).
    pub fn signed_area(&self) -> f64 {
        let mut acc = 0.0;
        for i in 0..4 {
            let a = self.corners[i];
            let b = self.corners[(i + 1) % 4];
            acc += a.x * b.y - b.x * a.y;
        }
        0.5 * acc
    }
}

/// Detections in backend discovery order.
///
/// The order is neither sorted by id nor by position; callers that need a
/// stable ordering sort themselves.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Detections(Vec<TagDetection>);

impl Detections {
    pub fn new(records: Vec<TagDetection>) -> Self {
        Self(records)
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    #[inline]
    pub fn as_slice(&self) -> &[TagDetection] {
        &self.0
    }

    pub fn iter(&self) -> std::slice::Iter<'_, TagDetection> {
        self.0.iter()
    }

    /// Ids in detection order.
    pub fn ids(&self) -> Vec<u32> {
        self.0.iter().map(|d| d.id).collect()
    }

    pub fn into_vec(self) -> Vec<TagDetection> {
        self.0
    }
}

impl FromIterator<TagDetection> for Detections {
    fn from_iter<I: IntoIterator<Item = TagDetection>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Detections {
    type Item = &'a TagDetection;
    type IntoIter = std::slice::Iter<'a, TagDetection>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
