//! Projection of detection records into positional output matrices.

use serde::Serialize;

use crate::detection::Detections;
use crate::error::TagScanError;
use crate::request::OutputRequest;

/// Positional output names, in the order callers request them.
pub const OUTPUT_NAMES: [&str; OutputRequest::MAX] =
    ["id", "center", "corner_1", "corner_2", "corner_3", "corner_4"];

/// Dense column-major `f64` matrix, one column per detection.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct OutputMatrix {
    rows: usize,
    cols: usize,
    data: Vec<f64>,
}

impl OutputMatrix {
    fn zeros(rows: usize, cols: usize, what: &'static str) -> Result<Self, TagScanError> {
        let len = rows
            .checked_mul(cols)
            .ok_or(TagScanError::AllocationFailure { what })?;
        let mut data = Vec::new();
        data.try_reserve_exact(len)
            .map_err(|_| TagScanError::AllocationFailure { what })?;
        data.resize(len, 0.0);
        Ok(Self { rows, cols, data })
    }

    #[inline]
    pub fn rows(&self) -> usize {
        self.rows
    }

    #[inline]
    pub fn cols(&self) -> usize {
        self.cols
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.data[col * self.rows + row]
    }

    /// One detection's entries.
    #[inline]
    pub fn column(&self, col: usize) -> &[f64] {
        &self.data[col * self.rows..(col + 1) * self.rows]
    }

    /// Column-major storage.
    #[inline]
    pub fn as_slice(&self) -> &[f64] {
        &self.data
    }

    pub fn into_vec(self) -> Vec<f64> {
        self.data
    }

    #[inline]
    fn set_column(&mut self, col: usize, values: &[f64]) {
        let rows = self.rows;
        self.data[col * rows..(col + 1) * rows].copy_from_slice(values);
    }
}

/// Output containers for one call. Fields that were not requested are `None`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct ProjectedOutputs {
    /// `1 x N` tag ids.
    pub id: OutputMatrix,
    /// `2 x N` centers, when requested.
    pub center: Option<OutputMatrix>,
    /// `2 x N` corners per role, when requested.
    pub corners: [Option<OutputMatrix>; 4],
}

impl ProjectedOutputs {
    /// Number of detections (columns).
    #[inline]
    pub fn len(&self) -> usize {
        self.id.cols()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Number of allocated containers.
    pub fn container_count(&self) -> usize {
        1 + usize::from(self.center.is_some()) + self.corners.iter().flatten().count()
    }

    /// Allocated containers in positional order, paired with their names.
    pub fn into_positional(self) -> Vec<(&'static str, OutputMatrix)> {
        std::iter::once(Some(self.id))
            .chain(std::iter::once(self.center))
            .chain(self.corners)
            .zip(OUTPUT_NAMES)
            .filter_map(|(m, name)| m.map(|m| (name, m)))
            .collect()
    }
}

/// Copy detection records into the containers selected by `request`.
///
/// The id matrix is always allocated. Columns follow the detection order.
/// The records are consumed and released once their fields are copied.
#[cfg_attr(
    feature = "tracing",
    tracing::instrument(
        level = "debug",
        skip(detections),
        fields(n = detections.len(), k = request.count())
    )
)]
pub fn project(
    detections: Detections,
    request: OutputRequest,
) -> Result<ProjectedOutputs, TagScanError> {
    let n = detections.len();

    let mut id = OutputMatrix::zeros(1, n, "id matrix")?;
    let mut center = if request.wants_center() {
        Some(OutputMatrix::zeros(2, n, "center matrix")?)
    } else {
        None
    };
    let mut corners: [Option<OutputMatrix>; 4] = [None, None, None, None];
    for (j, slot) in corners.iter_mut().enumerate() {
        if request.wants_corner(j + 1) {
            *slot = Some(OutputMatrix::zeros(2, n, "corner matrix")?);
        }
    }

    for (i, det) in detections.iter().enumerate() {
        id.set_column(i, &[f64::from(det.id)]);
        if let Some(center) = center.as_mut() {
            center.set_column(i, &[det.center.x, det.center.y]);
        }
        for (slot, p) in corners.iter_mut().zip(det.corners.iter()) {
            if let Some(m) = slot.as_mut() {
                m.set_column(i, &[p.x, p.y]);
            }
        }
    }

    Ok(ProjectedOutputs {
        id,
        center,
        corners,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detection::TagDetection;
    use nalgebra::Point2;

    fn record(id: u32, offset: f64) -> TagDetection {
        TagDetection {
            id,
            hamming: 0,
            decision_margin: 40.0,
            center: Point2::new(offset + 5.0, offset + 6.0),
            corners: [
                Point2::new(offset, offset),
                Point2::new(offset, offset + 10.0),
                Point2::new(offset + 10.0, offset + 10.0),
                Point2::new(offset + 10.0, offset),
            ],
        }
    }

    fn sample() -> Detections {
        Detections::new(vec![record(17, 0.0), record(3, 100.0)])
    }

    #[test]
    fn container_count_matches_request() {
        for k in 0..=OutputRequest::MAX {
            let request = OutputRequest::new(k).unwrap();
            let out = project(sample(), request).unwrap();
            assert_eq!(out.container_count(), k.max(1), "k={k}");
            for (_, m) in out.into_positional() {
                assert_eq!(m.cols(), 2);
            }
        }
    }

    #[test]
    fn id_only_leaves_geometry_absent() {
        let out = project(sample(), OutputRequest::new(0).unwrap()).unwrap();
        assert!(out.center.is_none());
        assert!(out.corners.iter().all(Option::is_none));
        assert_eq!(out.id.as_slice(), &[17.0, 3.0]);
        assert_eq!(out.id.rows(), 1);
    }

    #[test]
    fn three_outputs_allocate_id_center_and_first_corner() {
        let out = project(sample(), OutputRequest::new(3).unwrap()).unwrap();
        let names: Vec<_> = out.clone().into_positional().into_iter().map(|(n, _)| n).collect();
        assert_eq!(names, ["id", "center", "corner_1"]);
        assert!(out.corners[1..].iter().all(Option::is_none));
    }

    #[test]
    fn values_land_in_detection_order() {
        let out = project(sample(), OutputRequest::all()).unwrap();
        let center = out.center.as_ref().unwrap();
        assert_eq!(center.column(0), &[5.0, 6.0]);
        assert_eq!(center.column(1), &[105.0, 106.0]);

        let lower_right = out.corners[2].as_ref().unwrap();
        assert_eq!(lower_right.get(0, 1), 110.0);
        assert_eq!(lower_right.get(1, 1), 110.0);

        let upper_right = out.corners[3].as_ref().unwrap();
        assert_eq!(upper_right.as_slice(), &[10.0, 0.0, 110.0, 100.0]);
    }

    #[test]
    fn empty_collection_yields_empty_containers() {
        let out = project(Detections::default(), OutputRequest::all()).unwrap();
        assert!(out.is_empty());
        assert_eq!(out.container_count(), 6);
        for (_, m) in out.into_positional() {
            assert_eq!(m.cols(), 0);
            assert!(m.is_empty());
        }
    }
}
