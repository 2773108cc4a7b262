use serde::{Deserialize, Serialize};

use crate::error::TagScanError;

/// Tag family understood by the detector.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TagFamily {
    /// 36 data bits, minimum Hamming distance 11, 587 codes.
    #[default]
    Tag36h11,
}

impl TagFamily {
    pub fn name(self) -> &'static str {
        match self {
            Self::Tag36h11 => "tag36h11",
        }
    }

    /// Side of the tag in cells, from the outer edge of the black border.
    /// An image narrower than this cannot hold a tag.
    #[inline]
    pub fn width_at_border(self) -> usize {
        match self {
            Self::Tag36h11 => 8,
        }
    }

    /// Number of valid codes in the family.
    #[inline]
    pub fn code_count(self) -> u32 {
        match self {
            Self::Tag36h11 => 587,
        }
    }

    /// Whether the family is printed with a black border around the data bits.
    #[inline]
    pub fn black_border(self) -> bool {
        match self {
            Self::Tag36h11 => true,
        }
    }
}

/// Tuning parameters for one detection call.
///
/// Missing JSON fields take the values of [`DetectorConfig::default`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Tag family to decode.
    pub family: TagFamily,
    /// Whether the family's border is black; must agree with the family.
    pub black_border: bool,
    /// Downsampling factor for the quad search. `1.0` disables decimation.
    pub quad_decimate: f32,
    /// Gaussian blur applied before the quad search. `0.0` disables it,
    /// negative values sharpen.
    pub quad_sigma: f32,
    /// Worker threads used inside the backend.
    pub nthreads: usize,
    /// Snap quad edges to strong gradients after decimation.
    pub refine_edges: bool,
    /// Extra decode pass to reduce false negatives.
    pub refine_decode: bool,
    /// Extra pass to improve corner accuracy for pose estimation.
    pub refine_pose: bool,
    /// Sharpening applied to decoded samples.
    pub decode_sharpening: f64,
    /// Maximum number of bit errors corrected while decoding.
    pub max_hamming: u8,
    /// Ask the backend to write its debug images.
    pub debug: bool,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            family: TagFamily::Tag36h11,
            black_border: true,
            quad_decimate: 1.0,
            quad_sigma: 0.0,
            nthreads: 4,
            refine_edges: true,
            refine_decode: false,
            refine_pose: false,
            decode_sharpening: 0.25,
            max_hamming: 2,
            debug: false,
        }
    }
}

impl DetectorConfig {
    /// Backends compile decoding tables for at most this many corrected bits.
    pub const MAX_HAMMING: u8 = 3;

    /// Check ranges before any backend state is built.
    pub fn validate(&self) -> Result<(), TagScanError> {
        if !self.quad_decimate.is_finite() || self.quad_decimate < 1.0 {
            return Err(TagScanError::config(format!(
                "quad_decimate must be >= 1, got {}",
                self.quad_decimate
            )));
        }
        if !self.quad_sigma.is_finite() {
            return Err(TagScanError::config("quad_sigma must be finite"));
        }
        if self.nthreads == 0 {
            return Err(TagScanError::config("nthreads must be >= 1"));
        }
        if !self.decode_sharpening.is_finite() || self.decode_sharpening < 0.0 {
            return Err(TagScanError::config(format!(
                "decode_sharpening must be >= 0, got {}",
                self.decode_sharpening
            )));
        }
        if self.max_hamming > Self::MAX_HAMMING {
            return Err(TagScanError::config(format!(
                "max_hamming must be <= {}, got {}",
                Self::MAX_HAMMING,
                self.max_hamming
            )));
        }
        if self.black_border != self.family.black_border() {
            return Err(TagScanError::config(format!(
                "{} requires black_border = {}",
                self.family.name(),
                self.family.black_border()
            )));
        }
        Ok(())
    }

    /// Parse a JSON document, filling unspecified fields with defaults.
    pub fn from_json(text: &str) -> Result<Self, TagScanError> {
        let cfg: Self =
            serde_json::from_str(text).map_err(|e| TagScanError::config(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_single_call_setup() {
        let cfg = DetectorConfig::default();
        assert_eq!(cfg.family, TagFamily::Tag36h11);
        assert!(cfg.black_border);
        assert_eq!(cfg.quad_decimate, 1.0);
        assert_eq!(cfg.quad_sigma, 0.0);
        assert_eq!(cfg.nthreads, 4);
        assert!(cfg.refine_edges);
        assert!(!cfg.refine_decode);
        assert!(!cfg.refine_pose);
        assert!(cfg.validate().is_ok());
    }

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg = DetectorConfig::from_json(r#"{ "nthreads": 1, "family": "tag36h11" }"#)
            .expect("parse");
        assert_eq!(cfg.nthreads, 1);
        assert!(cfg.refine_edges);
        assert_eq!(cfg.max_hamming, 2);
    }

    #[test]
    fn rejects_out_of_range_values() {
        let bad = [
            DetectorConfig {
                quad_decimate: 0.5,
                ..DetectorConfig::default()
            },
            DetectorConfig {
                nthreads: 0,
                ..DetectorConfig::default()
            },
            DetectorConfig {
                max_hamming: 4,
                ..DetectorConfig::default()
            },
            DetectorConfig {
                black_border: false,
                ..DetectorConfig::default()
            },
            DetectorConfig {
                quad_sigma: f32::NAN,
                ..DetectorConfig::default()
            },
        ];
        for cfg in bad {
            let err = cfg.validate().unwrap_err();
            assert_eq!(err.identifier(), "tagscan:config", "{cfg:?}");
        }
    }

    #[test]
    fn unknown_family_is_a_config_error() {
        let err = DetectorConfig::from_json(r#"{ "family": "tag16h5" }"#).unwrap_err();
        assert_eq!(err.identifier(), "tagscan:config");
    }
}
