//! Options for building a detector.

use std::path::{Path, PathBuf};
use serde::{Deserialize, Serialize};
use crate::common::{BoxEncoding, BoxSpace, ResizeMode, ScoreLayout};
use crate::error::DetectError;

/// Per-channel mean/std in `[0, 1]` pixel units (the 6-float `norm` record).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Normalization {
    pub mean: [f32; 3],
    pub std: [f32; 3],
}

impl Default for Normalization {
    fn default() -> Self {
        // ImageNet statistics, which PP-YOLOE is trained with
        Self {
            mean: [0.485, 0.456, 0.406],
            std: [0.229, 0.224, 0.225],
        }
    }
}

impl Normalization {
    /// Plain `pixel / 255`.
    pub fn identity_unit() -> Self {
        Self {
            mean: [0.; 3],
            std: [1.; 3],
        }
    }

    /// Interleaved affine pairs `[a_r, b_r, a_g, b_g, a_b, b_b]` with
    /// `pixel' = pixel * a_c + b_c` for 8-bit pixels.
    pub fn affine(&self) -> [f32; 6] {
        let mut ab = [0f32; 6];
        for c in 0..3 {
            ab[2 * c] = 1. / (255. * self.std[c]);
            ab[2 * c + 1] = -self.mean[c] / self.std[c];
        }
        ab
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    pub conf_threshold: f32,
    pub nms_threshold: f32,
    pub class_num: usize,
    pub class_names_file: Option<PathBuf>,
    pub class_names: Option<Vec<String>>,
    pub normalization: Normalization,
    pub resize_mode: ResizeMode,
    pub pad_value: u8,
    pub box_encoding: BoxEncoding,
    pub score_layout: ScoreLayout,
    pub box_space: BoxSpace,
    pub num_dry_run: usize,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            conf_threshold: 0.5,
            nms_threshold: 0.5,
            class_num: 80, // COCO
            class_names_file: None,
            class_names: None,
            normalization: Normalization::default(),
            resize_mode: ResizeMode::Letterbox,
            pad_value: 114,
            box_encoding: BoxEncoding::Xyxy,
            score_layout: ScoreLayout::ClassMajor,
            box_space: BoxSpace::Network,
            num_dry_run: 0,
        }
    }
}

impl DetectorConfig {
    pub fn new() -> Self {
        Default::default()
    }

    /// Reads a JSON configuration; missing fields keep their defaults.
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, DetectError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .map_err(|e| DetectError::Config(format!("cannot read {}: {e}", path.display())))?;
        serde_json::from_str(&text)
            .map_err(|e| DetectError::Config(format!("cannot parse {}: {e}", path.display())))
    }

    pub fn with_conf_threshold(mut self, x: f32) -> Self {
        self.conf_threshold = x;
        self
    }

    pub fn with_nms_threshold(mut self, x: f32) -> Self {
        self.nms_threshold = x;
        self
    }

    pub fn with_class_num(mut self, nc: usize) -> Self {
        self.class_num = nc;
        self
    }

    pub fn with_class_names_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.class_names_file = Some(path.as_ref().to_path_buf());
        self
    }

    pub fn with_class_names(mut self, names: &[&str]) -> Self {
        self.class_names = Some(names.iter().map(|x| x.to_string()).collect::<Vec<String>>());
        self
    }

    pub fn with_normalization(mut self, x: Normalization) -> Self {
        self.normalization = x;
        self
    }

    pub fn with_resize_mode(mut self, x: ResizeMode) -> Self {
        self.resize_mode = x;
        self
    }

    pub fn with_pad_value(mut self, x: u8) -> Self {
        self.pad_value = x;
        self
    }

    pub fn with_box_encoding(mut self, x: BoxEncoding) -> Self {
        self.box_encoding = x;
        self
    }

    pub fn with_score_layout(mut self, x: ScoreLayout) -> Self {
        self.score_layout = x;
        self
    }

    pub fn with_box_space(mut self, x: BoxSpace) -> Self {
        self.box_space = x;
        self
    }

    pub fn with_dry_run(mut self, n: usize) -> Self {
        self.num_dry_run = n;
        self
    }

    /// Rejects values that would make decoding meaningless.
    pub fn validate(&self) -> Result<(), DetectError> {
        if !(0.0..=1.0).contains(&self.conf_threshold) {
            return Err(DetectError::Config(format!(
                "confidence threshold {} is outside [0, 1]",
                self.conf_threshold
            )));
        }
        if !(0.0..=1.0).contains(&self.nms_threshold) {
            return Err(DetectError::Config(format!(
                "NMS threshold {} is outside [0, 1]",
                self.nms_threshold
            )));
        }
        if self.class_num == 0 {
            return Err(DetectError::Config("class count must be positive".to_string()));
        }
        if self.normalization.std.iter().any(|s| !s.is_normal()) {
            return Err(DetectError::Config(format!(
                "normalization std {:?} must be non-zero",
                self.normalization.std
            )));
        }
        Ok(())
    }
}

impl std::fmt::Display for DetectorConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "Confidence Threshold: {}\n\
        NMS Threshold: {}\n\
        Class Count: {}\n\
        Class Names File: {:?}\n\
        Resize Mode: {:?} (pad {})\n\
        Box Encoding: {:?}\n\
        Score Layout: {:?}\n\
        Box Space: {:?}",
               self.conf_threshold, self.nms_threshold, self.class_num,
               self.class_names_file, self.resize_mode, self.pad_value,
               self.box_encoding, self.score_layout, self.box_space)
    }
}
