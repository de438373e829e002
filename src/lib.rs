//! PP-YOLOE object detection over a pluggable inference session.
//!
//! A [`Detector`] owns one [`InferenceSession`] and runs
//! preprocess, inference, box decoding and class-aware NMS per call.
//! Enable the `ort-backend` feature for an ONNX Runtime session.

mod detector;
mod error;
mod utils;
pub mod common;
pub mod data;
pub mod detection_runners;

pub use crate::common::{
    iou, BoxEncoding, BoxList, BoxSpace, DetectBox, DetectorConfig, InferenceDevice, Normalization,
    ResizeMode, ScoreLayout,
};
pub use crate::data::{get_img_ratio, DType, Ratio, Tensor, TensorInfo, TensorMuts, TensorRefs, TimeStamp};
pub use crate::detection_runners::{nms, FirConverter, InferenceSession, TensorConverter};
#[cfg(feature = "ort-backend")]
pub use crate::detection_runners::{OrtSession, OrtSessionOptions};
pub use crate::detector::Detector;
pub use crate::error::DetectError;
pub use crate::utils::{load_class_names, parse_names_metadata};

pub type Result<T, E = DetectError> = std::result::Result<T, E>;
