mod inference_session;
pub mod nms;
mod postprocess;
mod preprocess;
mod tensor_converter;
#[cfg(feature = "ort-backend")]
mod ort_session;

pub use inference_session::InferenceSession;
pub use nms::{nms, Nms};
pub use postprocess::BoxDecoder;
pub use preprocess::ImagePreprocessor;
pub use tensor_converter::{ConvertParams, FirConverter, TensorConverter};
#[cfg(feature = "ort-backend")]
pub use ort_session::{OrtSession, OrtSessionOptions};
