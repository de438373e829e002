mod detect_box;
mod detector_config;
mod inference_device;
mod tensor_layout;

pub use detect_box::*;
pub use detector_config::*;
pub use inference_device::*;
pub use tensor_layout::*;
