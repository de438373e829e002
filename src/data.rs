mod ratio;
mod tensor;
mod time_stamp;

pub use ratio::{get_img_ratio, Ratio};
pub use tensor::*;
pub use time_stamp::TimeStamp;
