use serde::{Deserialize, Serialize};
use crate::common::ResizeMode;

/// How one source image was placed into the network input.
///
/// Network coordinates relate to source pixels by
/// `net = src * scale + pad`, per axis.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Ratio {
    pub src_width: u32,
    pub src_height: u32,
    /// Size of the resized image inside the network input, without padding.
    pub resized_width: u32,
    pub resized_height: u32,
    pub scale_x: f32,
    pub scale_y: f32,
    pub pad_x: u32,
    pub pad_y: u32,
}

impl Ratio {
    /// Maps a network-space point back to source pixels.
    pub fn to_image(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.pad_x as f32) / self.scale_x,
            (y - self.pad_y as f32) / self.scale_y,
        )
    }

    /// Maps a source-image point into network space.
    pub fn to_network(&self, x: f32, y: f32) -> (f32, f32) {
        (
            x * self.scale_x + self.pad_x as f32,
            y * self.scale_y + self.pad_y as f32,
        )
    }

    /// The `(scale_y, scale_x)` pair PP-YOLOE expects in its `scale_factor` input.
    pub fn scale_factor(&self) -> [f32; 2] {
        [self.scale_y, self.scale_x]
    }
}

/// Computes where a `src_w x src_h` image lands inside a `dst_w x dst_h` input.
///
/// Letterboxing keeps the aspect ratio and centers the image; the padding is
/// whole pixels so the image starts on the pixel grid. Returns `None` for
/// zero-sized source or destination.
pub fn get_img_ratio(src_w: u32, src_h: u32, dst_w: u32, dst_h: u32, mode: ResizeMode) -> Option<Ratio> {
    if src_w == 0 || src_h == 0 || dst_w == 0 || dst_h == 0 {
        return None;
    }

    let (resized_width, resized_height, pad_x, pad_y) = match mode {
        ResizeMode::Stretch => (dst_w, dst_h, 0, 0),
        ResizeMode::Letterbox => {
            let scale = (dst_w as f32 / src_w as f32).min(dst_h as f32 / src_h as f32);
            let new_w = ((src_w as f32 * scale).round() as u32).clamp(1, dst_w);
            let new_h = ((src_h as f32 * scale).round() as u32).clamp(1, dst_h);
            (new_w, new_h, (dst_w - new_w) / 2, (dst_h - new_h) / 2)
        }
    };

    Some(Ratio {
        src_width: src_w,
        src_height: src_h,
        resized_width,
        resized_height,
        scale_x: resized_width as f32 / src_w as f32,
        scale_y: resized_height as f32 / src_h as f32,
        pad_x,
        pad_y,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn letterbox_landscape_into_square() {
        let r = get_img_ratio(640, 480, 416, 416, ResizeMode::Letterbox).unwrap();
        assert_eq!((r.resized_width, r.resized_height), (416, 312));
        assert_eq!((r.pad_x, r.pad_y), (0, 52));
        assert!((r.scale_x - 0.65).abs() < 1e-6);
        assert!((r.scale_y - 0.65).abs() < 1e-6);
    }

    #[test]
    fn stretch_has_no_padding() {
        let r = get_img_ratio(1280, 720, 640, 640, ResizeMode::Stretch).unwrap();
        assert_eq!((r.pad_x, r.pad_y), (0, 0));
        assert!((r.scale_x - 0.5).abs() < 1e-6);
        assert!((r.scale_y - 640. / 720.).abs() < 1e-6);
        assert_eq!(r.scale_factor(), [r.scale_y, r.scale_x]);
    }

    #[test]
    fn round_trip_is_exact_within_tolerance() {
        for mode in [ResizeMode::Letterbox, ResizeMode::Stretch] {
            let r = get_img_ratio(1920, 1080, 640, 640, mode).unwrap();
            for &(x, y) in &[(0., 0.), (123.5, 77.25), (1919., 1079.)] {
                let (nx, ny) = r.to_network(x, y);
                let (bx, by) = r.to_image(nx, ny);
                assert!((bx - x).abs() < 1e-2, "{mode:?} x {x} -> {bx}");
                assert!((by - y).abs() < 1e-2, "{mode:?} y {y} -> {by}");
            }
        }
    }

    #[test]
    fn zero_dimensions_have_no_ratio() {
        assert!(get_img_ratio(0, 480, 416, 416, ResizeMode::Letterbox).is_none());
        assert!(get_img_ratio(640, 0, 416, 416, ResizeMode::Stretch).is_none());
    }

    #[test]
    fn extreme_aspect_keeps_one_pixel() {
        let r = get_img_ratio(10000, 1, 640, 640, ResizeMode::Letterbox).unwrap();
        assert_eq!(r.resized_height, 1);
        assert_eq!(r.resized_width, 640);
    }
}
