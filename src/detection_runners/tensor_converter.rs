//! Turning decoded images into normalized network input.

use anyhow::{bail, Result};
use fast_image_resize::{
    images::{Image as FirImage, ImageRef},
    pixels::PixelType,
    FilterType, ResizeAlg, ResizeOptions, Resizer,
};
use image::RgbImage;
use ndarray::{ArrayViewMutD, Axis, Ix3};
use crate::data::Ratio;

/// Parameters shared by every slot of a batch.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ConvertParams {
    /// Interleaved affine pairs, see [`crate::common::Normalization::affine`].
    pub ab: [f32; 6],
    /// Raw pixel value used for letterbox padding, normalized like image pixels.
    pub pad_value: u8,
}

/// Writes one image into one `[3, net_h, net_w]` batch slot.
///
/// Implementations resize the image to `ratio.resized_*`, place it at
/// `ratio.pad_*`, fill the rest with the pad value and apply the affine
/// normalization. Slots of a batch are converted concurrently.
pub trait TensorConverter: Sync {
    fn convert(
        &self,
        image: &RgbImage,
        ratio: &Ratio,
        params: &ConvertParams,
        dst: ArrayViewMutD<'_, f32>,
    ) -> Result<()>;
}

/// CPU converter backed by `fast_image_resize`.
pub struct FirConverter {
    options: ResizeOptions,
}

impl Default for FirConverter {
    fn default() -> Self {
        Self::new(ResizeAlg::Convolution(FilterType::Bilinear))
    }
}

impl FirConverter {
    pub fn new(alg: ResizeAlg) -> Self {
        Self {
            options: ResizeOptions::new().resize_alg(alg),
        }
    }
}

impl TensorConverter for FirConverter {
    fn convert(
        &self,
        image: &RgbImage,
        ratio: &Ratio,
        params: &ConvertParams,
        dst: ArrayViewMutD<'_, f32>,
    ) -> Result<()> {
        let mut dst = dst.into_dimensionality::<Ix3>()?;
        let (channels, net_h, net_w) = dst.dim();
        if channels != 3 {
            bail!("Expected a 3-channel slot, got {channels}");
        }

        let (rw, rh) = (ratio.resized_width as usize, ratio.resized_height as usize);
        let (px, py) = (ratio.pad_x as usize, ratio.pad_y as usize);
        if rw + px > net_w || rh + py > net_h {
            bail!(
                "Resized image {rw}x{rh} at ({px}, {py}) does not fit the {net_w}x{net_h} input"
            );
        }

        let (w, h) = image.dimensions();
        let src = ImageRef::new(w, h, image.as_raw(), PixelType::U8x3)?;
        let mut resized = FirImage::new(ratio.resized_width, ratio.resized_height, PixelType::U8x3);
        let mut resizer = Resizer::new();
        resizer.resize(&src, &mut resized, &self.options)?;

        let ab = &params.ab;
        let pad = params.pad_value as f32;
        for (c, mut plane) in dst.axis_iter_mut(Axis(0)).enumerate() {
            plane.fill(pad * ab[2 * c] + ab[2 * c + 1]);
        }

        let buf = resized.buffer();
        for y in 0..rh {
            let row = &buf[3 * y * rw..3 * (y + 1) * rw];
            for (x, px_rgb) in row.chunks_exact(3).enumerate() {
                for c in 0..3 {
                    dst[[c, y + py, x + px]] = px_rgb[c] as f32 * ab[2 * c] + ab[2 * c + 1];
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::common::{Normalization, ResizeMode};
    use crate::data::get_img_ratio;
    use ndarray::Array3;

    #[test]
    fn letterbox_pads_and_normalizes() {
        let image = RgbImage::from_pixel(4, 2, image::Rgb([255, 0, 255]));
        let ratio = get_img_ratio(4, 2, 4, 4, ResizeMode::Letterbox).unwrap();
        let params = ConvertParams {
            ab: Normalization::identity_unit().affine(),
            pad_value: 0,
        };
        let mut slot = Array3::<f32>::zeros((3, 4, 4));
        FirConverter::default()
            .convert(&image, &ratio, &params, slot.view_mut().into_dyn())
            .unwrap();

        // rows 0 and 3 are padding, rows 1..3 hold the image
        assert_eq!(slot[[0, 0, 0]], 0.);
        assert!((slot[[0, 1, 0]] - 1.).abs() < 1e-6);
        assert!((slot[[1, 1, 2]]).abs() < 1e-6);
        assert!((slot[[2, 2, 3]] - 1.).abs() < 1e-6);
        assert_eq!(slot[[2, 3, 3]], 0.);
    }

    #[test]
    fn rejects_slot_that_is_too_small() {
        let image = RgbImage::new(8, 8);
        let ratio = get_img_ratio(8, 8, 8, 8, ResizeMode::Stretch).unwrap();
        let params = ConvertParams {
            ab: Normalization::identity_unit().affine(),
            pad_value: 114,
        };
        let mut slot = Array3::<f32>::zeros((3, 4, 4));
        assert!(FirConverter::default()
            .convert(&image, &ratio, &params, slot.view_mut().into_dyn())
            .is_err());
    }
}
