use image::RgbImage;
use ndarray::parallel::prelude::*;
use ndarray::Axis;
use crate::common::ResizeMode;
use crate::data::{get_img_ratio, Ratio, Tensor};
use crate::detection_runners::tensor_converter::{ConvertParams, TensorConverter};
use crate::error::DetectError;

/// Fills the batched image tensor (and the optional ratio tensor) for one call.
#[derive(Debug, Clone)]
pub struct ImagePreprocessor {
    pub net_width: u32,
    pub net_height: u32,
    pub max_batch: usize,
    pub resize_mode: ResizeMode,
    pub params: ConvertParams,
}

impl ImagePreprocessor {
    /// Converts `images` into the leading slots of `img_tensor`
    /// (`[max_batch, 3, net_h, net_w]`) and returns one [`Ratio`] per image.
    ///
    /// Unused trailing slots are zeroed. When `ratio_tensor` (`[max_batch, 2]`)
    /// is given, each used slot receives the image's `(scale_y, scale_x)` and
    /// unused slots receive `1.0`.
    pub fn process<C: TensorConverter + ?Sized>(
        &self,
        converter: &C,
        images: &[RgbImage],
        img_tensor: &mut Tensor,
        ratio_tensor: Option<&mut Tensor>,
    ) -> Result<Vec<Ratio>, DetectError> {
        if images.len() > self.max_batch {
            return Err(DetectError::BatchTooLarge {
                got: images.len(),
                max: self.max_batch,
            });
        }

        let ratios = images
            .iter()
            .enumerate()
            .map(|(index, image)| {
                let (width, height) = image.dimensions();
                get_img_ratio(width, height, self.net_width, self.net_height, self.resize_mode)
                    .ok_or(DetectError::MalformedImage { index, width, height })
            })
            .collect::<Result<Vec<_>, _>>()?;

        for i in images.len()..self.max_batch {
            img_tensor.slot_mut(i).fill(0.);
        }

        img_tensor
            .axis_iter_mut(Axis(0))
            .into_par_iter()
            .zip(images.par_iter().zip(ratios.par_iter()))
            .try_for_each(|(slot, (image, ratio))| converter.convert(image, ratio, &self.params, slot))
            .map_err(DetectError::Preprocess)?;

        if let Some(ratio_tensor) = ratio_tensor {
            for i in 0..self.max_batch {
                let [sy, sx] = ratios.get(i).map_or([1., 1.], Ratio::scale_factor);
                let mut slot = ratio_tensor.slot_mut(i);
                if let Some(values) = slot.as_slice_mut() {
                    if values.len() == 2 {
                        values[0] = sy;
                        values[1] = sx;
                    }
                }
            }
        }

        log::debug!("Preprocessed {} image(s) into a batch of {}", images.len(), self.max_batch);
        Ok(ratios)
    }
}
