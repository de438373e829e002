//! Decoding raw score and coordinate tensors into boxes.

use crate::common::{BoxEncoding, BoxList, BoxSpace, DetectBox, ScoreLayout};
use crate::data::Ratio;

/// Per-image decoder for the fixed two-output topology: a score tensor of
/// `num_classes x num_boxes` values and a `num_boxes x 4` coordinate tensor.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoxDecoder {
    pub conf_threshold: f32,
    pub num_classes: usize,
    pub encoding: BoxEncoding,
    pub layout: ScoreLayout,
    pub space: BoxSpace,
}

impl BoxDecoder {
    /// Emits every box whose best class scores at least `conf_threshold`,
    /// mapped to source pixels and clipped to the image. Boxes that end up
    /// empty after clipping are discarded. Output follows box index order.
    pub fn decode(&self, scores: &[f32], coords: &[f32], num_boxes: usize, ratio: &Ratio) -> BoxList {
        let (img_w, img_h) = (ratio.src_width as f32, ratio.src_height as f32);

        (0..num_boxes)
            .filter_map(|i| {
                let (start, stride) = self.layout.start_and_stride(i, num_boxes, self.num_classes);
                let (class_id, score) = argmax_interval(scores, start, stride, self.num_classes)?;
                if score < self.conf_threshold {
                    return None;
                }

                let raw: [f32; 4] = coords.get(4 * i..4 * i + 4)?.try_into().ok()?;
                let (x1, y1, x2, y2) = self.encoding.to_xyxy(raw);
                let (x1, y1, x2, y2) = match self.space {
                    BoxSpace::Network => {
                        let (x1, y1) = ratio.to_image(x1, y1);
                        let (x2, y2) = ratio.to_image(x2, y2);
                        (x1, y1, x2, y2)
                    }
                    BoxSpace::Image => {
                        // already divided by the scale, only the padding remains
                        let dx = ratio.pad_x as f32 / ratio.scale_x;
                        let dy = ratio.pad_y as f32 / ratio.scale_y;
                        (x1 - dx, y1 - dy, x2 - dx, y2 - dy)
                    }
                };

                let x1 = x1.clamp(0., img_w);
                let y1 = y1.clamp(0., img_h);
                let x2 = x2.clamp(0., img_w);
                let y2 = y2.clamp(0., img_h);
                // also rejects NaN coordinates
                if !(x2 > x1 && y2 > y1) {
                    return None;
                }

                Some(DetectBox::from_x1y1_x2y2(x1, y1, x2, y2, score, class_id))
            })
            .collect()
    }
}

/// Index and value of the largest of `count` values starting at `start`,
/// `stride` apart. The first maximum wins ties and NaNs are skipped.
/// Returns `None` if the interval runs past `data` or holds no number.
pub(crate) fn argmax_interval(data: &[f32], start: usize, stride: usize, count: usize) -> Option<(usize, f32)> {
    if count == 0 || start + (count - 1) * stride >= data.len() {
        return None;
    }

    let mut best: Option<(usize, f32)> = None;
    for k in 0..count {
        let v = data[start + k * stride];
        if v.is_nan() {
            continue;
        }
        if best.map_or(true, |(_, b)| v > b) {
            best = Some((k, v));
        }
    }
    best
}
