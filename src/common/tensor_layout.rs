use serde::{Deserialize, Serialize};

/// How the four coordinate values of a box are encoded in the coordinate tensor.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoxEncoding {
    /// Top-left and bottom-right corners. PP-YOLOE exports use this.
    #[default]
    Xyxy,
    /// Center, width and height.
    Cxcywh,
}

impl BoxEncoding {
    /// Converts four raw values into `(x1, y1, x2, y2)`.
    pub fn to_xyxy(&self, v: [f32; 4]) -> (f32, f32, f32, f32) {
        match self {
            BoxEncoding::Xyxy => (v[0], v[1], v[2], v[3]),
            BoxEncoding::Cxcywh => {
                let (cx, cy, w, h) = (v[0], v[1], v[2], v[3]);
                (cx - w / 2., cy - h / 2., cx + w / 2., cy + h / 2.)
            }
        }
    }
}

/// Memory order of the per-image score tensor.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreLayout {
    /// `[classes, boxes]`: the scores of one box are `boxes` apart.
    #[default]
    ClassMajor,
    /// `[boxes, classes]`: the scores of one box are contiguous.
    BoxMajor,
}

impl ScoreLayout {
    /// Offset of the first score of `box_idx` and the stride between its classes.
    pub fn start_and_stride(&self, box_idx: usize, num_boxes: usize, num_classes: usize) -> (usize, usize) {
        match self {
            ScoreLayout::ClassMajor => (box_idx, num_boxes),
            ScoreLayout::BoxMajor => (box_idx * num_classes, 1),
        }
    }

    /// Reads `(classes, boxes)` out of a per-image score shape.
    pub fn classes_and_boxes(&self, dims: &[usize]) -> Option<(usize, usize)> {
        match (self, dims) {
            (ScoreLayout::ClassMajor, [c, a]) => Some((*c, *a)),
            (ScoreLayout::BoxMajor, [a, c]) => Some((*c, *a)),
            _ => None,
        }
    }
}

/// Coordinate space the model writes its boxes in.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoxSpace {
    /// Network input pixels; the decoder undoes the resize and padding.
    #[default]
    Network,
    /// Network pixels divided by the ratio input; the decoder still removes
    /// the letterbox padding.
    Image,
}

/// How a source image is fitted into the network input.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResizeMode {
    /// Keep the aspect ratio and pad the remainder, centered.
    #[default]
    Letterbox,
    /// Scale x and y independently to fill the input exactly.
    Stretch,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cxcywh_to_corners() {
        let (x1, y1, x2, y2) = BoxEncoding::Cxcywh.to_xyxy([50., 40., 20., 10.]);
        assert_eq!((x1, y1, x2, y2), (40., 35., 60., 45.));
    }

    #[test]
    fn strides_follow_layout() {
        assert_eq!(ScoreLayout::ClassMajor.start_and_stride(3, 100, 80), (3, 100));
        assert_eq!(ScoreLayout::BoxMajor.start_and_stride(3, 100, 80), (240, 1));
    }

    #[test]
    fn class_and_box_counts() {
        assert_eq!(ScoreLayout::ClassMajor.classes_and_boxes(&[80, 8400]), Some((80, 8400)));
        assert_eq!(ScoreLayout::BoxMajor.classes_and_boxes(&[8400, 80]), Some((80, 8400)));
        assert_eq!(ScoreLayout::BoxMajor.classes_and_boxes(&[8400]), None);
    }
}
