use serde::{Deserialize, Serialize};
use crate::detection_runners::nms::Nms;

/// One detection in source-image pixel coordinates.
///
/// `(x, y)` is the top-left corner. Boxes are produced by the decoder and only
/// ever dropped afterwards, never edited.
#[derive(Default, Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DetectBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub score: f32,
    pub class_id: usize,
}

/// Detections of a single image.
pub type BoxList = Vec<DetectBox>;

impl Nms for DetectBox {
    fn iou(&self, other: &Self) -> f32 {
        iou(self, other)
    }

    fn confidence(&self) -> f32 {
        self.score
    }

    fn class_id(&self) -> usize {
        self.class_id
    }
}

impl DetectBox {
    pub fn new(x: f32, y: f32, width: f32, height: f32, score: f32, class_id: usize) -> Self {
        Self {
            x,
            y,
            width,
            height,
            score,
            class_id,
        }
    }

    /// Builds a box from its corners `(x1, y1, x2, y2)`.
    ///
    /// # Arguments
    ///
    /// * `x1` - The x-coordinate of the top-left corner.
    /// * `y1` - The y-coordinate of the top-left corner.
    /// * `x2` - The x-coordinate of the bottom-right corner.
    /// * `y2` - The y-coordinate of the bottom-right corner.
    /// * `score` - Confidence of the detection.
    /// * `class_id` - Index of the winning class.
    pub fn from_x1y1_x2y2(x1: f32, y1: f32, x2: f32, y2: f32, score: f32, class_id: usize) -> Self {
        Self::new(x1, y1, x2 - x1, y2 - y1, score, class_id)
    }

    /// Returns the maximum x-coordinate of the bounding box.
    pub fn x_max(&self) -> f32 {
        self.x + self.width
    }

    /// Returns the maximum y-coordinate of the bounding box.
    pub fn y_max(&self) -> f32 {
        self.y + self.height
    }

    /// Returns the center coordinates as `(cx, cy)`.
    pub fn center(&self) -> (f32, f32) {
        (self.x + self.width / 2., self.y + self.height / 2.)
    }

    /// Returns the bounding box as `(x1, y1, x2, y2)`.
    pub fn xy1_xy2(&self) -> (f32, f32, f32, f32) {
        (self.x, self.y, self.x_max(), self.y_max())
    }

    /// Area of the box; degenerate boxes have zero area.
    pub fn area(&self) -> f32 {
        self.width.max(0.) * self.height.max(0.)
    }

    /// Computes the intersection area between this bounding box and another.
    pub fn intersect(&self, other: &DetectBox) -> f32 {
        let left = self.x.max(other.x);
        let right = self.x_max().min(other.x_max());
        let top = self.y.max(other.y);
        let bottom = self.y_max().min(other.y_max());
        (right - left).max(0.) * (bottom - top).max(0.)
    }

    /// Computes the union area between this bounding box and another.
    pub fn union(&self, other: &DetectBox) -> f32 {
        self.area() + other.area() - self.intersect(other)
    }

    /// Integer rectangle `(x, y, w, h)`, handy for drawing.
    pub fn as_xy_wh_i32(&self) -> (i32, i32, i32, i32) {
        (self.x.round() as i32,
         self.y.round() as i32,
         self.width.round() as i32,
         self.height.round() as i32)
    }

    /// Looks up the class label, falling back to `"Unknown"`.
    pub fn label<'a>(&self, names: &'a [String]) -> &'a str {
        names.get(self.class_id).map(String::as_str).unwrap_or("Unknown")
    }
}

/// Intersection over union of two boxes.
///
/// Returns `0.0` when either box is degenerate (zero width or height), so the
/// union can never be zero when this divides.
pub fn iou(a: &DetectBox, b: &DetectBox) -> f32 {
    if a.area() <= 0. || b.area() <= 0. {
        return 0.;
    }
    let union = a.union(b);
    if union <= 0. {
        return 0.;
    }
    a.intersect(b) / union
}
