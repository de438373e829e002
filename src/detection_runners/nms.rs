pub trait Nms {
    fn iou(&self, other: &Self) -> f32;
    fn confidence(&self) -> f32;
    fn class_id(&self) -> usize;
}

/// Class-aware greedy non-maximum suppression, in place.
///
/// Boxes are ordered by descending confidence (stable for ties) and a box is
/// dropped when its IoU with an already kept box of the same class exceeds
/// `iou_threshold`. Boxes of different classes never suppress each other.
/// Survivors stay in descending confidence order, which makes a second pass a
/// no-op.
pub fn nms<T: Nms>(boxes: &mut Vec<T>, iou_threshold: f32) {
    boxes.sort_by(|b1, b2| b2.confidence().total_cmp(&b1.confidence()));
    let mut current_index = 0;
    for index in 0..boxes.len() {
        let mut drop = false;
        for prev_index in 0..current_index {
            if boxes[prev_index].class_id() != boxes[index].class_id() {
                continue;
            }
            if boxes[prev_index].iou(&boxes[index]) > iou_threshold {
                drop = true;
                break;
            }
        }
        if !drop {
            boxes.swap(current_index, index);
            current_index += 1;
        }
    }
    boxes.truncate(current_index);
}
