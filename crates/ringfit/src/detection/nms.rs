//! Non-Maximum Averaging.
//!
//! An SSD emits many overlapping boxes for a single palm. [`NonMaxSuppression`] collapses every
//! group of overlapping boxes into one detection by averaging the group, weighted by confidence,
//! the way MediaPipe Hands does it.

use ringfit_image::{num::TotalF32, rect::Rect};

use crate::iter::zip_exact;

use super::{Detection, Keypoint};

/// A non-maximum suppression algorithm that averages overlapping detections.
#[derive(Debug, Default)]
pub struct NonMaxSuppression {
    group: Vec<Detection>,
}

impl NonMaxSuppression {
    /// The intersection-over-union threshold at which two detections are considered overlapping.
    pub const IOU_THRESH: f32 = 0.3;

    pub fn new() -> Self {
        Self::default()
    }

    /// Performs non-maximum averaging on `detections` in place.
    ///
    /// Afterwards, `detections` holds one entry per group of overlapping inputs, ordered by
    /// descending confidence of the group's best detection.
    pub fn process(&mut self, detections: &mut Vec<Detection>) {
        // Ascending order, so that `pop` yields the most confident remaining detection.
        detections.sort_unstable_by_key(|det| TotalF32(det.confidence));

        let mut remaining = std::mem::take(detections);
        while let Some(seed) = remaining.pop() {
            let seed_rect = seed.bounding_rect();

            self.group.clear();
            self.group.push(seed);
            let mut i = 0;
            while i < remaining.len() {
                if seed_rect.iou(&remaining[i].bounding_rect()) >= Self::IOU_THRESH {
                    // `remove` keeps the ascending order intact
                    self.group.push(remaining.remove(i));
                } else {
                    i += 1;
                }
            }

            detections.push(weighted_average(&self.group));
        }

        self.group.clear();
    }
}

/// Averages a group of detections, weighting each by its confidence.
///
/// Angles are averaged as unit vectors, so that angles on either side of ±π stay near ±π. The
/// result keeps the confidence of the first (most confident) detection in `group`.
fn weighted_average(group: &[Detection]) -> Detection {
    let first = &group[0];
    let mut keypoints = vec![Keypoint::new(0.0, 0.0); first.keypoints.len()];
    let (mut xc, mut yc, mut w, mut h) = (0.0, 0.0, 0.0, 0.0);
    let (mut sin, mut cos) = (0.0f32, 0.0f32);
    let mut divisor = 0.0;

    for det in group {
        let factor = det.confidence;
        divisor += factor;

        for (acc, kp) in zip_exact(&mut keypoints, &det.keypoints) {
            acc.x += kp.x * factor;
            acc.y += kp.y * factor;
        }

        let rect = det.bounding_rect();
        xc += rect.x_center() * factor;
        yc += rect.y_center() * factor;
        w += rect.width() * factor;
        h += rect.height() * factor;
        sin += det.angle.sin() * factor;
        cos += det.angle.cos() * factor;
    }

    for kp in &mut keypoints {
        kp.x /= divisor;
        kp.y /= divisor;
    }

    let rect = Rect::from_center(xc / divisor, yc / divisor, w / divisor, h / divisor);
    let mut merged = Detection::with_keypoints(first.confidence, rect, keypoints);
    merged.set_angle(sin.atan2(cos));
    merged
}
