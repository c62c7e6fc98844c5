//! Palm detection.

use std::path::Path;

use anyhow::{ensure, Context};
use nalgebra::{Point2, Rotation2, Vector2};
use ndarray::{s, Ix3};
use ringfit_image::{
    num::sigmoid,
    rect::{Rect, RotatedRect},
    Resolution,
};

use crate::{
    detection::{
        self,
        ssd::{Anchor, Anchors, LayerInfo},
        Detection, Network,
    },
    nn::{Cnn, ColorMapper, NeuralNetwork, Outputs},
};

/// A keypoint of a palm [`Detection`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Keypoint {
    Wrist = 0,
    IndexFingerMcp = 1,
    MiddleFingerMcp = 2,
    RingFingerMcp = 3,
    PinkyMcp = 4,
    ThumbCmc = 5,
    ThumbMcp = 6,
}

const NUM_KEYPOINTS: usize = 7;
const BOX_PARAMS: usize = 4 + NUM_KEYPOINTS * 2;

/// Output layers of the palm network: 24x24 cells with 2 anchors, 12x12 cells with 6 anchors.
const LAYERS: &[LayerInfo] = &[LayerInfo::new(2, 24, 24), LayerInfo::new(6, 12, 12)];

/// Palm size multiplier used to derive the hand region.
pub const ROI_SCALE: f32 = 2.6;

/// Shift of the hand region along the palm's axis, relative to the palm height.
///
/// Negative values move the region towards the fingers.
pub const ROI_SHIFT_Y: f32 = -0.5;

/// The full-range palm detection network.
pub struct PalmNetwork {
    cnn: Cnn,
    anchors: Anchors,
}

impl PalmNetwork {
    /// Loads the network from an ONNX file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let nn = NeuralNetwork::from_path(path)?
            .load()
            .with_context(|| format!("failed to load palm detection model '{}'", path.display()))?;
        let cnn = Cnn::new(nn, ColorMapper::linear(0.0..=1.0))?;
        Ok(Self {
            cnn,
            anchors: Anchors::calculate(LAYERS),
        })
    }
}

impl Network for PalmNetwork {
    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(
        &self,
        outputs: &Outputs,
        threshold: f32,
        detections: &mut Vec<Detection>,
    ) -> anyhow::Result<()> {
        extract_outputs(
            &self.anchors,
            self.cnn.input_resolution(),
            outputs,
            threshold,
            detections,
        )
    }
}

fn extract_outputs(
    anchors: &Anchors,
    input_res: Resolution,
    outputs: &Outputs,
    thresh: f32,
    detections: &mut Vec<Detection>,
) -> anyhow::Result<()> {
    ensure!(
        outputs.len() >= 2,
        "palm network produced {} outputs, expected 2",
        outputs.len()
    );

    let num_anchors = anchors.anchor_count();
    let boxes = outputs[0].view().into_dimensionality::<Ix3>()?;
    let confidences = outputs[1].view().into_dimensionality::<Ix3>()?;
    ensure!(
        boxes.shape() == [1, num_anchors, BOX_PARAMS],
        "unexpected palm box tensor shape {:?}",
        boxes.shape()
    );
    ensure!(
        confidences.shape() == [1, num_anchors, 1],
        "unexpected palm score tensor shape {:?}",
        confidences.shape()
    );

    for (index, &raw) in confidences.slice(s![0, .., 0]).iter().enumerate() {
        let conf = sigmoid(raw);
        if conf < thresh {
            continue;
        }

        let box_params = boxes.slice(s![0, index, ..]).to_vec();
        detections.push(extract_detection(
            &anchors[index],
            input_res,
            &box_params,
            conf,
        ));
    }

    Ok(())
}

fn extract_detection(
    anchor: &Anchor,
    input_res: Resolution,
    box_params: &[f32],
    confidence: f32,
) -> Detection {
    let input_w = input_res.width() as f32;
    let input_h = input_res.height() as f32;
    let anchor_x = anchor.x_center() * input_w;
    let anchor_y = anchor.y_center() * input_h;

    let rect = Rect::from_center(
        box_params[0] + anchor_x,
        box_params[1] + anchor_y,
        box_params[2],
        box_params[3],
    );
    let keypoints = box_params[4..]
        .chunks_exact(2)
        .map(|kp| detection::Keypoint::new(kp[0] + anchor_x, kp[1] + anchor_y))
        .collect();

    let mut det = Detection::with_keypoints(confidence, rect, keypoints);
    det.set_angle(palm_angle(&det));
    det
}

/// Computes the clockwise rotation of a palm compared to an upright position.
///
/// A rotation of 0 means that the fingers point up (towards -Y).
fn palm_angle(det: &Detection) -> f32 {
    let kp = det.keypoints()[Keypoint::MiddleFingerMcp as usize];
    let finger = Point2::new(kp.x(), kp.y());
    let kp = det.keypoints()[Keypoint::Wrist as usize];
    let wrist = Point2::new(kp.x(), kp.y());

    let rel = wrist - finger;
    Rotation2::rotation_between(&Vector2::y(), &rel).angle()
}

/// Derives the rotated region containing the whole hand from a palm detection.
///
/// The palm box is shifted towards the fingers by [`ROI_SHIFT_Y`] palm heights, squared to its
/// longer side, and scaled by [`ROI_SCALE`].
pub fn hand_region(palm: &Detection) -> RotatedRect {
    let rect = palm.bounding_rect();
    let angle = palm.angle();

    let shift = Rotation2::new(angle) * Vector2::new(0.0, ROI_SHIFT_Y * rect.height());
    let center = rect.center() + shift;
    let side = rect.width().max(rect.height()) * ROI_SCALE;

    RotatedRect::new(Rect::from_center(center.x, center.y, side, side), angle)
}
