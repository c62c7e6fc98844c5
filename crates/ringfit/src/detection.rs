//! Common functionality for object detection.
//!
//! The palm detector is built from the pieces in this module: a [`Network`] that decodes raw
//! outputs into [`Detection`]s, [`ssd`] anchors, and [`nms`] to merge duplicate detections.

pub mod nms;
pub mod ssd;

use anyhow::Context;
use image::RgbImage;
use ringfit_image::{rect::Rect, Resolution};

use crate::nn::{Cnn, Outputs};
use crate::timer::Timer;

use self::nms::NonMaxSuppression;

/// Trait implemented by neural networks that detect objects in an input image.
pub trait Network: Send + Sync + 'static {
    /// Returns the [`Cnn`] to use for detection.
    fn cnn(&self) -> &Cnn;

    /// Extracts all detections with confidence at or above `threshold` from the network's output.
    ///
    /// Keypoint and detection positions are expected to be in the coordinate system of the
    /// network's input.
    fn extract(
        &self,
        outputs: &Outputs,
        threshold: f32,
        detections: &mut Vec<Detection>,
    ) -> anyhow::Result<()>;
}

/// A generic object detector.
///
/// This type wraps a [`Network`] for object detection.
pub struct Detector {
    network: Box<dyn Network>,
    detections: Vec<Detection>,
    t_infer: Timer,
    t_extract: Timer,
    t_nms: Timer,
    thresh: f32,
    nms: NonMaxSuppression,
}

impl Detector {
    pub const DEFAULT_THRESHOLD: f32 = 0.5;

    pub fn new<N: Network>(network: N) -> Self {
        Self {
            network: Box::new(network),
            detections: Vec::new(),
            t_infer: Timer::new("infer"),
            t_extract: Timer::new("extract"),
            t_nms: Timer::new("nms"),
            thresh: Self::DEFAULT_THRESHOLD,
            nms: NonMaxSuppression::new(),
        }
    }

    /// Sets the minimum confidence of reported detections.
    ///
    /// By default, [`Self::DEFAULT_THRESHOLD`] is used.
    #[inline]
    pub fn set_threshold(&mut self, thresh: f32) {
        self.thresh = thresh;
    }

    /// Runs the detector on `image`.
    ///
    /// The returned detections use the pixel coordinates of `image` and are ordered by descending
    /// confidence.
    pub fn detect(&mut self, image: &RgbImage) -> anyhow::Result<&[Detection]> {
        self.detections.clear();

        let cnn = self.network.cnn();
        let input_res = cnn.input_resolution();
        let rect = letterbox(Resolution::of(image), input_res)?;
        let outputs = self.t_infer.time(|| cnn.estimate(image, rect.into()))?;
        log::trace!("inference result: {:?}", outputs);

        self.t_extract.time(|| {
            self.network
                .extract(&outputs, self.thresh, &mut self.detections)
        })?;
        self.t_nms.time(|| self.nms.process(&mut self.detections));

        map_to_image(&mut self.detections, rect, input_res);

        Ok(&self.detections)
    }

    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract, &self.t_nms].into_iter()
    }
}

/// Computes the region of an image of size `image` that is fed to a network expecting `input`.
///
/// The region is the whole image, padded symmetrically with black bars to the network's aspect
/// ratio, so its top left corner may lie at negative coordinates.
fn letterbox(image: Resolution, input: Resolution) -> anyhow::Result<Rect> {
    let aspect = input
        .aspect_ratio()
        .context("detector network has a zero-sized input")?;
    Ok(image.rect().grow_to_fit_aspect(aspect))
}

/// Moves `detections` from network input coordinates into the image the `letterbox` was taken
/// from.
fn map_to_image(detections: &mut [Detection], letterbox: Rect, input: Resolution) {
    let scale = letterbox.width() / input.width() as f32;
    for det in detections {
        det.map_positions(
            |[x, y]| [x * scale + letterbox.x(), y * scale + letterbox.y()],
            scale,
        );
    }
}

/// A detected object.
///
/// A [`Detection`] consists of a [`Rect`] enclosing the detected object, a confidence value, an
/// optional rotation angle of the object, and a possibly empty set of located keypoints.
///
/// The confidence value lies between 0.0 and 1.0 (raw network scores are passed through
/// [`ringfit_image::num::sigmoid`]). It is used as the weight when [`nms`] averages overlapping
/// detections.
#[derive(Debug, Clone, PartialEq)]
pub struct Detection {
    confidence: f32,
    angle: f32,
    rect: Rect,
    keypoints: Vec<Keypoint>,
}

impl Detection {
    pub fn new(confidence: f32, rect: Rect) -> Self {
        Self::with_keypoints(confidence, rect, Vec::new())
    }

    pub fn with_keypoints(confidence: f32, rect: Rect, keypoints: Vec<Keypoint>) -> Self {
        Self {
            confidence,
            angle: 0.0,
            rect,
            keypoints,
        }
    }

    pub fn confidence(&self) -> f32 {
        self.confidence
    }

    /// Returns the angle of the detected object, in radians, clockwise.
    ///
    /// Networks that don't estimate a rotation leave this at 0.0.
    pub fn angle(&self) -> f32 {
        self.angle
    }

    /// Sets the angle of the detected object, in radians, clockwise.
    pub fn set_angle(&mut self, angle: f32) {
        self.angle = angle;
    }

    /// Returns the axis-aligned bounding rectangle containing the detected object.
    pub fn bounding_rect(&self) -> Rect {
        self.rect
    }

    pub fn keypoints(&self) -> &[Keypoint] {
        &self.keypoints
    }

    /// Moves the detection into another coordinate system.
    ///
    /// `f` maps positions, `scale` is the accompanying change in size.
    fn map_positions(&mut self, f: impl Fn([f32; 2]) -> [f32; 2], scale: f32) {
        let [xc, yc] = f([self.rect.x_center(), self.rect.y_center()]);
        self.rect = Rect::from_center(
            xc,
            yc,
            self.rect.width() * scale,
            self.rect.height() * scale,
        );
        for kp in &mut self.keypoints {
            [kp.x, kp.y] = f([kp.x, kp.y]);
        }
    }
}

/// A 2D keypoint produced as part of a [`Detection`].
///
/// The meaning of a keypoint depends on the detector and on its index in the keypoint list. The
/// palm detector uses them to orient the hand region (see [`crate::hand::detection::Keypoint`]).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Keypoint {
    x: f32,
    y: f32,
}

impl Keypoint {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn x(&self) -> f32 {
        self.x
    }

    pub fn y(&self) -> f32 {
        self.y
    }
}
