//! Hand landmark oracles.
//!
//! An oracle turns a color image into zero or more [`Hand`]s. Work happens inside an
//! [`OracleSession`], which owns whatever the oracle needs while detecting (for [`OnnxOracle`],
//! the loaded networks). Sessions are released when dropped.

use std::path::PathBuf;

use image::RgbImage;
use ringfit_image::{rect::RotatedRect, Resolution};

use crate::{
    detection::{Detection, Detector},
    hand::{
        detection::{hand_region, PalmNetwork},
        landmark::{LandmarkNetwork, LandmarkResult},
        Hand,
    },
    landmark::{Estimator, Landmark, Landmarks},
};

/// A source of hand landmarks.
pub trait LandmarkOracle {
    type Session: OracleSession;

    /// Acquires the resources needed for detection.
    fn open(&self) -> anyhow::Result<Self::Session>;
}

/// An open detection session of a [`LandmarkOracle`].
///
/// Dropping the session releases its resources.
pub trait OracleSession {
    /// Detects all hands in `image`.
    ///
    /// Landmark coordinates of the returned hands are normalized by the image's width and height.
    fn detect(&mut self, image: &RgbImage) -> anyhow::Result<Vec<Hand>>;
}

/// Locations of the ONNX models used by [`OnnxOracle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelPaths {
    pub palm_detection: PathBuf,
    pub hand_landmark: PathBuf,
}

impl ModelPaths {
    pub const DEFAULT_PALM_DETECTION: &'static str = "3rdparty/onnx/palm_detection_full.onnx";
    pub const DEFAULT_HAND_LANDMARK: &'static str = "3rdparty/onnx/hand_landmark_full.onnx";
}

impl Default for ModelPaths {
    fn default() -> Self {
        Self {
            palm_detection: Self::DEFAULT_PALM_DETECTION.into(),
            hand_landmark: Self::DEFAULT_HAND_LANDMARK.into(),
        }
    }
}

/// A [`LandmarkOracle`] running MediaPipe's palm detection and hand landmark networks.
#[derive(Debug, Clone)]
pub struct OnnxOracle {
    models: ModelPaths,
    threshold: f32,
    presence_threshold: f32,
    max_hands: usize,
}

impl OnnxOracle {
    /// Default number of hands reported per image.
    pub const DEFAULT_MAX_HANDS: usize = 2;

    /// Default minimum hand presence score of the landmark network.
    pub const DEFAULT_PRESENCE_THRESHOLD: f32 = 0.5;

    pub fn new(models: ModelPaths) -> Self {
        Self {
            models,
            threshold: Detector::DEFAULT_THRESHOLD,
            presence_threshold: Self::DEFAULT_PRESENCE_THRESHOLD,
            max_hands: Self::DEFAULT_MAX_HANDS,
        }
    }

    /// Sets the minimum palm detection confidence.
    ///
    /// By default, [`Detector::DEFAULT_THRESHOLD`] is used.
    pub fn set_threshold(&mut self, threshold: f32) {
        self.threshold = threshold;
    }

    /// Sets the minimum presence score for a hand to be reported.
    pub fn set_presence_threshold(&mut self, threshold: f32) {
        self.presence_threshold = threshold;
    }

    /// Sets the maximum number of hands reported per image.
    ///
    /// The most confident palm detections are kept.
    pub fn set_max_hands(&mut self, max_hands: usize) {
        self.max_hands = max_hands;
    }
}

impl Default for OnnxOracle {
    fn default() -> Self {
        Self::new(ModelPaths::default())
    }
}

impl LandmarkOracle for OnnxOracle {
    type Session = OnnxSession;

    fn open(&self) -> anyhow::Result<OnnxSession> {
        log::debug!(
            "loading hand models from '{}' and '{}'",
            self.models.palm_detection.display(),
            self.models.hand_landmark.display(),
        );

        let mut detector = Detector::new(PalmNetwork::load(&self.models.palm_detection)?);
        detector.set_threshold(self.threshold);
        let estimator = Estimator::new(LandmarkNetwork::load(&self.models.hand_landmark)?);

        Ok(OnnxSession {
            detector,
            estimator,
            presence_threshold: self.presence_threshold,
            max_hands: self.max_hands,
        })
    }
}

/// A session of [`OnnxOracle`], holding the loaded networks.
pub struct OnnxSession {
    detector: Detector,
    estimator: Estimator<LandmarkResult>,
    presence_threshold: f32,
    max_hands: usize,
}

impl OracleSession for OnnxSession {
    fn detect(&mut self, image: &RgbImage) -> anyhow::Result<Vec<Hand>> {
        let res = Resolution::of(image);
        let palms = self.detector.detect(image)?;
        log::debug!("{} palm detection(s) in {} image", palms.len(), res);

        let estimator = &mut self.estimator;
        select_hands(
            palms,
            res,
            self.max_hands,
            self.presence_threshold,
            |roi| estimator.estimate(image, roi).map(|result| result.clone()),
        )
    }
}

/// Estimates landmarks for the `max_hands` first `palms` and keeps the hands that are present.
///
/// `estimate` runs the landmark network on a hand region and returns pixel coordinates of `res`.
fn select_hands(
    palms: &[Detection],
    res: Resolution,
    max_hands: usize,
    presence_threshold: f32,
    mut estimate: impl FnMut(RotatedRect) -> anyhow::Result<LandmarkResult>,
) -> anyhow::Result<Vec<Hand>> {
    let mut hands = Vec::new();
    for palm in palms.iter().take(max_hands) {
        let roi = hand_region(palm);
        let result = estimate(roi)?;
        if result.presence() < presence_threshold {
            log::debug!(
                "dropping hand at {:?}: presence {:.2}",
                roi.rect(),
                result.presence()
            );
            continue;
        }

        hands.push(normalize(&result, res));
    }

    Ok(hands)
}

impl Drop for OnnxSession {
    fn drop(&mut self) {
        let timers = self
            .detector
            .timers()
            .chain(self.estimator.timers())
            .map(|t| t.to_string())
            .collect::<Vec<_>>();
        log::debug!("releasing hand models ({})", timers.join(", "));
    }
}

/// Converts pixel-space landmarks into a [`Hand`] with coordinates normalized to `res`.
fn normalize(result: &LandmarkResult, res: Resolution) -> Hand {
    let (w, h) = (res.width() as f32, res.height() as f32);
    let mut landmarks = Landmarks::new(result.landmarks().len());
    for (i, lm) in result.landmarks().iter().enumerate() {
        landmarks.set(i, Landmark::new([lm.x() / w, lm.y() / h, lm.z() / w]));
    }
    Hand::new(landmarks, result.presence(), result.handedness())
}
