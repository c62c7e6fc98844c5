//! Hand landmark prediction.

use std::path::Path;

use anyhow::{ensure, Context};

use crate::{
    iter::zip_exact,
    landmark::{Estimate, Landmarks, Network},
    nn::{Cnn, ColorMapper, NeuralNetwork, Outputs},
};

/// Number of landmarks estimated per hand.
pub const NUM_LANDMARKS: usize = 21;

/// Landmark results estimated by [`LandmarkNetwork`].
#[derive(Debug, Clone)]
pub struct LandmarkResult {
    landmarks: Landmarks,
    presence: f32,
    raw_handedness: f32,
}

impl Default for LandmarkResult {
    fn default() -> Self {
        LandmarkResult {
            landmarks: Landmarks::new(NUM_LANDMARKS),
            presence: 0.0,
            raw_handedness: 0.0,
        }
    }
}

impl LandmarkResult {
    #[cfg(test)]
    pub(crate) fn new(landmarks: Landmarks, presence: f32, raw_handedness: f32) -> Self {
        Self {
            landmarks,
            presence,
            raw_handedness,
        }
    }

    /// Returns the landmarks, in the coordinate system of the image passed to the estimator.
    pub fn landmarks(&self) -> &Landmarks {
        &self.landmarks
    }

    /// Returns the network's confidence that a hand is present in the region.
    pub fn presence(&self) -> f32 {
        self.presence
    }

    /// Returns the estimated handedness of the hand in the image.
    ///
    /// This assumes that the image is passed in as-is (not mirrored), and should only be relied on
    /// when the presence is over some threshold.
    pub fn handedness(&self) -> Handedness {
        if self.raw_handedness > 0.5 {
            Handedness::Right
        } else {
            Handedness::Left
        }
    }
}

impl Estimate for LandmarkResult {
    #[inline]
    fn landmarks_mut(&mut self) -> &mut Landmarks {
        &mut self.landmarks
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handedness {
    Left,
    Right,
}

/// Names for the hand pose landmarks.
///
/// # Terminology
///
/// - **CMC**: [Carpometacarpal joint], the lowest joint of the thumb, located near the wrist.
/// - **MCP**: [Metacarpophalangeal joint], the lower joint forming the knuckles near the palm of
///   the hand.
/// - **PIP**: Proximal Interphalangeal joint, the joint between the MCP and DIP.
/// - **DIP**: Distal Interphalangeal joint, the highest joint of a finger.
/// - **Tip**: This landmark is just placed on the tip of the finger, above the DIP.
///
/// [Carpometacarpal joint]: https://en.wikipedia.org/wiki/Carpometacarpal_joint
/// [Metacarpophalangeal joint]: https://en.wikipedia.org/wiki/Metacarpophalangeal_joint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HandLandmark {
    Wrist,
    ThumbCmc,
    ThumbMcp,
    ThumbIp,
    ThumbTip,
    IndexFingerMcp,
    IndexFingerPip,
    IndexFingerDip,
    IndexFingerTip,
    MiddleFingerMcp,
    MiddleFingerPip,
    MiddleFingerDip,
    MiddleFingerTip,
    RingFingerMcp,
    RingFingerPip,
    RingFingerDip,
    RingFingerTip,
    PinkyMcp,
    PinkyPip,
    PinkyDip,
    PinkyTip,
}

impl HandLandmark {
    /// Returns the landmark's index in the network output.
    #[inline]
    pub fn index(self) -> usize {
        self as usize
    }
}

/// The full hand landmark estimation network.
pub struct LandmarkNetwork {
    cnn: Cnn,
}

impl LandmarkNetwork {
    /// Loads the network from an ONNX file.
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let nn = NeuralNetwork::from_path(path)?
            .load()
            .with_context(|| format!("failed to load hand landmark model '{}'", path.display()))?;
        let cnn = Cnn::new(nn, ColorMapper::linear(0.0..=1.0))?;
        Ok(Self { cnn })
    }
}

impl Network for LandmarkNetwork {
    type Output = LandmarkResult;

    fn cnn(&self) -> &Cnn {
        &self.cnn
    }

    fn extract(&self, outputs: &Outputs, estimate: &mut LandmarkResult) -> anyhow::Result<()> {
        extract(outputs, estimate)
    }
}

fn extract(outputs: &Outputs, estimate: &mut LandmarkResult) -> anyhow::Result<()> {
    ensure!(
        outputs.len() >= 3,
        "hand landmark network produced {} outputs, expected at least 3",
        outputs.len()
    );

    // The 4th output holds metric world landmarks, which are not needed here.
    let screen_landmarks = &outputs[0];
    let presence_flag = &outputs[1];
    let handedness = &outputs[2];

    ensure!(
        screen_landmarks.len() == NUM_LANDMARKS * 3,
        "unexpected hand landmark tensor shape {:?}",
        screen_landmarks.shape()
    );
    ensure!(
        presence_flag.len() == 1 && handedness.len() == 1,
        "unexpected hand presence/handedness tensor shapes {:?}/{:?}",
        presence_flag.shape(),
        handedness.shape()
    );

    estimate.presence = presence_flag.iter().next().copied().unwrap_or(0.0);
    estimate.raw_handedness = handedness.iter().next().copied().unwrap_or(0.0);

    let coords = screen_landmarks.iter().copied().collect::<Vec<_>>();
    for (xyz, out) in zip_exact(
        coords.chunks_exact(3),
        estimate.landmarks.positions_mut(),
    ) {
        out.copy_from_slice(xyz);
    }

    Ok(())
}
