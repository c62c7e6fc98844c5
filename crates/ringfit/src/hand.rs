//! Hand detection and landmark estimation.
//!
//! Hands are found in two stages, like MediaPipe Hands does it: [`detection`] locates palms in the
//! whole image, then [`landmark`] estimates 21 joint positions inside a rotated region around
//! each palm.

pub mod detection;
pub mod landmark;

use crate::landmark::{Landmark, Landmarks};

pub use self::landmark::{HandLandmark, Handedness, NUM_LANDMARKS};

/// The landmarks of one detected hand.
///
/// Landmark X and Y coordinates are normalized to `[0, 1]` by the width and height of the image
/// the hand was found in.
#[derive(Debug, Clone, PartialEq)]
pub struct Hand {
    landmarks: Landmarks,
    presence: f32,
    handedness: Handedness,
}

impl Hand {
    /// Creates a hand from normalized `landmarks`.
    ///
    /// # Panics
    ///
    /// Panics if `landmarks` does not contain exactly [`NUM_LANDMARKS`] entries.
    pub fn new(landmarks: Landmarks, presence: f32, handedness: Handedness) -> Self {
        assert_eq!(
            landmarks.len(),
            NUM_LANDMARKS,
            "a hand has {} landmarks",
            NUM_LANDMARKS
        );
        Self {
            landmarks,
            presence,
            handedness,
        }
    }

    /// Creates a fully present right hand with the given normalized landmark positions.
    ///
    /// Landmarks that are not listed are placed at the origin.
    pub fn from_points<I>(points: I) -> Self
    where
        I: IntoIterator<Item = (HandLandmark, [f32; 2])>,
    {
        let mut landmarks = Landmarks::new(NUM_LANDMARKS);
        for (lm, [x, y]) in points {
            landmarks.set(lm.index(), Landmark::new([x, y, 0.0]));
        }
        Self::new(landmarks, 1.0, Handedness::Right)
    }

    /// Returns the position of a named landmark.
    pub fn landmark(&self, lm: HandLandmark) -> Landmark {
        self.landmarks.get(lm.index())
    }

    pub fn landmarks(&self) -> &Landmarks {
        &self.landmarks
    }

    /// Returns the landmark network's confidence that this is a hand.
    pub fn presence(&self) -> f32 {
        self.presence
    }

    pub fn handedness(&self) -> Handedness {
        self.handedness
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn named_points() {
        let hand = Hand::from_points([
            (HandLandmark::MiddleFingerMcp, [0.5, 0.4]),
            (HandLandmark::MiddleFingerPip, [0.5, 0.5]),
        ]);

        let mcp = hand.landmark(HandLandmark::MiddleFingerMcp);
        assert_eq!((mcp.x(), mcp.y()), (0.5, 0.4));
        let pip = hand.landmark(HandLandmark::MiddleFingerPip);
        assert_eq!((pip.x(), pip.y()), (0.5, 0.5));
        assert_eq!(hand.landmark(HandLandmark::Wrist), Landmark::default());
        assert_eq!(hand.landmarks().len(), NUM_LANDMARKS);
    }

    #[test]
    #[should_panic(expected = "landmarks")]
    fn rejects_wrong_landmark_count() {
        Hand::new(Landmarks::new(5), 1.0, Handedness::Left);
    }
}
