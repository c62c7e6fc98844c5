//! Landmark locator.

use image::RgbImage;
use ringfit_image::Resolution;

use crate::{
    hand::Hand,
    oracle::{LandmarkOracle, OracleSession},
};

/// Finds hands in an image using a [`LandmarkOracle`].
///
/// Every call to [`Locator::locate`] is independent: it opens a fresh oracle session, runs one
/// detection and releases the session again, whether or not detection succeeded.
#[derive(Debug, Clone, Default)]
pub struct Locator<O> {
    oracle: O,
}

impl<O: LandmarkOracle> Locator<O> {
    pub fn new(oracle: O) -> Self {
        Self { oracle }
    }

    /// Returns the hands found in `image`, possibly none.
    pub fn locate(&self, image: &RgbImage) -> anyhow::Result<Vec<Hand>> {
        let mut session = self.oracle.open()?;
        let hands = session.detect(image)?;
        log::debug!(
            "located {} hand(s) in {} image",
            hands.len(),
            Resolution::of(image)
        );
        Ok(hands)
    }
}

#[cfg(test)]
mod tests {
    use crate::{
        hand::HandLandmark,
        test::{FailingOracle, StubOracle},
    };

    use super::*;

    #[test]
    fn returns_oracle_hands() {
        let hand = Hand::from_points([(HandLandmark::MiddleFingerMcp, [0.25, 0.75])]);
        let oracle = StubOracle::new(vec![hand.clone()]);
        let locator = Locator::new(oracle.clone());

        let hands = locator.locate(&RgbImage::new(8, 8)).unwrap();
        assert_eq!(hands, vec![hand]);
        assert_eq!(oracle.opened(), 1);
        assert_eq!(oracle.released(), 1);
    }

    #[test]
    fn releases_session_per_call() {
        let oracle = StubOracle::new(Vec::new());
        let locator = Locator::new(oracle.clone());

        for _ in 0..3 {
            assert!(locator.locate(&RgbImage::new(4, 4)).unwrap().is_empty());
        }
        assert_eq!(oracle.opened(), 3);
        assert_eq!(oracle.released(), 3);
    }

    #[test]
    fn releases_session_on_error() {
        let oracle = FailingOracle::default();
        let locator = Locator::new(oracle.clone());

        let err = locator.locate(&RgbImage::new(4, 4)).unwrap_err();
        assert!(err.to_string().contains("detection failed"));
        assert_eq!(oracle.opened(), 1);
        assert_eq!(oracle.released(), 1);
    }
}
