//! Ring fitting, from input files to output file.

use std::path::Path;

use image::{io::Reader, DynamicImage, RgbImage};
use ringfit_image::Resolution;

use crate::{
    anchor::hand_anchor, error::RingFitError, locator::Locator, oracle::LandmarkOracle,
    sprite::Sprite,
};

/// Places `sprite` on every hand the `locator` finds in `background`.
///
/// Returns the number of rings placed. If a ring does not fit into the image, this fails with
/// [`RingFitError::Placement`]; rings placed for earlier hands stay in `background`.
pub fn composite_rings<O: LandmarkOracle>(
    locator: &Locator<O>,
    background: &mut RgbImage,
    sprite: &Sprite,
) -> anyhow::Result<usize> {
    let res = Resolution::of(background);
    let hands = locator.locate(background)?;

    for (i, hand) in hands.iter().enumerate() {
        let anchor = hand_anchor(hand, res);
        log::debug!(
            "hand {}: mcp={:?} pip={:?} mid_y={} -> ring at {:?}",
            i,
            anchor.mcp,
            anchor.pip,
            anchor.mid_y,
            anchor.origin,
        );

        let (x, y) = anchor.origin;
        sprite
            .composite_onto(background, x, y)
            .map_err(RingFitError::from)?;
    }

    Ok(hands.len())
}

/// Reads the hand photo and ring sprite, places the rings, and writes the result.
///
/// The output format is chosen by the extension of `output`. Returns the number of rings placed.
pub fn process_files<O: LandmarkOracle>(
    locator: &Locator<O>,
    hand: &Path,
    ring: &Path,
    output: &Path,
) -> anyhow::Result<usize> {
    let mut background = read_image(hand)?.to_rgb8();
    let sprite = Sprite::open(ring)?;
    log::debug!(
        "hand image {}, ring resized to {}",
        Resolution::of(&background),
        sprite.resolution(),
    );

    let placed = composite_rings(locator, &mut background, &sprite)?;

    background
        .save(output)
        .map_err(|source| RingFitError::WriteImage {
            path: output.into(),
            source,
        })?;
    log::info!("placed {} ring(s), wrote '{}'", placed, output.display());

    Ok(placed)
}

/// Decodes the image at `path`, detecting its format from the file contents.
///
/// The file extension is only used when the contents match no known format.
pub fn read_image(path: &Path) -> Result<DynamicImage, RingFitError> {
    let decode = || -> image::ImageResult<DynamicImage> {
        Reader::open(path)?.with_guessed_format()?.decode()
    };
    decode().map_err(|source| RingFitError::ReadImage {
        path: path.into(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use image::{Rgb, Rgba, RgbaImage};

    use crate::{
        hand::{Hand, HandLandmark},
        test::{FailingOracle, StubOracle},
    };

    use super::*;

    fn opaque_sprite() -> Sprite {
        Sprite::from_rgba(&RgbaImage::from_pixel(10, 10, Rgba([255, 0, 0, 255])))
    }

    fn hand_at(mcp: [f32; 2], pip: [f32; 2]) -> Hand {
        Hand::from_points([
            (HandLandmark::MiddleFingerMcp, mcp),
            (HandLandmark::MiddleFingerPip, pip),
        ])
    }

    #[test]
    fn places_ring_at_anchor() {
        let locator = Locator::new(StubOracle::new(vec![hand_at([0.5, 0.4], [0.5, 0.5])]));
        let mut background = RgbImage::from_pixel(640, 480, Rgb([0, 0, 255]));

        let placed = composite_rings(&locator, &mut background, &opaque_sprite()).unwrap();
        assert_eq!(placed, 1);

        // ring covers x in 290..390, y in 206..296
        assert_eq!(*background.get_pixel(290, 206), Rgb([255, 0, 0]));
        assert_eq!(*background.get_pixel(389, 295), Rgb([255, 0, 0]));
        assert_eq!(*background.get_pixel(289, 206), Rgb([0, 0, 255]));
        assert_eq!(*background.get_pixel(390, 295), Rgb([0, 0, 255]));
        assert_eq!(*background.get_pixel(290, 296), Rgb([0, 0, 255]));
    }

    #[test]
    fn no_hands_leaves_image_alone() {
        let locator = Locator::new(StubOracle::new(Vec::new()));
        let original = RgbImage::from_fn(64, 48, |x, y| Rgb([x as u8, y as u8, 7]));
        let mut background = original.clone();

        let placed = composite_rings(&locator, &mut background, &opaque_sprite()).unwrap();
        assert_eq!(placed, 0);
        assert_eq!(background, original);
    }

    #[test]
    fn ring_off_the_edge_fails() {
        // MCP near the left border puts the ring at negative X
        let locator = Locator::new(StubOracle::new(vec![hand_at([0.01, 0.5], [0.01, 0.6])]));
        let original = RgbImage::new(200, 200);
        let mut background = original.clone();

        let err = composite_rings(&locator, &mut background, &opaque_sprite()).unwrap_err();
        assert!(matches!(
            err.downcast_ref::<RingFitError>(),
            Some(RingFitError::Placement(_))
        ));
        assert_eq!(background, original);
    }

    #[test]
    fn detection_errors_propagate() {
        let locator = Locator::new(FailingOracle::default());
        let mut background = RgbImage::new(8, 8);
        assert!(composite_rings(&locator, &mut background, &opaque_sprite()).is_err());
    }

    #[test]
    fn missing_hand_image_fails_fast() {
        let oracle = StubOracle::new(Vec::new());
        let locator = Locator::new(oracle.clone());
        let err = process_files(
            &locator,
            Path::new("no/such/hand.jpg"),
            Path::new("no/such/ring.png"),
            Path::new("out.png"),
        )
        .unwrap_err();

        match err.downcast_ref::<RingFitError>() {
            Some(RingFitError::ReadImage { path, .. }) => {
                assert_eq!(path, Path::new("no/such/hand.jpg"))
            }
            other => panic!("unexpected error {:?}", other),
        }
        assert_eq!(oracle.opened(), 0);
    }
}
