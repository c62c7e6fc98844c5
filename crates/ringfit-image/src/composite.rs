//! Alpha compositing of an overlay onto a background image.
//!
//! The overlay is given as separate color planes ([`RgbImage`]) and a single-channel alpha mask
//! ([`GrayImage`]) of the same size. Blending uses the "over" operator per channel:
//!
//! ```text
//! result = alpha * overlay + (1 - alpha) * background
//! ```
//!
//! with `alpha = mask / 255`, truncated back to 8 bits. The mask is shared across the 3 color
//! channels. A background alpha channel, if present, is left untouched.

use image::{GrayImage, ImageBuffer, Pixel, RgbImage};
use ndarray::{s, ArrayView2, ArrayView3, ArrayViewMut3, Axis, Zip};

use crate::Resolution;

/// Errors returned by [`composite`].
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum CompositeError {
    #[error("overlay position is out of bounds: {placement:?} does not fit into {background}")]
    OutOfBounds {
        placement: Placement,
        background: Resolution,
    },
    #[error("alpha mask is {mask} but overlay is {overlay}")]
    MaskMismatch {
        overlay: Resolution,
        mask: Resolution,
    },
    #[error("background must have at least 3 color channels, it has {channels}")]
    TooFewChannels { channels: u8 },
}

/// A rectangle in background pixel coordinates that an overlay is placed into.
///
/// The origin is signed: placements computed from landmarks near the image border can end up at
/// negative coordinates, which [`Placement::check_within`] rejects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Placement {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl Placement {
    pub fn new(x: i64, y: i64, size: Resolution) -> Self {
        Self {
            x,
            y,
            width: size.width(),
            height: size.height(),
        }
    }

    /// Checks that the placement lies fully inside a background of resolution `background`.
    ///
    /// Returns the non-negative top-left corner on success.
    pub fn check_within(&self, background: Resolution) -> Result<(usize, usize), CompositeError> {
        let fits = self.x >= 0
            && self.y >= 0
            && self.x + i64::from(self.width) <= i64::from(background.width())
            && self.y + i64::from(self.height) <= i64::from(background.height());
        if !fits {
            return Err(CompositeError::OutOfBounds {
                placement: *self,
                background,
            });
        }

        Ok((self.x as usize, self.y as usize))
    }
}

/// Blends `overlay` onto `background` with its top left corner at `(x, y)`, weighting every pixel
/// by `alpha_mask`.
///
/// `background` is modified in place. If the overlay does not fit entirely inside the background,
/// or if the mask and overlay sizes differ, an error is returned and `background` is not touched.
pub fn composite<P>(
    background: &mut ImageBuffer<P, Vec<u8>>,
    overlay: &RgbImage,
    x: i64,
    y: i64,
    alpha_mask: &GrayImage,
) -> Result<(), CompositeError>
where
    P: Pixel<Subpixel = u8>,
{
    let overlay_res = Resolution::of(overlay);
    let mask_res = Resolution::of(alpha_mask);
    if overlay_res != mask_res {
        return Err(CompositeError::MaskMismatch {
            overlay: overlay_res,
            mask: mask_res,
        });
    }

    let channels = P::CHANNEL_COUNT;
    if channels < 3 {
        return Err(CompositeError::TooFewChannels { channels });
    }

    let bg_res = Resolution::of(background);
    let (x, y) = Placement::new(x, y, overlay_res).check_within(bg_res)?;
    let (w, h) = (overlay_res.width() as usize, overlay_res.height() as usize);

    let mut bg = as_array_mut(background, bg_res, usize::from(channels));
    let fg = ArrayView3::from_shape((h, w, 3), &overlay.as_raw()[..h * w * 3])
        .expect("overlay buffer matches its dimensions");
    let mask = ArrayView2::from_shape((h, w), &alpha_mask.as_raw()[..h * w])
        .expect("mask buffer matches its dimensions");

    let alpha = mask.mapv(|a| f64::from(a) / 255.0).insert_axis(Axis(2));
    let roi = bg.slice_mut(s![y..y + h, x..x + w, ..3]);
    Zip::from(roi)
        .and(&fg)
        .and_broadcast(&alpha)
        .for_each(|bg, &fg, &a| {
            *bg = (a * f64::from(fg) + (1.0 - a) * f64::from(*bg)) as u8;
        });

    log::trace!("composited {} overlay at ({}, {})", overlay_res, x, y);
    Ok(())
}

fn as_array_mut<P>(
    image: &mut ImageBuffer<P, Vec<u8>>,
    res: Resolution,
    channels: usize,
) -> ArrayViewMut3<'_, u8>
where
    P: Pixel<Subpixel = u8>,
{
    let (w, h) = (res.width() as usize, res.height() as usize);
    let raw: &mut [u8] = &mut **image;
    ArrayViewMut3::from_shape((h, w, channels), &mut raw[..h * w * channels])
        .expect("image buffer matches its dimensions")
}

#[cfg(test)]
mod tests {
    use image::{Luma, Rgb, Rgba, RgbaImage};

    use super::*;

    fn overlay(w: u32, h: u32, color: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(w, h, Rgb(color))
    }

    fn mask(w: u32, h: u32, alpha: u8) -> GrayImage {
        GrayImage::from_pixel(w, h, Luma([alpha]))
    }

    #[test]
    fn opaque_mask_copies_overlay() {
        let mut bg = RgbImage::from_pixel(8, 8, Rgb([10, 20, 30]));
        composite(&mut bg, &overlay(3, 2, [200, 100, 50]), 2, 4, &mask(3, 2, 255)).unwrap();

        for (x, y, px) in bg.enumerate_pixels() {
            let inside = (2..5).contains(&x) && (4..6).contains(&y);
            let expected = if inside { [200, 100, 50] } else { [10, 20, 30] };
            assert_eq!(px.0, expected, "pixel at ({x}, {y})");
        }
    }

    #[test]
    fn transparent_mask_keeps_background() {
        let mut bg = RgbImage::from_fn(6, 6, |x, y| Rgb([x as u8 * 40, y as u8 * 40, 7]));
        let before = bg.clone();
        composite(&mut bg, &overlay(6, 6, [255, 255, 255]), 0, 0, &mask(6, 6, 0)).unwrap();
        assert_eq!(bg, before);
    }

    #[test]
    fn half_alpha_is_close_to_the_mean() {
        // Every (overlay, background) value pair appears once: background varies by row, overlay
        // by column.
        let mut bg = RgbImage::from_fn(256, 256, |_, y| Rgb([y as u8; 3]));
        let fg = RgbImage::from_fn(256, 256, |x, _| Rgb([x as u8; 3]));
        composite(&mut bg, &fg, 0, 0, &mask(256, 256, 128)).unwrap();

        for (x, y, px) in bg.enumerate_pixels() {
            let mean = (0.5 * f64::from(x) + 0.5 * f64::from(y)).round();
            for c in px.0 {
                assert!(
                    (f64::from(c) - mean).abs() <= 1.0,
                    "overlay={x} background={y} result={c}"
                );
            }
        }
    }

    #[test]
    fn mask_gradient_is_applied_per_pixel() {
        let mut bg = RgbImage::from_pixel(2, 1, Rgb([0, 0, 0]));
        let mut m = GrayImage::new(2, 1);
        m.put_pixel(0, 0, Luma([0]));
        m.put_pixel(1, 0, Luma([255]));
        composite(&mut bg, &overlay(2, 1, [90, 90, 90]), 0, 0, &m).unwrap();
        assert_eq!(bg.get_pixel(0, 0), &Rgb([0, 0, 0]));
        assert_eq!(bg.get_pixel(1, 0), &Rgb([90, 90, 90]));
    }

    #[test]
    fn rgba_background_keeps_its_alpha() {
        let mut bg = RgbaImage::from_pixel(4, 4, Rgba([0, 0, 0, 77]));
        composite(&mut bg, &overlay(2, 2, [255, 0, 0]), 1, 1, &mask(2, 2, 255)).unwrap();
        assert_eq!(bg.get_pixel(1, 1), &Rgba([255, 0, 0, 77]));
        assert_eq!(bg.get_pixel(0, 0), &Rgba([0, 0, 0, 77]));
    }

    #[test]
    fn placement_bounds() {
        let bg = Resolution::new(200, 200);
        let ring = Resolution::new(100, 90);

        assert!(matches!(
            Placement::new(150, 0, ring).check_within(bg),
            Err(CompositeError::OutOfBounds { .. })
        ));
        assert_eq!(Placement::new(50, 50, ring).check_within(bg), Ok((50, 50)));
        assert_eq!(Placement::new(100, 110, ring).check_within(bg), Ok((100, 110)));
        assert!(Placement::new(-1, 0, ring).check_within(bg).is_err());
        assert!(Placement::new(0, -1, ring).check_within(bg).is_err());
        assert!(Placement::new(0, 111, ring).check_within(bg).is_err());
    }

    #[test]
    fn out_of_bounds_leaves_background_untouched() {
        let mut bg = RgbImage::from_pixel(200, 200, Rgb([1, 2, 3]));
        let before = bg.clone();
        let err = composite(
            &mut bg,
            &overlay(100, 90, [255, 255, 255]),
            150,
            0,
            &mask(100, 90, 255),
        )
        .unwrap_err();
        assert!(matches!(err, CompositeError::OutOfBounds { .. }));
        assert_eq!(bg, before);

        let ok = composite(
            &mut bg,
            &overlay(100, 90, [255, 255, 255]),
            50,
            50,
            &mask(100, 90, 255),
        );
        assert_eq!(ok, Ok(()));
    }

    #[test]
    fn mismatched_mask_is_rejected() {
        let mut bg = RgbImage::new(10, 10);
        let err = composite(&mut bg, &overlay(3, 3, [0; 3]), 0, 0, &mask(3, 2, 255)).unwrap_err();
        assert_eq!(
            err,
            CompositeError::MaskMismatch {
                overlay: Resolution::new(3, 3),
                mask: Resolution::new(3, 2),
            }
        );
    }

    #[test]
    fn random_placements_only_touch_the_rectangle() {
        let mut rng = fastrand::Rng::with_seed(0x5eed);
        for _ in 0..20 {
            let (bw, bh) = (rng.u32(20..60), rng.u32(20..60));
            let (w, h) = (rng.u32(1..=bw), rng.u32(1..=bh));
            let x = rng.u32(0..=bw - w);
            let y = rng.u32(0..=bh - h);

            let mut bg = RgbImage::from_fn(bw, bh, |_, _| Rgb([rng.u8(..), rng.u8(..), rng.u8(..)]));
            let before = bg.clone();
            let fg = overlay(w, h, [rng.u8(..), rng.u8(..), rng.u8(..)]);
            composite(&mut bg, &fg, x.into(), y.into(), &mask(w, h, rng.u8(..))).unwrap();

            for (px, py, pixel) in bg.enumerate_pixels() {
                let inside = (x..x + w).contains(&px) && (y..y + h).contains(&py);
                if !inside {
                    assert_eq!(pixel, before.get_pixel(px, py));
                }
            }
        }
    }
}
