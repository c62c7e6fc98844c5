//! Sampling of (rotated) image regions.

use image::{Rgb, RgbImage};

use crate::{rect::RotatedRect, Resolution};

/// Color returned for sample positions outside of the source image.
pub const OUTSIDE: Rgb<u8> = Rgb([0, 0, 0]);

/// Samples the area of `image` covered by `region` into a new image of resolution `out`.
///
/// The region is stretched to fill `out`, so callers that care about aspect ratio should fit the
/// region first (see [`RotatedRect::grow_to_fit_aspect`]). Each output pixel takes the value of the
/// nearest source pixel. Parts of the region that lie outside of `image` read as [`OUTSIDE`],
/// which pads the result with black bars.
pub fn sample_region(image: &RgbImage, region: RotatedRect, out: Resolution) -> RgbImage {
    let scale_x = region.rect().width() / out.width() as f32;
    let scale_y = region.rect().height() / out.height() as f32;

    RgbImage::from_fn(out.width(), out.height(), |x, y| {
        let inner = [(x as f32 + 0.5) * scale_x, (y as f32 + 0.5) * scale_y];
        let [sx, sy] = region.transform_out(inner);
        let [sx, sy] = [(sx - 0.5).round(), (sy - 0.5).round()];
        if sx < 0.0 || sy < 0.0 || sx >= image.width() as f32 || sy >= image.height() as f32 {
            return OUTSIDE;
        }

        *image.get_pixel(sx as u32, sy as u32)
    })
}
