//! The ring sprite.

use std::path::Path;

use image::{imageops::FilterType, DynamicImage, GrayImage, Luma, RgbImage, RgbaImage};
use ringfit_image::{composite, CompositeError, Resolution};

use crate::{error::RingFitError, pipeline::read_image};

/// Size every ring sprite is resized to before compositing.
pub const RING_SIZE: Resolution = Resolution::new(100, 90);

/// A ring image, split into color planes and an alpha mask of [`RING_SIZE`].
#[derive(Debug, Clone, PartialEq)]
pub struct Sprite {
    color: RgbImage,
    alpha: GrayImage,
}

impl Sprite {
    /// Decodes the ring image at `path`, whatever its extension.
    ///
    /// The image must have an alpha channel.
    pub fn open(path: &Path) -> Result<Self, RingFitError> {
        let image = read_image(path)?;
        Self::from_image(&image).ok_or_else(|| RingFitError::MissingAlpha { path: path.into() })
    }

    /// Creates a sprite from a decoded image, or returns [`None`] if it has no alpha channel.
    pub fn from_image(image: &DynamicImage) -> Option<Self> {
        if !image.color().has_alpha() {
            return None;
        }
        Some(Self::from_rgba(&image.to_rgba8()))
    }

    /// Resizes `image` to [`RING_SIZE`] and splits it into color and alpha.
    pub fn from_rgba(image: &RgbaImage) -> Self {
        let resized = image::imageops::resize(
            image,
            RING_SIZE.width(),
            RING_SIZE.height(),
            FilterType::Triangle,
        );

        let color = RgbImage::from_fn(resized.width(), resized.height(), |x, y| {
            let [r, g, b, _] = resized.get_pixel(x, y).0;
            image::Rgb([r, g, b])
        });
        let alpha = GrayImage::from_fn(resized.width(), resized.height(), |x, y| {
            Luma([resized.get_pixel(x, y).0[3]])
        });

        Self { color, alpha }
    }

    pub fn color(&self) -> &RgbImage {
        &self.color
    }

    pub fn alpha(&self) -> &GrayImage {
        &self.alpha
    }

    pub fn resolution(&self) -> Resolution {
        Resolution::of(&self.color)
    }

    /// Blends the sprite onto `background` with its top left corner at `(x, y)`.
    pub fn composite_onto(
        &self,
        background: &mut RgbImage,
        x: i64,
        y: i64,
    ) -> Result<(), CompositeError> {
        composite(background, &self.color, x, y, &self.alpha)
    }
}
