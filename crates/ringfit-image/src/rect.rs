//! Rectangle types.
//!
//! These are used for palm detections and for the rotated hand regions that are cropped out of
//! the photo before landmark estimation. Coordinates are in pixels, X to the right, Y down.

use std::fmt;

use nalgebra::{Rotation2, Vector2};

use crate::AspectRatio;

/// An axis-aligned rectangle with floating-point coordinates.
///
/// Rectangles are allowed to have zero height and/or width. Negative dimensions are not allowed.
#[derive(Clone, Copy, PartialEq)]
pub struct Rect {
    center: Vector2<f32>,
    size: Vector2<f32>,
}

impl Rect {
    /// Creates a rectangle extending outwards from a center point.
    #[inline]
    pub fn from_center(x_center: f32, y_center: f32, width: f32, height: f32) -> Self {
        Self {
            center: Vector2::new(x_center, y_center),
            size: Vector2::new(width, height),
        }
    }

    /// Creates a rectangle extending downwards and right from a point.
    #[inline]
    pub fn from_top_left(top_left_x: f32, top_left_y: f32, width: f32, height: f32) -> Self {
        Self::from_center(
            top_left_x + width * 0.5,
            top_left_y + height * 0.5,
            width,
            height,
        )
    }

    /// Symmetrically extends one dimension of `self` so that the resulting rectangle has the given
    /// aspect ratio.
    #[must_use]
    pub fn grow_to_fit_aspect(&self, target_aspect: AspectRatio) -> Self {
        let mut res = *self;
        let target_width = self.height() * target_aspect.as_f32();
        if target_width >= self.width() {
            res.size.x = target_width;
        } else {
            res.size.y = self.width() / target_aspect.as_f32();
        }

        res
    }

    #[inline]
    pub fn top_left(&self) -> Vector2<f32> {
        self.center - self.size * 0.5
    }

    /// Returns the X coordinate of the left side of the rectangle.
    #[inline]
    pub fn x(&self) -> f32 {
        self.top_left().x
    }

    /// Returns the Y coordinate of the top side of the rectangle.
    #[inline]
    pub fn y(&self) -> f32 {
        self.top_left().y
    }

    #[inline]
    pub fn x_center(&self) -> f32 {
        self.center.x
    }

    #[inline]
    pub fn y_center(&self) -> f32 {
        self.center.y
    }

    #[inline]
    pub fn width(&self) -> f32 {
        self.size.x
    }

    #[inline]
    pub fn height(&self) -> f32 {
        self.size.y
    }

    #[inline]
    pub fn area(&self) -> f32 {
        self.size.x * self.size.y
    }

    #[inline]
    pub fn center(&self) -> Vector2<f32> {
        self.center
    }

    #[inline]
    pub fn size(&self) -> Vector2<f32> {
        self.size
    }

    /// Computes the intersection of `self` and `other`.
    ///
    /// Returns [`None`] when the rectangles do not overlap.
    pub fn intersection(&self, other: &Rect) -> Option<Rect> {
        let min = self.top_left().sup(&other.top_left());
        let max = (self.top_left() + self.size).inf(&(other.top_left() + other.size));
        if min.x > max.x || min.y > max.y {
            return None;
        }

        let size = max - min;
        Some(Rect::from_top_left(min.x, min.y, size.x, size.y))
    }

    /// Computes the Intersection over Union (IOU) of `self` and `other`.
    pub fn iou(&self, other: &Self) -> f32 {
        let intersection = self.intersection(other).map_or(0.0, |rect| rect.area());
        let union = self.area() + other.area() - intersection;
        if union <= 0.0 {
            return 0.0;
        }
        intersection / union
    }
}

impl fmt::Debug for Rect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Rect @ ({},{})/{}x{}",
            self.x(),
            self.y(),
            self.width(),
            self.height()
        )
    }
}

/// A [`Rect`], rotated around its center.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    rect: Rect,
    radians: f32,
}

impl RotatedRect {
    /// Creates a new rotated rectangle.
    ///
    /// `radians` is the clockwise rotation (as seen in the image, where Y points down) to apply to
    /// the [`Rect`].
    #[inline]
    pub fn new(rect: Rect, radians: f32) -> Self {
        Self { rect, radians }
    }

    /// Returns the rectangle's clockwise rotation in radians.
    #[inline]
    pub fn rotation_radians(&self) -> f32 {
        self.radians
    }

    /// Returns a reference to the underlying non-rotated rectangle.
    #[inline]
    pub fn rect(&self) -> &Rect {
        &self.rect
    }

    /// Applies a closure to the underlying non-rotated [`Rect`].
    #[must_use]
    pub fn map(mut self, f: impl FnOnce(Rect) -> Rect) -> Self {
        self.rect = f(self.rect);
        self
    }

    /// Symmetrically extends one dimension of `self` so that the resulting rectangle has the given
    /// aspect ratio.
    #[must_use]
    pub fn grow_to_fit_aspect(&self, target_aspect: AspectRatio) -> Self {
        self.map(|rect| rect.grow_to_fit_aspect(target_aspect))
    }

    /// Transforms a point from the [`RotatedRect`]'s coordinate system to the parent system.
    ///
    /// The origin of the inner coordinate system is formed by the top left corner of the rectangle.
    pub fn transform_out(&self, [x, y]: [f32; 2]) -> [f32; 2] {
        let half = self.rect.size() * 0.5;
        let outer = Rotation2::new(self.radians) * (Vector2::new(x, y) - half) + self.rect.center();
        [outer.x, outer.y]
    }
}

impl From<Rect> for RotatedRect {
    fn from(rect: Rect) -> Self {
        Self::new(rect, 0.0)
    }
}

#[cfg(test)]
mod tests {
    use std::f32::consts::{FRAC_PI_2, PI};

    use approx::assert_abs_diff_eq;

    use super::*;

    #[test]
    fn iou() {
        let a = Rect::from_top_left(0.0, 0.0, 2.0, 2.0);
        assert_eq!(a.iou(&a), 1.0);

        let b = Rect::from_top_left(1.0, 0.0, 2.0, 2.0);
        // overlap of 2, union of 6
        assert_abs_diff_eq!(a.iou(&b), 1.0 / 3.0);

        let far = Rect::from_top_left(10.0, 10.0, 1.0, 1.0);
        assert_eq!(a.iou(&far), 0.0);
    }

    #[test]
    fn grow_to_fit_aspect() {
        let tall = Rect::from_center(0.0, 0.0, 2.0, 4.0);
        let square = tall.grow_to_fit_aspect(AspectRatio::SQUARE);
        assert_eq!(square, Rect::from_center(0.0, 0.0, 4.0, 4.0));

        let wide = Rect::from_center(1.0, 1.0, 6.0, 2.0);
        let square = wide.grow_to_fit_aspect(AspectRatio::SQUARE);
        assert_eq!(square, Rect::from_center(1.0, 1.0, 6.0, 6.0));
    }

    #[test]
    fn unrotated_transform_is_offset() {
        let rect = RotatedRect::from(Rect::from_top_left(10.0, 20.0, 4.0, 4.0));
        assert_eq!(rect.transform_out([0.0, 0.0]), [10.0, 20.0]);
        assert_eq!(rect.transform_out([2.0, 3.0]), [12.0, 23.0]);
    }

    #[test]
    fn quarter_turn_points_up_inside_to_the_right() {
        // A hand whose fingers point to the right of the image has a rotation of 90°. The "up"
        // direction inside the region must then map to +X in the image.
        let rect = RotatedRect::new(Rect::from_center(0.0, 0.0, 2.0, 2.0), FRAC_PI_2);
        let [x, y] = rect.transform_out([1.0, 0.0]);
        assert_abs_diff_eq!(x, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(y, 0.0, epsilon = 1e-6);
    }

    #[test]
    fn half_turn_swaps_corners() {
        let rect = RotatedRect::new(Rect::from_top_left(0.0, 0.0, 2.0, 2.0), PI);
        let [x, y] = rect.transform_out([0.0, 0.0]);
        assert_abs_diff_eq!(x, 2.0, epsilon = 1e-6);
        assert_abs_diff_eq!(y, 2.0, epsilon = 1e-6);
        let [x, y] = rect.transform_out([2.0, 2.0]);
        assert_abs_diff_eq!(x, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(y, 0.0, epsilon = 1e-6);
    }
}
