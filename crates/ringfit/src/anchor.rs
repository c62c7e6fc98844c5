//! Ring placement from finger landmarks.

use ringfit_image::Resolution;

use crate::{
    hand::{Hand, HandLandmark},
    landmark::Landmark,
};

/// Horizontal offset from the MCP joint to the left edge of the ring.
pub const OFFSET_X: i64 = -30;

/// Vertical offset from the MCP/PIP midpoint to the top edge of the ring.
pub const OFFSET_Y: i64 = -10;

/// Pixel positions derived from a hand's middle finger.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelAnchor {
    /// Middle finger MCP joint, in pixels.
    pub mcp: (i64, i64),
    /// Middle finger PIP joint, in pixels.
    pub pip: (i64, i64),
    /// Vertical midpoint between the two joints, rounded down.
    pub mid_y: i64,
    /// Top left corner of the ring sprite.
    pub origin: (i64, i64),
}

/// Converts a normalized landmark to pixel coordinates of an image of size `res`.
pub fn to_pixels(landmark: Landmark, res: Resolution) -> (i64, i64) {
    let x = (f64::from(landmark.x()) * f64::from(res.width())).round();
    let y = (f64::from(landmark.y()) * f64::from(res.height())).round();
    (x as i64, y as i64)
}

/// Computes where the ring goes for the given middle finger joints.
///
/// The ring's top left corner is the MCP joint's X shifted by [`OFFSET_X`], and the midpoint of
/// the two joints' Y shifted by [`OFFSET_Y`]. The offsets are fixed and do not
/// account for finger orientation, hand size or the ring's own size, so the result is only a
/// good fit for upright hands of roughly the size the offsets were tuned on.
pub fn ring_anchor(mcp: Landmark, pip: Landmark, res: Resolution) -> PixelAnchor {
    let mcp = to_pixels(mcp, res);
    let pip = to_pixels(pip, res);
    let mid_y = (mcp.1 + pip.1).div_euclid(2);

    PixelAnchor {
        mcp,
        pip,
        mid_y,
        origin: (mcp.0 + OFFSET_X, mid_y + OFFSET_Y),
    }
}

/// Computes the ring anchor of `hand` in an image of size `res`.
pub fn hand_anchor(hand: &Hand, res: Resolution) -> PixelAnchor {
    ring_anchor(
        hand.landmark(HandLandmark::MiddleFingerMcp),
        hand.landmark(HandLandmark::MiddleFingerPip),
        res,
    )
}
