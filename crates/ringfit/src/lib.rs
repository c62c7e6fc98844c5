//! Places a ring sprite onto a photo of a hand.
//!
//! The pipeline runs once per invocation:
//!
//! 1. The hand photo and the ring sprite are decoded. The sprite must carry an alpha channel and
//!    is resized to [`sprite::RING_SIZE`].
//! 2. A [`locator::Locator`] asks a [`oracle::LandmarkOracle`] for the landmarks of every hand in
//!    the photo.
//! 3. For each hand, [`anchor::ring_anchor`] derives a placement from the middle finger's MCP and
//!    PIP joints.
//! 4. The sprite is alpha-composited onto the photo at that placement
//!    ([`ringfit_image::composite`]), and the result is encoded.
//!
//! # Models
//!
//! The bundled oracle, [`oracle::OnnxOracle`], runs MediaPipe's palm detection and hand landmark
//! networks. They are not part of this repository; by default they are loaded from
//! `3rdparty/onnx/palm_detection_full.onnx` and `3rdparty/onnx/hand_landmark_full.onnx`, relative
//! to the working directory (see [`oracle::ModelPaths`]).
//!
//! # Coordinates
//!
//! Image coordinates have X pointing right and Y pointing down, with the origin at the top left
//! corner. Landmarks handed out by the locator are normalized to `[0, 1]` by image width and
//! height.

pub mod anchor;
pub mod detection;
pub mod error;
pub mod hand;
pub mod iter;
pub mod landmark;
pub mod locator;
pub mod nn;
pub mod oracle;
pub mod pipeline;
pub mod sprite;
pub mod timer;

#[cfg(test)]
mod test;

use log::LevelFilter;

/// macro-use only, not part of public API.
#[doc(hidden)]
pub fn init_logger(calling_crate: &'static str) {
    let log_level = if cfg!(debug_assertions) {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };
    env_logger::Builder::new()
        .filter(Some(calling_crate), log_level)
        .filter(Some(env!("CARGO_CRATE_NAME")), log_level)
        .filter(Some("tract_core"), LevelFilter::Warn)
        .filter(Some("tract_onnx"), LevelFilter::Warn)
        .parse_default_env()
        .try_init()
        .ok();
}

/// Initializes logging to *stderr*.
///
/// If `cfg!(debug_assertions)` is enabled, the calling crate and ringfit will log at *debug*
/// level. Otherwise, they will log at *info* level. `RUST_LOG` overrides these defaults.
///
/// `tract` will always log at *warn* level.
///
/// If a global logger is already registered, this macro will do nothing.
#[macro_export]
macro_rules! init_logger {
    () => {
        $crate::init_logger(env!("CARGO_CRATE_NAME"))
    };
}
