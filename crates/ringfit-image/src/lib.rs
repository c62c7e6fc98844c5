//! Image primitives for ringfit.
//!
//! # Overview
//!
//! Images are plain [`image::ImageBuffer`]s with 8-bit channels. The hand photo is handled as an
//! [`RgbImage`][image::RgbImage], sprites as [`RgbaImage`][image::RgbaImage] that get split into
//! color planes and an alpha mask before compositing.
//!
//! This crate provides:
//!
//! - [`Resolution`] and [`AspectRatio`] for describing image and network input sizes.
//! - [`rect::Rect`] and [`rect::RotatedRect`], floating-point rectangles used for detections and
//!   regions of interest.
//! - [`sample`], which reads a (possibly rotated) region of an image at a fixed output size.
//! - [`composite`], the in-place alpha compositor that places the ring sprite.

pub mod composite;
pub mod num;
pub mod rect;
pub mod sample;

mod resolution;

pub use composite::{composite, CompositeError, Placement};
pub use resolution::{AspectRatio, Resolution};
