//! Common code for visual landmark estimation.

use anyhow::Context;
use image::RgbImage;
use ringfit_image::rect::RotatedRect;

use crate::{
    nn::{Cnn, Outputs},
    timer::Timer,
};

type Position = [f32; 3];

/// A fixed-size collection of landmark positions.
#[derive(Debug, Clone, PartialEq)]
pub struct Landmarks {
    positions: Box<[Position]>,
}

impl Landmarks {
    /// Creates a new [`Landmarks`] collection containing `len` preallocated landmarks.
    ///
    /// All landmarks will start with all coordinates at `0.0`.
    pub fn new(len: usize) -> Self {
        Self {
            positions: vec![[0.0, 0.0, 0.0]; len].into_boxed_slice(),
        }
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = Landmark> + Clone + '_ {
        self.positions.iter().map(|&pos| Landmark::new(pos))
    }

    pub fn get(&self, index: usize) -> Landmark {
        Landmark::new(self.positions[index])
    }

    pub fn set(&mut self, index: usize, landmark: Landmark) {
        self.positions[index] = landmark.pos;
    }

    pub fn positions_mut(&mut self) -> &mut [Position] {
        &mut self.positions
    }

    pub fn map_positions(&mut self, mut f: impl FnMut(Position) -> Position) {
        for pos in self.positions_mut() {
            *pos = f(*pos);
        }
    }
}

/// A landmark in 3D space.
///
/// Depending on where it comes from, the position is either in pixels or normalized to `[0, 1]`
/// by the image's width and height. Z is a relative depth that is scaled like X.
#[derive(Debug, PartialEq, PartialOrd, Clone, Copy, Default)]
pub struct Landmark {
    pos: Position,
}

impl Landmark {
    pub fn new(position: Position) -> Self {
        Self { pos: position }
    }

    #[inline]
    pub fn position(&self) -> Position {
        self.pos
    }

    #[inline]
    pub fn x(&self) -> f32 {
        self.pos[0]
    }

    #[inline]
    pub fn y(&self) -> f32 {
        self.pos[1]
    }

    #[inline]
    pub fn z(&self) -> f32 {
        self.pos[2]
    }
}

/// Trait for landmark estimation results returned by [`Estimator::estimate`].
pub trait Estimate {
    /// Returns a mutable reference to the estimated landmarks.
    fn landmarks_mut(&mut self) -> &mut Landmarks;
}

/// Trait implemented by neural networks that estimate landmarks in an image region.
pub trait Network: Send + Sync + 'static {
    /// The estimation result type.
    type Output: Estimate;

    /// Returns the [`Cnn`] that computes the landmarks.
    fn cnn(&self) -> &Cnn;

    /// Decodes the raw network outputs into `estimate`.
    ///
    /// Positions are expected to be in the coordinate system of the network's input.
    fn extract(&self, outputs: &Outputs, estimate: &mut Self::Output) -> anyhow::Result<()>;
}

/// Runs a landmark [`Network`] on regions of an image.
pub struct Estimator<E: Estimate> {
    network: Box<dyn Network<Output = E>>,
    estimate: E,
    t_infer: Timer,
    t_extract: Timer,
}

impl<E: Estimate + Default> Estimator<E> {
    pub fn new<N: Network<Output = E>>(network: N) -> Self {
        Self {
            network: Box::new(network),
            estimate: E::default(),
            t_infer: Timer::new("infer"),
            t_extract: Timer::new("extract"),
        }
    }
}

impl<E: Estimate + 'static> Estimator<E> {
    /// Returns profiling timers for this landmark estimator.
    pub fn timers(&self) -> impl Iterator<Item = &Timer> + '_ {
        [&self.t_infer, &self.t_extract].into_iter()
    }

    /// Estimates landmarks in the `roi` of `image`.
    ///
    /// If the aspect ratio of `roi` does not match the network's input, the region is enlarged to
    /// fit first. The returned landmark positions are in pixel coordinates of `image`.
    pub fn estimate(&mut self, image: &RgbImage, roi: RotatedRect) -> anyhow::Result<&mut E> {
        let cnn = self.network.cnn();
        let input_res = cnn.input_resolution();
        let aspect = input_res
            .aspect_ratio()
            .context("landmark network has a zero-sized input")?;

        let view_rect = roi.grow_to_fit_aspect(aspect);
        let outputs = self.t_infer.time(|| cnn.estimate(image, view_rect))?;
        log::trace!("inference result: {:?}", outputs);

        self.t_extract
            .time(|| self.network.extract(&outputs, &mut self.estimate))?;

        let scale = view_rect.rect().width() / input_res.width() as f32;
        self.estimate
            .landmarks_mut()
            .map_positions(|[x, y, z]| map_out(view_rect, scale, [x, y, z]));

        Ok(&mut self.estimate)
    }
}

/// Maps a position from network input coordinates back through the sampled region.
fn map_out(view_rect: RotatedRect, scale: f32, [x, y, z]: Position) -> Position {
    let [x, y] = view_rect.transform_out([x * scale, y * scale]);
    [x, y, z * scale]
}
