//! Error kinds reported by the ring fitting pipeline.

use std::path::PathBuf;

use ringfit_image::CompositeError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RingFitError {
    #[error("could not read image '{}'", path.display())]
    ReadImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("ring image '{}' has no alpha channel", path.display())]
    MissingAlpha { path: PathBuf },

    #[error("could not write image '{}'", path.display())]
    WriteImage {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("ring does not fit into the image")]
    Placement(#[from] CompositeError),
}
