//! Error types of the NIfTI writer.
use snafu::{Backtrace, Snafu};
use std::path::PathBuf;

/// An error raised while writing a NIfTI image.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// The image has no dimensions or more than seven.
    #[snafu(display("Cannot store an image of {} dimensions", dimensions))]
    UnsupportedDimensionality {
        dimensions: usize,
        backtrace: Backtrace,
    },

    /// A dimension does not fit in the header of the chosen version.
    #[snafu(display("Size {} of axis {} is too large for a NIfTI-1 header", size, axis))]
    DimensionTooLarge {
        axis: usize,
        size: usize,
        backtrace: Backtrace,
    },

    #[snafu(display("Could not create file {}", path.display()))]
    CreateFile {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Could not write image header"))]
    WriteHeader {
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Could not write image data"))]
    WriteData {
        source: std::io::Error,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
