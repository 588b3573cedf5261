//! Crate-level error types.
use snafu::{Backtrace, Snafu};
use std::path::PathBuf;

/// An error raised while converting a scan or a study.
///
/// Any error aborts the conversion of the scan at hand.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Invalid conversion options"))]
    InvalidOptions {
        #[snafu(backtrace)]
        source: crate::options::Error,
    },

    #[snafu(display("Input folder {} does not exist", path.display()))]
    MissingInputFolder { path: PathBuf, backtrace: Backtrace },

    #[snafu(display("Output folder {} does not exist", path.display()))]
    MissingOutputFolder { path: PathBuf, backtrace: Backtrace },

    #[snafu(display("Could not create output folder {}", path.display()))]
    CreateOutputFolder {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Could not read the parameters of scan {}", path.display()))]
    ReadParameters {
        path: PathBuf,
        #[snafu(backtrace)]
        source: bruker2nifti_parser::Error,
    },

    #[snafu(display("Could not extract the metadata of scan {}", path.display()))]
    ExtractMetadata {
        path: PathBuf,
        #[snafu(backtrace)]
        source: crate::metadata::Error,
    },

    #[snafu(display("Could not build the spatial transform of scan {}", path.display()))]
    BuildTransform {
        path: PathBuf,
        #[snafu(backtrace)]
        source: crate::transform::Error,
    },

    #[snafu(display("Could not assemble the volume of scan {}", path.display()))]
    AssembleVolume {
        path: PathBuf,
        #[snafu(backtrace)]
        source: crate::volume::Error,
    },

    #[snafu(display("Could not write image {}", path.display()))]
    WriteImage {
        path: PathBuf,
        #[snafu(backtrace)]
        source: bruker2nifti_nifti::Error,
    },

    #[snafu(display("Could not write file {}", path.display()))]
    WriteFile {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Could not list the scans of study {}", path.display()))]
    ListScans {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Could not read the subject of study {}", path.display()))]
    ReadSubject {
        path: PathBuf,
        #[snafu(backtrace)]
        source: bruker2nifti_parser::Error,
    },

    #[snafu(display("Subject of study {} has no `{}`", path.display(), field))]
    MissingSubjectField {
        path: PathBuf,
        field: &'static str,
        backtrace: Backtrace,
    },

    #[snafu(display("Study {} has no scans", path.display()))]
    NoScans { path: PathBuf, backtrace: Backtrace },

    #[snafu(display(
        "{} output names were given for {} scans",
        names,
        scans
    ))]
    MismatchedScanNames {
        scans: usize,
        names: usize,
        backtrace: Backtrace,
    },

    #[snafu(display("Failed to convert scan `{}`", scan))]
    ConvertScan {
        scan: String,
        #[snafu(source(from(Error, Box::new)))]
        source: Box<Error>,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
