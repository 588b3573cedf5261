#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(
    missing_debug_implementations,
    unused_qualifications,
    unused_import_braces
)]
//! Conversion of Bruker ParaVision scans and studies into NIfTI images.
//!
//! A scan folder holds the `acqp` and `method` parameter files,
//! and one folder per reconstruction under `pdata/`
//! with the `reco` and `visu_pars` parameter files
//! and the raw image data in `2dseq`.
//!
//! The conversion of a scan goes through these steps:
//!
//! - [`ScanParameters`] reads the parameter files;
//! - [`ScanMetadata`] extracts the image geometry and sample format;
//! - [`SpatialTransform`] builds the voxel-to-world affine;
//! - [`read_volume`] assembles the image from the raw data,
//!   which is then rescaled to physical values if requested;
//! - the image and its side files
//!   (diffusion tables and parameter dumps) are written out.
//!
//! [`convert_scan`] does all of this for one scan,
//! and [`convert_study`] for all scans of a study.
//!
//! # Example
//!
//! ```no_run
//! use bruker2nifti_convert::{convert_scan, ConvertOptions};
//!
//! let mut options = ConvertOptions::default();
//! options.compress(true).save_human_readable(false);
//! let files = convert_scan("study/3", "out", Some("flash"), &options)?;
//! for file in files {
//!     println!("{}", file.display());
//! }
//! # Result::<(), Box<dyn std::error::Error>>::Ok(())
//! ```

pub mod diffusion;
pub mod error;
pub mod metadata;
pub mod options;
pub mod scan;
pub mod study;
pub mod transform;
pub mod volume;

pub use diffusion::DiffusionTable;
pub use error::{Error, Result};
pub use metadata::{ScanMetadata, ScanParameters};
pub use options::{AxisDirection, ConvertOptions};
pub use scan::{convert, convert_scan, ConversionResult};
pub use study::{
    convert_study, describe_study, list_scans, subject_id, subject_info, subject_name,
    ConvertedScan, ScanPlan, StudyDescription, StudyReport,
};
pub use transform::SpatialTransform;
pub use volume::{decode_volume, read_volume, Rescale, SampleType, VolumeData};
