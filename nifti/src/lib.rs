#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(
    missing_debug_implementations,
    unused_qualifications,
    unused_import_braces
)]
//! A writer of single-file NIfTI-1 and NIfTI-2 images.
//!
//! The [`header`] module describes the header fields and binary layouts,
//! including the conversion of an affine to the qform quaternion,
//! while [`writer`] writes an [`ndarray`] image after its header,
//! with gzip compression for `.nii.gz` paths.
//!
//! # Example
//!
//! ```no_run
//! use bruker2nifti_nifti::{write_image, NiftiHeader, NiftiVersion};
//! use ndarray::{ArrayD, IxDyn};
//!
//! let image = ArrayD::<i16>::zeros(IxDyn(&[64, 64, 32]));
//! let mut header = NiftiHeader::default();
//! header.set_affine(&[
//!     [-0.2, 0., 0., 6.4],
//!     [0., -0.2, 0., 6.4],
//!     [0., 0., 0.5, -8.],
//!     [0., 0., 0., 1.],
//! ]);
//! header.qform_code = 2;
//! header.sform_code = 1;
//! write_image("image.nii.gz", &header, image.view(), NiftiVersion::Nifti1)?;
//! # Result::<(), Box<dyn std::error::Error>>::Ok(())
//! ```

pub mod error;
pub mod header;
pub mod writer;

pub use error::{Error, Result};
pub use header::{DataType, NiftiHeader, NiftiVersion, Quaternion, UNITS_MM, UNITS_SEC};
pub use flate2::Compression;
pub use writer::{write_image, NiftiElement, WriteOptions};
