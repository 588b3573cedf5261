#![deny(trivial_numeric_casts, unsafe_code, unstable_features)]
#![warn(
    missing_debug_implementations,
    unused_qualifications,
    unused_import_braces
)]
//! This crate reads the parameter files of Bruker ParaVision scans,
//! written in a dialect of JCAMP-DX,
//! into typed parameter sets.
//!
//! - [`value`] holds the definition of a parameter value,
//!   which is either a number, a string, a numeric array of declared shape,
//!   or text kept verbatim.
//! - [`set`] defines the ordered [`ParameterSet`]
//!   and its human readable dump.
//! - [`jcamp`] is the parser of the parameter file dialect.
//! - [`error`] contains crate-level error and result types.
//!
//! # Example
//!
//! ```no_run
//! use bruker2nifti_parser::read_parameter_file;
//!
//! let visu_pars = read_parameter_file("visu_pars", "study/3/pdata/1")?;
//! let size = visu_pars.get("VisuCoreSize").and_then(|v| v.to_multi_f64());
//! println!("matrix size: {:?}", size);
//! # Result::<(), Box<dyn std::error::Error>>::Ok(())
//! ```

pub mod error;
pub mod jcamp;
pub mod set;
pub mod value;

pub use error::{Error, FormatError, Result};
pub use set::ParameterSet;
pub use value::{NumericArray, ParameterValue, Shape};

use error::{MalformedFormatSnafu, NotFoundSnafu, ReadFileSnafu};
use snafu::{ensure, ResultExt};
use std::path::Path;
use tracing::debug;

/// Read and parse the parameter file of the given name
/// (e.g. `"acqp"`, `"method"`, `"visu_pars"`, `"subject"`)
/// inside `folder`.
///
/// The file content is decoded leniently,
/// replacing invalid UTF-8 sequences.
///
/// # Errors
///
/// - [`Error::NotFound`] if the file does not exist;
/// - [`Error::ReadFile`] on other I/O problems;
/// - [`Error::MalformedFormat`] if the content could not be parsed.
pub fn read_parameter_file(name: &str, folder: impl AsRef<Path>) -> Result<ParameterSet> {
    let path = folder.as_ref().join(name);
    ensure!(path.is_file(), NotFoundSnafu { name, path });

    let bytes = std::fs::read(&path).context(ReadFileSnafu { path: &path })?;
    let set = jcamp::parse_listing(&String::from_utf8_lossy(&bytes))
        .context(MalformedFormatSnafu { path: &path })?;
    debug!("Read {} fields from {}", set.len(), path.display());
    Ok(set)
}
