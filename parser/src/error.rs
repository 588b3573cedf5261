//! Error types of the parameter file reader.
use snafu::{Backtrace, Snafu};
use std::path::PathBuf;

/// An error raised while locating or reading a parameter file.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    /// The parameter file does not exist in the given folder.
    #[snafu(display("Parameter file `{}` not found at {}", name, path.display()))]
    NotFound {
        name: String,
        path: PathBuf,
        backtrace: Backtrace,
    },

    /// The parameter file exists but could not be read.
    #[snafu(display("Could not read parameter file {}", path.display()))]
    ReadFile {
        path: PathBuf,
        source: std::io::Error,
        backtrace: Backtrace,
    },

    /// The parameter file's content does not follow the expected dialect.
    #[snafu(display("Malformed parameter file {}", path.display()))]
    MalformedFormat {
        path: PathBuf,
        #[snafu(backtrace)]
        source: FormatError,
    },
}

/// An error in the content of a parameter listing.
#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum FormatError {
    /// An array holds a different number of elements than declared.
    #[snafu(display(
        "Field `{}` declares {} elements but {} were found",
        field,
        declared,
        found
    ))]
    ArrayLength {
        field: String,
        declared: usize,
        found: usize,
        backtrace: Backtrace,
    },

    /// A numeric field holds a token which is not a number.
    #[snafu(display("Field `{}` has non-numeric element `{}`", field, token))]
    InvalidNumber {
        field: String,
        token: String,
        backtrace: Backtrace,
    },

    /// The same field appears more than once.
    #[snafu(display("Field `{}` is defined more than once", field))]
    DuplicateField { field: String, backtrace: Backtrace },

    /// A record line does not contain the `=` separator.
    #[snafu(display("Line {} is not a `key=value` record: `{}`", line, text))]
    MissingSeparator {
        line: usize,
        text: String,
        backtrace: Backtrace,
    },
}

/// Type alias for a result from the parameter file reader.
pub type Result<T, E = Error> = std::result::Result<T, E>;
