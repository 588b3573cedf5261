//! Options of a conversion.
use bruker2nifti_nifti::NiftiVersion;
use snafu::{ensure, Backtrace, OptionExt, Snafu};
use std::fmt;
use std::str::FromStr;

/// The highest qform/sform code defined by NIfTI (`NIFTI_XFORM_TEMPLATE_OTHER`).
pub const MAX_XFORM_CODE: u8 = 4;

#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Invalid {} code {}, must be between 0 and {}", which, code, MAX_XFORM_CODE))]
    InvalidXformCode {
        which: &'static str,
        code: u8,
        backtrace: Backtrace,
    },

    #[snafu(display(
        "Invalid axis direction `{}`, expected three comma separated signs such as `-1,-1,1`",
        value
    ))]
    InvalidAxisDirection { value: String, backtrace: Backtrace },
}

/// The sign applied to each of the three spatial axes
/// of the voxel-to-world transform.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct AxisDirection([i8; 3]);

impl Default for AxisDirection {
    fn default() -> Self {
        AxisDirection([-1, -1, 1])
    }
}

impl AxisDirection {
    /// Create an axis direction triple,
    /// returning `None` unless every sign is `1` or `-1`.
    pub fn new(signs: [i8; 3]) -> Option<Self> {
        if signs.iter().all(|s| matches!(s, 1 | -1)) {
            Some(AxisDirection(signs))
        } else {
            None
        }
    }

    /// The signs of the three axes.
    pub fn signs(&self) -> [i8; 3] {
        self.0
    }

    /// The signs of the three axes as floating point factors.
    pub fn factors(&self) -> [f64; 3] {
        self.0.map(f64::from)
    }

    /// Obtain a new triple with the sign of one axis reversed.
    pub fn flipped(mut self, axis: usize) -> Self {
        self.0[axis] = -self.0[axis];
        self
    }
}

impl FromStr for AxisDirection {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let signs = s
            .split(',')
            .map(|t| t.trim().parse::<i8>().ok())
            .collect::<Option<Vec<_>>>()
            .and_then(|signs| <[i8; 3]>::try_from(signs).ok())
            .and_then(AxisDirection::new);
        signs.context(InvalidAxisDirectionSnafu { value: s })
    }
}

impl fmt::Display for AxisDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [x, y, z] = self.0;
        write!(f, "{},{},{}", x, y, z)
    }
}

/// A builder type for the options of a scan or study conversion.
///
/// The defaults are those of the `bruker2nifti` command line tool.
#[derive(Debug, Clone, PartialEq)]
#[non_exhaustive]
pub struct ConvertOptions {
    /// the version of the NIfTI header
    pub nifti_version: NiftiVersion,
    /// the qform code (0 to 4)
    pub qform: u8,
    /// the sform code (0 to 4)
    pub sform: u8,
    /// the sign of each spatial axis of the transform
    pub axis_direction: AxisDirection,
    /// whether to write the parameter sets as text next to the image
    pub save_human_readable: bool,
    /// whether to bring diffusion gradient vectors
    /// into the image frame and scale them to unit length
    pub normalise_b_vectors_if_dwi: bool,
    /// whether to apply the data slope and offset to the samples
    pub correct_slope: bool,
    /// 0 for no progress messages, 1 for progress, 2 for debugging detail
    pub verbose: u8,
    /// the reconstruction to convert, under `pdata/`
    pub reco_number: u32,
    /// whether to gzip the image (`.nii.gz`)
    pub compress: bool,
    /// whether a study conversion stops at the first failing scan
    pub fail_fast: bool,
}

impl Default for ConvertOptions {
    fn default() -> Self {
        ConvertOptions {
            nifti_version: NiftiVersion::Nifti1,
            qform: 2,
            sform: 1,
            axis_direction: AxisDirection::default(),
            save_human_readable: true,
            normalise_b_vectors_if_dwi: true,
            correct_slope: false,
            verbose: 1,
            reco_number: 1,
            compress: true,
            fail_fast: false,
        }
    }
}

impl ConvertOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn nifti_version(&mut self, version: NiftiVersion) -> &mut Self {
        self.nifti_version = version;
        self
    }

    /// Set the qform code.
    /// Codes above [`MAX_XFORM_CODE`] are rejected when converting.
    pub fn qform(&mut self, code: u8) -> &mut Self {
        self.qform = code;
        self
    }

    /// Set the sform code.
    /// Codes above [`MAX_XFORM_CODE`] are rejected when converting.
    pub fn sform(&mut self, code: u8) -> &mut Self {
        self.sform = code;
        self
    }

    pub fn axis_direction(&mut self, axis_direction: AxisDirection) -> &mut Self {
        self.axis_direction = axis_direction;
        self
    }

    pub fn save_human_readable(&mut self, save: bool) -> &mut Self {
        self.save_human_readable = save;
        self
    }

    pub fn normalise_b_vectors_if_dwi(&mut self, normalise: bool) -> &mut Self {
        self.normalise_b_vectors_if_dwi = normalise;
        self
    }

    pub fn correct_slope(&mut self, correct: bool) -> &mut Self {
        self.correct_slope = correct;
        self
    }

    /// Set the verbosity level, saturating at 2.
    pub fn verbose(&mut self, level: u8) -> &mut Self {
        self.verbose = level.min(2);
        self
    }

    pub fn reco_number(&mut self, reco_number: u32) -> &mut Self {
        self.reco_number = reco_number;
        self
    }

    pub fn compress(&mut self, compress: bool) -> &mut Self {
        self.compress = compress;
        self
    }

    pub fn fail_fast(&mut self, fail_fast: bool) -> &mut Self {
        self.fail_fast = fail_fast;
        self
    }

    /// Check that the transform codes are defined by NIfTI.
    pub fn validate(&self) -> Result<(), Error> {
        ensure!(
            self.qform <= MAX_XFORM_CODE,
            InvalidXformCodeSnafu {
                which: "qform",
                code: self.qform
            }
        );
        ensure!(
            self.sform <= MAX_XFORM_CODE,
            InvalidXformCodeSnafu {
                which: "sform",
                code: self.sform
            }
        );
        Ok(())
    }

    /// The file name extension of the image.
    pub(crate) fn image_extension(&self) -> &'static str {
        if self.compress {
            "nii.gz"
        } else {
            "nii"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[test]
    fn defaults() {
        let options = ConvertOptions::default();
        assert_eq!(options.nifti_version, NiftiVersion::Nifti1);
        assert_eq!((options.qform, options.sform), (2, 1));
        assert_eq!(options.axis_direction.signs(), [-1, -1, 1]);
        assert!(options.save_human_readable);
        assert!(options.normalise_b_vectors_if_dwi);
        assert!(!options.correct_slope);
        assert_eq!(options.verbose, 1);
        assert_eq!(options.image_extension(), "nii.gz");
        assert!(options.validate().is_ok());
    }

    #[test]
    fn builder_chain() {
        let mut options = ConvertOptions::new();
        options.qform(1).sform(4).verbose(7).compress(false);
        assert_eq!((options.qform, options.sform, options.verbose), (1, 4, 2));
        assert_eq!(options.image_extension(), "nii");
    }

    #[test]
    fn rejects_unknown_xform_codes() {
        let mut options = ConvertOptions::new();
        options.sform(5);
        assert!(matches!(
            options.validate(),
            Err(Error::InvalidXformCode {
                which: "sform",
                code: 5,
                ..
            })
        ));
    }

    #[rstest]
    #[case("-1,-1,1", [-1, -1, 1])]
    #[case("1, 1, 1", [1, 1, 1])]
    #[case(" 1,-1,-1 ", [1, -1, -1])]
    fn parse_axis_direction(#[case] text: &str, #[case] signs: [i8; 3]) {
        let direction: AxisDirection = text.parse().unwrap();
        assert_eq!(direction.signs(), signs);
        assert_eq!(direction.to_string().parse::<AxisDirection>().unwrap(), direction);
    }

    #[rstest]
    #[case("")]
    #[case("-1,-1")]
    #[case("-1,-1,1,1")]
    #[case("-1,0,1")]
    #[case("-1,2,1")]
    #[case("x,y,z")]
    fn reject_bad_axis_direction(#[case] text: &str) {
        assert!(matches!(
            text.parse::<AxisDirection>(),
            Err(Error::InvalidAxisDirection { .. })
        ));
    }

    #[test]
    fn flipping_twice_is_identity() {
        let direction = AxisDirection::default();
        assert_eq!(direction.flipped(0).signs(), [1, -1, 1]);
        assert_eq!(direction.flipped(2).flipped(2), direction);
    }
}
