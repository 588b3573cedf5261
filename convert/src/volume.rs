//! Assembly of the image volume from the raw `2dseq` samples.
use bruker2nifti_nifti::{NiftiHeader, NiftiVersion, WriteOptions};
use byteordered::{ByteOrdered, Endianness};
use ndarray::{ArrayD, IxDyn, ShapeBuilder};
use num_traits::AsPrimitive;
use snafu::{ensure, Backtrace, OptionExt, ResultExt, Snafu};
use std::io::{self, Read};
use std::path::{Path, PathBuf};
use tracing::debug;

#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Could not read raw data file {}", path.display()))]
    ReadRawData {
        path: PathBuf,
        source: io::Error,
        backtrace: Backtrace,
    },

    /// The raw data does not hold exactly one sample per voxel.
    #[snafu(display(
        "Raw data holds {} bytes ({} samples) but {} samples were expected",
        bytes,
        found,
        expected
    ))]
    SizeMismatch {
        expected: usize,
        found: usize,
        bytes: usize,
        backtrace: Backtrace,
    },

    #[snafu(display("Volume of shape {:?} is too large to address", shape))]
    TooLarge { shape: Vec<usize>, backtrace: Backtrace },

    #[snafu(display("Could not decode samples"))]
    DecodeSamples {
        source: io::Error,
        backtrace: Backtrace,
    },

    #[snafu(display("Invalid shape {:?} for the volume", shape))]
    InvalidShape {
        shape: Vec<usize>,
        source: ndarray::ShapeError,
        backtrace: Backtrace,
    },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// The type of the samples in a raw data file.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum SampleType {
    /// `_8BIT_UNSGN_INT`
    U8,
    /// `_16BIT_SGN_INT`
    I16,
    /// `_32BIT_SGN_INT`
    I32,
    /// `_32BIT_FLOAT`
    F32,
}

impl SampleType {
    /// Obtain the sample type from a ParaVision word type name.
    pub fn from_word_type(word_type: &str) -> Option<Self> {
        match word_type {
            "_8BIT_UNSGN_INT" => Some(SampleType::U8),
            "_16BIT_SGN_INT" => Some(SampleType::I16),
            "_32BIT_SGN_INT" => Some(SampleType::I32),
            "_32BIT_FLOAT" => Some(SampleType::F32),
            _ => None,
        }
    }

    /// The ParaVision word type name.
    pub fn word_type(self) -> &'static str {
        match self {
            SampleType::U8 => "_8BIT_UNSGN_INT",
            SampleType::I16 => "_16BIT_SGN_INT",
            SampleType::I32 => "_32BIT_SGN_INT",
            SampleType::F32 => "_32BIT_FLOAT",
        }
    }

    /// The size of a sample in bytes.
    pub fn width(self) -> usize {
        match self {
            SampleType::U8 => 1,
            SampleType::I16 => 2,
            SampleType::I32 | SampleType::F32 => 4,
        }
    }
}

/// Description of a linear intensity transformation,
/// defined by a _slope_ and an _offset_.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct Rescale {
    /// the data slope
    pub slope: f64,
    /// the data offset
    pub offset: f64,
}

impl Default for Rescale {
    fn default() -> Self {
        Rescale::new(1., 0.)
    }
}

impl Rescale {
    /// Create a new rescale function.
    #[inline]
    pub fn new(slope: f64, offset: f64) -> Self {
        Rescale { slope, offset }
    }

    /// Apply the rescale function to a value.
    #[inline]
    pub fn apply(&self, value: f64) -> f64 {
        self.slope * value + self.offset
    }

    /// Whether applying the function leaves every value unchanged.
    pub fn is_identity(&self) -> bool {
        self.slope == 1. && self.offset == 0.
    }
}

/// The samples of a volume,
/// indexed by the spatial axes followed by the volume index.
#[derive(Debug, Clone, PartialEq)]
pub enum VolumeData {
    U8(ArrayD<u8>),
    I16(ArrayD<i16>),
    I32(ArrayD<i32>),
    F32(ArrayD<f32>),
    /// Samples after intensity correction.
    F64(ArrayD<f64>),
}

macro_rules! dispatch {
    ($volume: expr, $array: ident => $e: expr) => {
        match $volume {
            VolumeData::U8($array) => $e,
            VolumeData::I16($array) => $e,
            VolumeData::I32($array) => $e,
            VolumeData::F32($array) => $e,
            VolumeData::F64($array) => $e,
        }
    };
}

impl VolumeData {
    pub fn shape(&self) -> &[usize] {
        dispatch!(self, a => a.shape())
    }

    /// The total number of samples.
    pub fn len(&self) -> usize {
        dispatch!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Apply an intensity rescale to all samples.
    ///
    /// The identity rescale returns the volume untouched,
    /// any other one produces 64-bit floating point samples.
    /// No clamping takes place.
    pub fn rescale(self, rescale: Rescale) -> VolumeData {
        if rescale.is_identity() {
            return self;
        }
        VolumeData::F64(dispatch!(self, a => rescaled(&a, rescale)))
    }

    /// Copy all samples into a 64-bit floating point array.
    pub fn to_f64(&self) -> ArrayD<f64> {
        dispatch!(self, a => a.mapv(AsPrimitive::<f64>::as_))
    }

    /// Write the volume as a NIfTI image.
    pub fn write_nifti(
        &self,
        path: &Path,
        header: &NiftiHeader,
        version: NiftiVersion,
    ) -> bruker2nifti_nifti::Result<()> {
        let options = WriteOptions::new().version(version);
        dispatch!(self, a => options.write(path, header, a.view()))
    }
}

fn rescaled<T>(array: &ArrayD<T>, rescale: Rescale) -> ArrayD<f64>
where
    T: AsPrimitive<f64>,
{
    array.mapv(|v| rescale.apply(v.as_()))
}

/// A raw sample which can be read in either byte order.
trait RawSample: Sized {
    fn read_from<R: Read>(reader: &mut ByteOrdered<R, Endianness>) -> io::Result<Self>;
}

impl RawSample for u8 {
    fn read_from<R: Read>(reader: &mut ByteOrdered<R, Endianness>) -> io::Result<Self> {
        reader.read_u8()
    }
}

impl RawSample for i16 {
    fn read_from<R: Read>(reader: &mut ByteOrdered<R, Endianness>) -> io::Result<Self> {
        reader.read_i16()
    }
}

impl RawSample for i32 {
    fn read_from<R: Read>(reader: &mut ByteOrdered<R, Endianness>) -> io::Result<Self> {
        reader.read_i32()
    }
}

impl RawSample for f32 {
    fn read_from<R: Read>(reader: &mut ByteOrdered<R, Endianness>) -> io::Result<Self> {
        reader.read_f32()
    }
}

/// Read the raw data file of a reconstruction into a volume.
///
/// `shape` lists the image dimensions,
/// the first axis varying fastest in the file.
pub fn read_volume(
    path: &Path,
    shape: &[usize],
    sample_type: SampleType,
    endianness: Endianness,
) -> Result<VolumeData> {
    let bytes = std::fs::read(path).context(ReadRawDataSnafu { path })?;
    debug!("Read {} bytes from {}", bytes.len(), path.display());
    decode_volume(&bytes, shape, sample_type, endianness)
}

/// Decode a volume from raw bytes.
///
/// The byte count must match the shape exactly.
pub fn decode_volume(
    bytes: &[u8],
    shape: &[usize],
    sample_type: SampleType,
    endianness: Endianness,
) -> Result<VolumeData> {
    let width = sample_type.width();
    let expected = shape
        .iter()
        .try_fold(1usize, |count, &d| count.checked_mul(d))
        .filter(|count| count.checked_mul(width).is_some())
        .context(TooLargeSnafu { shape })?;
    ensure!(
        bytes.len() == expected * width,
        SizeMismatchSnafu {
            expected,
            found: bytes.len() / width,
            bytes: bytes.len(),
        }
    );

    Ok(match sample_type {
        SampleType::U8 => VolumeData::U8(decode_array(bytes, shape, expected, endianness)?),
        SampleType::I16 => VolumeData::I16(decode_array(bytes, shape, expected, endianness)?),
        SampleType::I32 => VolumeData::I32(decode_array(bytes, shape, expected, endianness)?),
        SampleType::F32 => VolumeData::F32(decode_array(bytes, shape, expected, endianness)?),
    })
}

fn decode_array<T: RawSample>(
    bytes: &[u8],
    shape: &[usize],
    count: usize,
    endianness: Endianness,
) -> Result<ArrayD<T>> {
    let mut reader = ByteOrdered::runtime(bytes, endianness);
    let samples = (0..count)
        .map(|_| T::read_from(&mut reader))
        .collect::<io::Result<Vec<T>>>()
        .context(DecodeSamplesSnafu)?;
    ArrayD::from_shape_vec(IxDyn(shape).f(), samples).context(InvalidShapeSnafu { shape })
}
