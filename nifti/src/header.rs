//! The NIfTI header and its binary layout.
//!
//! Both single-file layouts are supported:
//! NIfTI-1 (348 bytes, magic `n+1`)
//! and NIfTI-2 (540 bytes, magic `n+2`).
//! Headers are always written in little endian.
use crate::error::{DimensionTooLargeSnafu, Result, UnsupportedDimensionalitySnafu, WriteHeaderSnafu};
use byteordered::ByteOrdered;
use snafu::{ensure, ResultExt};
use std::io::{self, Write};

/// Spatial unit code for millimeters.
pub const UNITS_MM: u8 = 2;
/// Temporal unit code for seconds.
pub const UNITS_SEC: u8 = 8;

/// The maximum number of image dimensions.
pub const MAX_DIMENSIONS: usize = 7;

const MAGIC_V1: &[u8; 4] = b"n+1\0";
const MAGIC_V2: &[u8; 8] = b"n+2\0\r\n\x1a\n";

/// Length of the description field, including the terminating null byte.
const DESCRIP_LEN: usize = 80;

/// The version of the NIfTI format.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash)]
pub enum NiftiVersion {
    #[default]
    Nifti1,
    Nifti2,
}

impl NiftiVersion {
    /// Obtain the version from its number (1 or 2).
    pub fn from_number(number: u8) -> Option<Self> {
        match number {
            1 => Some(NiftiVersion::Nifti1),
            2 => Some(NiftiVersion::Nifti2),
            _ => None,
        }
    }

    /// The size of the header in bytes.
    pub fn header_size(self) -> usize {
        match self {
            NiftiVersion::Nifti1 => 348,
            NiftiVersion::Nifti2 => 540,
        }
    }

    /// The offset of the voxel data in a single-file image,
    /// after the header and the 4-byte extension flag.
    pub fn vox_offset(self) -> usize {
        self.header_size() + 4
    }
}

/// The sample types which can be written.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum DataType {
    Uint8,
    Int16,
    Int32,
    Float32,
    Float64,
}

impl DataType {
    /// The NIfTI `datatype` code.
    pub fn code(self) -> i16 {
        match self {
            DataType::Uint8 => 2,
            DataType::Int16 => 4,
            DataType::Int32 => 8,
            DataType::Float32 => 16,
            DataType::Float64 => 64,
        }
    }

    /// The number of bits per sample.
    pub fn bitpix(self) -> i16 {
        match self {
            DataType::Uint8 => 8,
            DataType::Int16 => 16,
            DataType::Int32 | DataType::Float32 => 32,
            DataType::Float64 => 64,
        }
    }
}

/// The rotation of an affine in quaternion form,
/// as stored in the qform fields of the header.
#[derive(Debug, Default, Copy, Clone, PartialEq)]
pub struct Quaternion {
    pub b: f64,
    pub c: f64,
    pub d: f64,
    /// `-1` if the third axis was negated to obtain a proper rotation,
    /// `1` otherwise.
    pub qfac: f64,
}

impl Quaternion {
    /// Derive the quaternion of the rotation part of an affine.
    ///
    /// The columns of the upper 3x3 block are scaled to unit length
    /// (a zero column becomes the corresponding unit vector)
    /// and are expected to be orthogonal.
    /// A left-handed basis is handled by negating the third column
    /// and reporting `qfac = -1`.
    #[allow(clippy::many_single_char_names)]
    pub fn from_affine(affine: &[[f64; 4]; 4]) -> Self {
        let mut r = [[0.; 3]; 3];
        for j in 0..3 {
            let norm = (0..3).map(|i| affine[i][j].powi(2)).sum::<f64>().sqrt();
            for (i, row) in r.iter_mut().enumerate() {
                row[j] = if norm > 0. {
                    affine[i][j] / norm
                } else if i == j {
                    1.
                } else {
                    0.
                };
            }
        }

        let qfac = if determinant3(&r) < 0. {
            for row in r.iter_mut() {
                row[2] = -row[2];
            }
            -1.
        } else {
            1.
        };

        let [[r11, r12, r13], [r21, r22, r23], [r31, r32, r33]] = r;
        let a = r11 + r22 + r33 + 1.;
        let (a, b, c, d) = if a > 0.5 {
            let a = 0.5 * a.sqrt();
            (
                a,
                0.25 * (r32 - r23) / a,
                0.25 * (r13 - r31) / a,
                0.25 * (r21 - r12) / a,
            )
        } else {
            let xd = 1. + r11 - (r22 + r33);
            let yd = 1. + r22 - (r11 + r33);
            let zd = 1. + r33 - (r11 + r22);
            if xd > 1. {
                let b = 0.5 * xd.sqrt();
                (
                    0.25 * (r32 - r23) / b,
                    b,
                    0.25 * (r12 + r21) / b,
                    0.25 * (r13 + r31) / b,
                )
            } else if yd > 1. {
                let c = 0.5 * yd.sqrt();
                (
                    0.25 * (r13 - r31) / c,
                    0.25 * (r12 + r21) / c,
                    c,
                    0.25 * (r23 + r32) / c,
                )
            } else {
                let d = 0.5 * zd.sqrt();
                (
                    0.25 * (r21 - r12) / d,
                    0.25 * (r13 + r31) / d,
                    0.25 * (r23 + r32) / d,
                    d,
                )
            }
        };

        // keep the real part non-negative
        let sign = if a < 0. { -1. } else { 1. };
        Quaternion {
            b: sign * b,
            c: sign * c,
            d: sign * d,
            qfac,
        }
    }
}

fn determinant3(m: &[[f64; 3]; 3]) -> f64 {
    m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
        - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
        + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
}

/// The fields of a single-file NIfTI header.
///
/// Fields which this writer never sets
/// (intent, calibration, slice timing, auxiliary file)
/// are written as zeros.
#[derive(Debug, Clone, PartialEq)]
pub struct NiftiHeader {
    /// Image dimensions, first axis varying fastest in the data.
    pub dim: Vec<usize>,
    pub datatype: DataType,
    /// Grid spacings, `pixdim[0]` holding the qfac.
    pub pixdim: [f64; 8],
    pub scl_slope: f64,
    pub scl_inter: f64,
    /// Combined spatial and temporal unit codes.
    pub xyzt_units: u8,
    pub descrip: String,
    pub qform_code: i16,
    pub sform_code: i16,
    /// Quaternion parameters b, c and d.
    pub quatern: [f64; 3],
    pub qoffset: [f64; 3],
    /// The first three rows of the sform affine.
    pub srow: [[f64; 4]; 3],
}

impl Default for NiftiHeader {
    fn default() -> Self {
        NiftiHeader {
            dim: vec![1],
            datatype: DataType::Uint8,
            pixdim: [1.; 8],
            scl_slope: 1.,
            scl_inter: 0.,
            xyzt_units: UNITS_MM | UNITS_SEC,
            descrip: String::new(),
            qform_code: 0,
            sform_code: 0,
            quatern: [0.; 3],
            qoffset: [0.; 3],
            srow: [[1., 0., 0., 0.], [0., 1., 0., 0.], [0., 0., 1., 0.]],
        }
    }
}

impl NiftiHeader {
    /// Set both the sform rows and the qform parameters
    /// from a voxel-to-world affine,
    /// along with the spatial grid spacings and the qfac.
    pub fn set_affine(&mut self, affine: &[[f64; 4]; 4]) {
        self.srow = [affine[0], affine[1], affine[2]];

        let quaternion = Quaternion::from_affine(affine);
        self.quatern = [quaternion.b, quaternion.c, quaternion.d];
        self.qoffset = [affine[0][3], affine[1][3], affine[2][3]];
        self.pixdim[0] = quaternion.qfac;
        for j in 0..3 {
            self.pixdim[j + 1] = (0..3).map(|i| affine[i][j].powi(2)).sum::<f64>().sqrt();
        }
    }

    /// The affine described by the qform fields of this header.
    #[allow(clippy::many_single_char_names)]
    pub fn qform_affine(&self) -> [[f64; 4]; 4] {
        let [b, c, d] = self.quatern;
        let a = (1. - b * b - c * c - d * d).max(0.).sqrt();
        let qfac = if self.pixdim[0] < 0. { -1. } else { 1. };
        let [i, j, k] = [self.pixdim[1], self.pixdim[2], self.pixdim[3] * qfac];

        [
            [
                (a * a + b * b - c * c - d * d) * i,
                2. * (b * c - a * d) * j,
                2. * (b * d + a * c) * k,
                self.qoffset[0],
            ],
            [
                2. * (b * c + a * d) * i,
                (a * a - b * b + c * c - d * d) * j,
                2. * (c * d - a * b) * k,
                self.qoffset[1],
            ],
            [
                2. * (b * d - a * c) * i,
                2. * (c * d + a * b) * j,
                (a * a - b * b - c * c + d * d) * k,
                self.qoffset[2],
            ],
            [0., 0., 0., 1.],
        ]
    }

    /// Check that the image dimensions can be stored
    /// in a header of the given version.
    pub fn validate(&self, version: NiftiVersion) -> Result<()> {
        ensure!(
            !self.dim.is_empty() && self.dim.len() <= MAX_DIMENSIONS,
            UnsupportedDimensionalitySnafu {
                dimensions: self.dim.len()
            }
        );
        if version == NiftiVersion::Nifti1 {
            for (axis, &size) in self.dim.iter().enumerate() {
                ensure!(
                    size <= i16::MAX as usize,
                    DimensionTooLargeSnafu { axis, size }
                );
            }
        }
        Ok(())
    }

    /// Write the header in the layout of the given version.
    ///
    /// The 4-byte extension flag is not part of the header
    /// and must be written separately.
    pub fn write_to<W: Write>(&self, version: NiftiVersion, to: W) -> Result<()> {
        self.validate(version)?;
        let written = match version {
            NiftiVersion::Nifti1 => self.write_v1(to),
            NiftiVersion::Nifti2 => self.write_v2(to),
        };
        written.context(WriteHeaderSnafu)
    }

    /// Dimensions in header form: the number of dimensions
    /// followed by seven sizes, unused ones set to 1.
    fn dim_field(&self) -> [usize; 8] {
        let mut dim = [1; 8];
        dim[0] = self.dim.len();
        dim[1..=self.dim.len()].copy_from_slice(&self.dim);
        dim
    }

    fn write_v1<W: Write>(&self, to: W) -> io::Result<()> {
        let mut to = ByteOrdered::le(to);

        to.write_i32(NiftiVersion::Nifti1.header_size() as i32)?;
        // data_type, db_name, extents, session_error
        to.write_all(&[0; 10 + 18 + 4 + 2])?;
        to.write_u8(b'r')?;
        // dim_info
        to.write_u8(0)?;
        for d in self.dim_field() {
            to.write_i16(d as i16)?;
        }
        // intent_p1, intent_p2, intent_p3, intent_code
        to.write_all(&[0; 3 * 4 + 2])?;
        to.write_i16(self.datatype.code())?;
        to.write_i16(self.datatype.bitpix())?;
        // slice_start
        to.write_i16(0)?;
        for p in self.pixdim {
            to.write_f32(p as f32)?;
        }
        to.write_f32(NiftiVersion::Nifti1.vox_offset() as f32)?;
        to.write_f32(self.scl_slope as f32)?;
        to.write_f32(self.scl_inter as f32)?;
        // slice_end, slice_code
        to.write_all(&[0; 3])?;
        to.write_u8(self.xyzt_units)?;
        // cal_max, cal_min, slice_duration, toffset, glmax, glmin
        to.write_all(&[0; 6 * 4])?;
        write_description(&mut to, &self.descrip)?;
        // aux_file
        to.write_all(&[0; 24])?;
        to.write_i16(self.qform_code)?;
        to.write_i16(self.sform_code)?;
        for q in self.quatern.iter().chain(&self.qoffset) {
            to.write_f32(*q as f32)?;
        }
        for s in self.srow.iter().flatten() {
            to.write_f32(*s as f32)?;
        }
        // intent_name
        to.write_all(&[0; 16])?;
        to.write_all(MAGIC_V1)?;
        Ok(())
    }

    fn write_v2<W: Write>(&self, to: W) -> io::Result<()> {
        let mut to = ByteOrdered::le(to);

        to.write_i32(NiftiVersion::Nifti2.header_size() as i32)?;
        to.write_all(MAGIC_V2)?;
        to.write_i16(self.datatype.code())?;
        to.write_i16(self.datatype.bitpix())?;
        for d in self.dim_field() {
            to.write_i64(d as i64)?;
        }
        // intent_p1, intent_p2, intent_p3
        to.write_all(&[0; 3 * 8])?;
        for p in self.pixdim {
            to.write_f64(p)?;
        }
        to.write_i64(NiftiVersion::Nifti2.vox_offset() as i64)?;
        to.write_f64(self.scl_slope)?;
        to.write_f64(self.scl_inter)?;
        // cal_max, cal_min, slice_duration, toffset, slice_start, slice_end
        to.write_all(&[0; 6 * 8])?;
        write_description(&mut to, &self.descrip)?;
        // aux_file
        to.write_all(&[0; 24])?;
        to.write_i32(self.qform_code.into())?;
        to.write_i32(self.sform_code.into())?;
        for q in self.quatern.iter().chain(&self.qoffset) {
            to.write_f64(*q)?;
        }
        for s in self.srow.iter().flatten() {
            to.write_f64(*s)?;
        }
        // slice_code
        to.write_i32(0)?;
        to.write_i32(self.xyzt_units.into())?;
        // intent_code, intent_name, dim_info, unused_str
        to.write_all(&[0; 4 + 16 + 1 + 15])?;
        Ok(())
    }
}

/// Write the description as a null-padded field,
/// truncated so that a terminating null byte always remains.
fn write_description<W: Write>(mut to: W, descrip: &str) -> io::Result<()> {
    let mut field = [0; DESCRIP_LEN];
    let len = descrip.len().min(DESCRIP_LEN - 1);
    field[..len].copy_from_slice(&descrip.as_bytes()[..len]);
    to.write_all(&field)
}
