//! The voxel-to-world transform of a scan.
use crate::metadata::ScanMetadata;
use crate::options::AxisDirection;
use snafu::{ensure, Backtrace, Snafu};

/// Axis vectors shorter than this have no usable direction.
const NORMAL_THRESHOLD: f64 = 1e-6;
/// The transform determinant must be at least this large in magnitude.
const DETERMINANT_THRESHOLD: f64 = 1e-9;

#[derive(Debug, Snafu)]
#[non_exhaustive]
#[snafu(visibility(pub(crate)))]
pub enum Error {
    #[snafu(display("Degenerate slice geometry: {}", detail))]
    DegenerateGeometry { detail: String, backtrace: Backtrace },
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A 4x4 affine mapping voxel indices to world coordinates in millimeters,
/// together with the NIfTI codes under which it is stored.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialTransform {
    affine: [[f64; 4]; 4],
    qform_code: u8,
    sform_code: u8,
    axis_direction: AxisDirection,
}

fn cross(a: [f64; 3], b: [f64; 3]) -> [f64; 3] {
    [
        a[1] * b[2] - a[2] * b[1],
        a[2] * b[0] - a[0] * b[2],
        a[0] * b[1] - a[1] * b[0],
    ]
}

fn dot(a: [f64; 3], b: [f64; 3]) -> f64 {
    a[0] * b[0] + a[1] * b[1] + a[2] * b[2]
}

fn norm(v: [f64; 3]) -> f64 {
    dot(v, v).sqrt()
}

/// Scale a vector to unit length,
/// or `None` if it is too short to have a direction.
fn unit(v: [f64; 3]) -> Option<[f64; 3]> {
    let length = norm(v);
    if length < NORMAL_THRESHOLD {
        None
    } else {
        Some(v.map(|x| x / length))
    }
}

impl SpatialTransform {
    /// Build the transform of a scan.
    ///
    /// The columns of the affine are an orthonormal basis
    /// built from the first two image axes:
    /// the first axis, the second axis made orthogonal to it,
    /// and their cross product,
    /// each scaled by the voxel spacing along that axis
    /// and by the sign of the axis in `axis_direction`.
    /// The translation is the position of the first voxel.
    pub fn build(
        metadata: &ScanMetadata,
        axis_direction: AxisDirection,
        qform_code: u8,
        sform_code: u8,
    ) -> Result<Self> {
        let [v1, v2] = metadata.orientation;
        let v1 = unit(v1).ok_or_else(|| {
            DegenerateGeometrySnafu {
                detail: format!("orientation vector {:?} has no length", v1),
            }
            .build()
        })?;
        // remove the component of the second axis along the first
        let along = dot(v1, v2);
        let v2 = unit([
            v2[0] - along * v1[0],
            v2[1] - along * v1[1],
            v2[2] - along * v1[2],
        ])
        .ok_or_else(|| {
            DegenerateGeometrySnafu {
                detail: format!("orientation vectors {:?} and {:?} are parallel", v1, v2),
            }
            .build()
        })?;
        let v3 = cross(v1, v2);

        let signs = axis_direction.factors();
        let mut affine = [
            [0., 0., 0., metadata.position[0]],
            [0., 0., 0., metadata.position[1]],
            [0., 0., 0., metadata.position[2]],
            [0., 0., 0., 1.],
        ];
        for (j, column) in [v1, v2, v3].iter().enumerate() {
            for (i, row) in affine.iter_mut().take(3).enumerate() {
                row[j] = column[i] * metadata.spacing[j] * signs[j];
            }
        }

        let transform = SpatialTransform {
            affine,
            qform_code,
            sform_code,
            axis_direction,
        };
        let determinant = transform.determinant();
        ensure!(
            determinant.abs() >= DETERMINANT_THRESHOLD,
            DegenerateGeometrySnafu {
                detail: format!("transform determinant {} is too small", determinant),
            }
        );
        Ok(transform)
    }

    pub fn affine(&self) -> &[[f64; 4]; 4] {
        &self.affine
    }

    pub fn qform_code(&self) -> u8 {
        self.qform_code
    }

    pub fn sform_code(&self) -> u8 {
        self.sform_code
    }

    /// The axis signs which were applied to the columns.
    pub fn axis_direction(&self) -> AxisDirection {
        self.axis_direction
    }

    /// The determinant of the upper 3x3 block.
    pub fn determinant(&self) -> f64 {
        let m = &self.affine;
        m[0][0] * (m[1][1] * m[2][2] - m[1][2] * m[2][1])
            - m[0][1] * (m[1][0] * m[2][2] - m[1][2] * m[2][0])
            + m[0][2] * (m[1][0] * m[2][1] - m[1][1] * m[2][0])
    }

    /// The upper 3x3 block with every column scaled to unit length,
    /// axis signs included.
    pub fn rotation(&self) -> [[f64; 3]; 3] {
        let mut rotation = [[0.; 3]; 3];
        for j in 0..3 {
            let length = norm([self.affine[0][j], self.affine[1][j], self.affine[2][j]]);
            for (i, row) in rotation.iter_mut().enumerate() {
                row[j] = self.affine[i][j] / length;
            }
        }
        rotation
    }
}
