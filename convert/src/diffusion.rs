//! Diffusion weighting tables.
use itertools::Itertools;
use std::io::{Result as IoResult, Write};

/// Gradient vectors of a magnitude below this value are b0 markers.
pub const B0_THRESHOLD: f64 = 1e-6;

/// The b-values and gradient vectors of a diffusion weighted scan,
/// one entry per diffusion experiment.
#[derive(Debug, Clone, PartialEq)]
pub struct DiffusionTable {
    bvals: Vec<f64>,
    bvecs: Vec<[f64; 3]>,
}

impl DiffusionTable {
    /// Create a table,
    /// returning `None` if the lengths of both columns differ.
    pub fn new(bvals: Vec<f64>, bvecs: Vec<[f64; 3]>) -> Option<Self> {
        if bvals.len() != bvecs.len() {
            return None;
        }
        Some(DiffusionTable { bvals, bvecs })
    }

    pub fn bvals(&self) -> &[f64] {
        &self.bvals
    }

    pub fn bvecs(&self) -> &[[f64; 3]] {
        &self.bvecs
    }

    pub fn len(&self) -> usize {
        self.bvals.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bvals.is_empty()
    }

    /// Obtain a table with every gradient vector `g`
    /// replaced by `Rᵀ g` scaled to unit length,
    /// where `R` is the rotation of the image axes into world space.
    /// Vectors of negligible magnitude become the zero vector.
    pub fn normalised(&self, rotation: &[[f64; 3]; 3]) -> Self {
        let bvecs = self
            .bvecs
            .iter()
            .map(|g| {
                let mut rotated = [0.; 3];
                for (j, r) in rotated.iter_mut().enumerate() {
                    *r = (0..3).map(|i| rotation[i][j] * g[i]).sum();
                }
                normalise(rotated)
            })
            .collect();
        DiffusionTable {
            bvals: self.bvals.clone(),
            bvecs,
        }
    }

    /// Write the b-values in FSL layout: a single row.
    pub fn write_bvals(&self, mut to: impl Write) -> IoResult<()> {
        writeln!(to, "{}", self.bvals.iter().join(" "))
    }

    /// Write the gradient vectors in FSL layout:
    /// three rows holding the x, y and z components.
    pub fn write_bvecs(&self, mut to: impl Write) -> IoResult<()> {
        for axis in 0..3 {
            writeln!(to, "{}", self.bvecs.iter().map(|g| g[axis]).join(" "))?;
        }
        Ok(())
    }
}

/// Scale a vector to unit length,
/// or to the zero vector if its magnitude is negligible.
pub fn normalise(v: [f64; 3]) -> [f64; 3] {
    let norm = v.iter().map(|x| x * x).sum::<f64>().sqrt();
    if norm < B0_THRESHOLD {
        [0.; 3]
    } else {
        v.map(|x| x / norm)
    }
}
