// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

use thiserror::Error;
use ultraviolet::{DMat3, DVec3};

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum CellError {
    #[error("lattice vectors are linearly dependent (determinant {0})")]
    Singular(f64),
}

/// A periodic simulation cell.  The columns of the lattice matrix `H` are the three lattice
/// vectors, so a Cartesian displacement `d` has fractional coordinates `s = H^-1 d`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PeriodicCell {
    lattice: DMat3,
    inverse: DMat3,
}

impl PeriodicCell {
    /// A cell spanned by the lattice vectors `a`, `b` and `c`, given in that order.
    pub fn new(vectors: [[f64; 3]; 3]) -> Result<Self, CellError> {
        let [a, b, c] = vectors.map(|[x, y, z]| DVec3::new(x, y, z));
        let lattice = DMat3::new(a, b, c);
        let det = lattice.determinant();
        if !det.is_finite() || det.abs() < f64::EPSILON {
            return Err(CellError::Singular(det));
        }
        Ok(Self {
            lattice,
            inverse: lattice.inversed(),
        })
    }

    /// An orthorhombic cell with the given side lengths.
    pub fn orthorhombic(a: f64, b: f64, c: f64) -> Result<Self, CellError> {
        Self::new([[a, 0.0, 0.0], [0.0, b, 0.0], [0.0, 0.0, c]])
    }

    /// Lattice vectors as matrix columns.
    pub fn lattice(&self) -> DMat3 {
        self.lattice
    }

    pub fn inverse(&self) -> DMat3 {
        self.inverse
    }

    /// Maps a displacement onto its nearest periodic image.  Exact for displacements shorter than
    /// half the smallest cell height.
    pub fn minimum_image(&self, displacement: DVec3) -> DVec3 {
        let mut fractional = self.inverse * displacement;
        fractional.x -= fractional.x.round();
        fractional.y -= fractional.y.round();
        fractional.z -= fractional.z.round();
        self.lattice * fractional
    }
}


// End of File
