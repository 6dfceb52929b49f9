// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

//! Output sizing and batch normalisation.

use crate::{
    error::{EgtoError, Result},
    tensor::{Scalar, Tensor},
};
use std::borrow::Cow;

/// Number of two-body channels: every unordered species pair, self-pairs included,
/// i.e. `nspecies * (nspecies + 1) / 2`.
pub fn nmbody(nspecies: usize) -> usize {
    nspecies * (nspecies + 1) / 2
}

/// Width of one atom's representation: `nmbody * (lmax + 1) * ngaussians`.
pub fn repsize(nspecies: usize, lmax: usize, ngaussians: usize) -> usize {
    nmbody(nspecies) * (lmax + 1) * ngaussians
}

/// Inserts a leading batch dimension when `tensor` has `rank - 1` dimensions.
pub fn promote<T: Scalar>(tensor: &Tensor<T>, rank: usize) -> Cow<'_, Tensor<T>> {
    if tensor.dim() + 1 == rank {
        Cow::Owned(tensor.unsqueeze(0))
    } else {
        Cow::Borrowed(tensor)
    }
}

/// Coordinates and charges with a guaranteed leading batch dimension.
#[derive(Debug)]
pub struct Batch<'a> {
    pub coordinates: Cow<'a, Tensor<f32>>,
    pub charges: Cow<'a, Tensor<f32>>,
    pub nbatch: usize,
    pub natoms: usize,
}

/// Accepts `(atoms, 3)` / `(atoms,)` or `(batch, atoms, 3)` / `(batch, atoms)` inputs.  Unbatched
/// inputs become a batch of one.
pub fn normalize_batch<'a>(
    coordinates: &'a Tensor<f32>,
    charges: &'a Tensor<f32>,
) -> Result<Batch<'a>> {
    let coordinates = promote(coordinates, 3);
    let charges = promote(charges, 2);

    if coordinates.dim() != 3 || coordinates.size(2) != 3 {
        return Err(EgtoError::shape(
            "coordinates",
            "(batch, atoms, 3) or (atoms, 3)",
            coordinates.shape(),
        ));
    }
    let (nbatch, natoms) = (coordinates.size(0), coordinates.size(1));
    expect_shape("charges", &*charges, &[nbatch, natoms])?;

    Ok(Batch {
        coordinates,
        charges,
        nbatch,
        natoms,
    })
}

pub(crate) fn expect_shape<T: Scalar>(
    argument: &'static str,
    tensor: &Tensor<T>,
    expected: &[usize],
) -> Result<()> {
    if tensor.shape() == expected {
        Ok(())
    } else {
        Err(EgtoError::shape(argument, format!("{expected:?}"), tensor.shape()))
    }
}

pub(crate) fn expect_rank<T: Scalar>(
    argument: &'static str,
    tensor: &Tensor<T>,
    rank: usize,
) -> Result<()> {
    if tensor.dim() == rank {
        Ok(())
    } else {
        Err(EgtoError::shape(argument, format!("a rank {rank} tensor"), tensor.shape()))
    }
}


// End of File
