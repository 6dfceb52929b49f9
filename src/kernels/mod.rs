// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

//! The kernel seam.
//!
//! Entry points validate and allocate; a [`Backend`] fills the buffers.  A backend sees inputs that
//! are already on its device and already batched, and output buffers that are already
//! zero-filled, so kernels may accumulate into them.

mod host;

pub use host::HostBackend;

use crate::{device::Device, error::Result, tensor::Tensor};
use common::PeriodicCell;

/// Radial cutoff applied to every neighbour contribution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cutoff {
    /// `0.5 * (cos(pi * r / rcut) + 1)`.
    Cosine,
    /// One below `rswitch`, then a cosine switch down to zero at `rcut`.
    Switch { rswitch: f64 },
}

impl Cutoff {
    /// Value and radial derivative of the cutoff at `r`.
    pub fn evaluate(&self, r: f64, rcut: f64) -> (f64, f64) {
        use std::f64::consts::PI;
        if r >= rcut {
            return (0.0, 0.0);
        }
        match *self {
            Cutoff::Cosine => {
                let x = PI * r / rcut;
                (0.5 * (x.cos() + 1.0), -0.5 * PI / rcut * x.sin())
            }
            Cutoff::Switch { rswitch } if r < rswitch => (1.0, 0.0),
            Cutoff::Switch { rswitch } => {
                let width = rcut - rswitch;
                let x = PI * (r - rswitch) / width;
                (0.5 * (x.cos() + 1.0), -0.5 * PI / width * x.sin())
            }
        }
    }
}

/// Inputs of the eGTO kernels, batched and validated.
#[derive(Debug, Clone, Copy)]
pub struct EgtoArgs<'a> {
    /// `(batch, atoms, 3)`
    pub coordinates: &'a Tensor<f32>,
    /// `(batch, atoms)`
    pub charges: &'a Tensor<f32>,
    /// `(nspecies,)`
    pub species: &'a Tensor<f32>,
    /// `(batch, atoms)`, index into `species`; negative for unknown elements.
    pub element_types: &'a Tensor<i32>,
    /// `(nblocks,)`
    pub block_atom_ids: &'a Tensor<i32>,
    /// `(nblocks,)`
    pub block_mol_ids: &'a Tensor<i32>,
    /// `(batch, atoms, max_neighbours)`, padded with `-1`.
    pub neighbourlist: &'a Tensor<i32>,
    /// `(batch, atoms)`
    pub nneighbours: &'a Tensor<i32>,
    /// `(nspecies, nspecies)`
    pub mbodylist: &'a Tensor<i32>,
    /// `(norbs, 3)`
    pub gto_components: &'a Tensor<f32>,
    /// `(norbs,)`
    pub gto_powers: &'a Tensor<i32>,
    /// `(norbs,)`
    pub orbital_weights: &'a Tensor<f32>,
    /// `(ngaussians,)`
    pub gridpoints: &'a Tensor<f32>,
    /// Per angular channel, `lmax + 1` entries.
    pub channel_weights: &'a [f64],
    /// Extra inverse-distance exponent per angular channel, `lmax + 1` entries.
    pub inv_factors: &'a [f64],
    pub eta: f64,
    pub lmax: usize,
    pub rcut: f64,
    pub cutoff: Cutoff,
    /// One cell per molecule, a single cell shared by all molecules, or `None` for open
    /// boundaries.
    pub cells: Option<&'a [PeriodicCell]>,
}

/// Inputs of the element-type classifier, batched and validated.
#[derive(Debug, Clone, Copy)]
pub struct ElementTypeArgs<'a> {
    /// `(batch, atoms, 3)`
    pub coordinates: &'a Tensor<f32>,
    /// `(batch, atoms)`
    pub charges: &'a Tensor<f32>,
    /// `(batch,)`
    pub natom_counts: &'a Tensor<i32>,
    /// `(nspecies,)`
    pub species: &'a Tensor<f32>,
}

/// A device able to run the eGTO kernels.
pub trait Backend: Send + Sync {
    fn name(&self) -> &str;

    /// The device every tensor argument must be resident on.
    fn device(&self) -> Device;

    /// Allocates a zero-filled `f32` buffer on [`Backend::device`].
    fn zeros_f32(&self, shape: &[usize]) -> Tensor<f32> {
        Tensor::zeros(shape, self.device())
    }

    /// Allocates a zero-filled `i32` buffer on [`Backend::device`].
    fn zeros_i32(&self, shape: &[usize]) -> Tensor<i32> {
        Tensor::zeros(shape, self.device())
    }

    /// Writes the index into `species` of every real atom's charge.
    fn element_types(&self, args: &ElementTypeArgs<'_>, element_types: &mut Tensor<i32>)
        -> Result<()>;

    /// Accumulates the representation into `output`, shape `(batch, atoms, repsize)`.
    fn egto(&self, args: &EgtoArgs<'_>, output: &mut Tensor<f32>) -> Result<()>;

    /// Accumulates the representation and its coordinate derivative, shape
    /// `(batch, atoms, atoms, 3, repsize)`.
    fn egto_derivative(
        &self,
        args: &EgtoArgs<'_>,
        output: &mut Tensor<f32>,
        derivative: &mut Tensor<f32>,
    ) -> Result<()>;
}


// End of File
