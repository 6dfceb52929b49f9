// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

//! The eGTO entry points: validate placement, normalise shapes, size and allocate the outputs,
//! then hand everything to a [`Backend`].

use crate::{
    device::Device,
    error::{EgtoError, Result},
    kernels::{Backend, Cutoff, EgtoArgs, ElementTypeArgs},
    shape::{self, expect_rank, expect_shape, normalize_batch, promote},
    tensor::Tensor,
    validate::{require_device, tensor_devices},
};
use common::PeriodicCell;

/// Result of an eGTO evaluation.
#[derive(Debug, Clone, PartialEq)]
pub struct EgtoOutput {
    /// `(batch, atoms, repsize)`
    pub representation: Tensor<f32>,
    /// `(batch, atoms, atoms, 3, repsize)`, present when gradients were requested.
    pub derivative: Option<Tensor<f32>>,
}

impl EgtoOutput {
    /// The outputs in positional order, as returned across the module boundary.
    pub fn into_vec(self) -> Vec<Tensor<f32>> {
        std::iter::once(self.representation)
            .chain(self.derivative)
            .collect()
    }
}

/// Every input of an eGTO evaluation.  [`get_egto`] and [`get_egto_rswitch`] fill this in with
/// unit channel weights and inverse factors; the [`ElementalGto`](crate::ElementalGto) calculator
/// sets them from its configuration.
#[derive(Debug, Clone, Copy)]
pub struct EgtoRequest<'a> {
    pub coordinates: &'a Tensor<f32>,
    pub charges: &'a Tensor<f32>,
    pub species: &'a Tensor<f32>,
    pub element_types: &'a Tensor<i32>,
    pub block_atom_ids: &'a Tensor<i32>,
    pub block_mol_ids: &'a Tensor<i32>,
    pub neighbourlist: &'a Tensor<i32>,
    pub nneighbours: &'a Tensor<i32>,
    pub mbodylist: &'a Tensor<i32>,
    pub gto_components: &'a Tensor<f32>,
    pub orbital_weights: &'a Tensor<f32>,
    pub gto_powers: &'a Tensor<i32>,
    pub gridpoints: &'a Tensor<f32>,
    pub eta: f32,
    pub lmax: i32,
    pub rcut: f32,
    pub cutoff: Cutoff,
    /// One weight per angular channel; all ones when `None`.
    pub channel_weights: Option<&'a [f64]>,
    /// One inverse-distance exponent per angular channel; all ones when `None`.
    pub inv_factors: Option<&'a [f64]>,
    pub cells: Option<&'a [PeriodicCell]>,
}

impl<'a> EgtoRequest<'a> {
    /// Runs the request on `backend`.  Device placement is checked before anything else, so a
    /// misplaced tensor never causes an allocation.
    pub fn compute(&self, backend: &dyn Backend, gradients: bool) -> Result<EgtoOutput> {
        require_device(
            backend.device(),
            tensor_devices!(self;
                coordinates,
                charges,
                species,
                element_types,
                block_atom_ids,
                block_mol_ids,
                neighbourlist,
                nneighbours,
                mbodylist,
                gto_components,
                orbital_weights,
                gto_powers,
                gridpoints,
            ),
        )?;

        let lmax = usize::try_from(self.lmax)
            .map_err(|_| EgtoError::parameter("lmax", format!("{} is negative", self.lmax)))?;
        let eta = positive("eta", self.eta)?;
        let rcut = positive("rcut", self.rcut)?;
        if let Cutoff::Switch { rswitch } = self.cutoff {
            if !(0.0..rcut).contains(&rswitch) {
                return Err(EgtoError::parameter(
                    "rswitch",
                    format!("{rswitch} is outside [0, {rcut})"),
                ));
            }
        }

        // Pad a batch dimension so the kernels only ever see batched tensors.
        let batch = normalize_batch(self.coordinates, self.charges)?;
        let (nbatch, natoms) = (batch.nbatch, batch.natoms);
        let element_types = promote(self.element_types, 2);
        let neighbourlist = promote(self.neighbourlist, 3);
        let nneighbours = promote(self.nneighbours, 2);
        expect_shape("element_types", &*element_types, &[nbatch, natoms])?;
        expect_shape("nneighbours", &*nneighbours, &[nbatch, natoms])?;
        expect_rank("neighbourlist", &*neighbourlist, 3)?;
        if neighbourlist.shape()[..2] != [nbatch, natoms] {
            return Err(EgtoError::shape(
                "neighbourlist",
                format!("({nbatch}, {natoms}, max_neighbours)"),
                neighbourlist.shape(),
            ));
        }

        expect_rank("mbodylist", self.mbodylist, 2)?;
        let nspecies = self.mbodylist.size(0);
        if nspecies == 0 || self.mbodylist.size(1) != nspecies {
            return Err(EgtoError::shape(
                "mbodylist",
                "(nspecies, nspecies) with nspecies >= 1",
                self.mbodylist.shape(),
            ));
        }
        expect_shape("species", self.species, &[nspecies])?;

        let norbs = self.gto_powers.size(0);
        expect_shape("gto_powers", self.gto_powers, &[norbs])?;
        expect_shape("gto_components", self.gto_components, &[norbs, 3])?;
        expect_shape("orbital_weights", self.orbital_weights, &[norbs])?;

        expect_rank("gridpoints", self.gridpoints, 1)?;
        let ngaussians = self.gridpoints.size(0);
        if ngaussians == 0 {
            return Err(EgtoError::shape(
                "gridpoints",
                "at least one Gaussian",
                self.gridpoints.shape(),
            ));
        }

        expect_rank("block_atom_ids", self.block_atom_ids, 1)?;
        expect_shape("block_mol_ids", self.block_mol_ids, self.block_atom_ids.shape())?;

        let unit = vec![1.0; lmax + 1];
        let channel_weights = per_channel("channel_weights", self.channel_weights, &unit)?;
        let inv_factors = per_channel("inv_factors", self.inv_factors, &unit)?;

        let repsize = shape::repsize(nspecies, lmax, ngaussians);
        log::debug!(
            "eGTO request: {nbatch} x {natoms} atoms, {nspecies} species, lmax {lmax}, \
             {ngaussians} gaussians -> repsize {repsize} (gradients: {gradients})"
        );

        let args = EgtoArgs {
            coordinates: &batch.coordinates,
            charges: &batch.charges,
            species: self.species,
            element_types: &element_types,
            block_atom_ids: self.block_atom_ids,
            block_mol_ids: self.block_mol_ids,
            neighbourlist: &neighbourlist,
            nneighbours: &nneighbours,
            mbodylist: self.mbodylist,
            gto_components: self.gto_components,
            gto_powers: self.gto_powers,
            orbital_weights: self.orbital_weights,
            gridpoints: self.gridpoints,
            channel_weights,
            inv_factors,
            eta,
            lmax,
            rcut,
            cutoff: self.cutoff,
            cells: self.cells,
        };

        let mut representation = backend.zeros_f32(&[nbatch, natoms, repsize]);
        if gradients {
            let mut derivative = backend.zeros_f32(&[nbatch, natoms, natoms, 3, repsize]);
            backend.egto_derivative(&args, &mut representation, &mut derivative)?;
            Ok(EgtoOutput {
                representation,
                derivative: Some(derivative),
            })
        } else {
            backend.egto(&args, &mut representation)?;
            Ok(EgtoOutput {
                representation,
                derivative: None,
            })
        }
    }
}

fn positive(name: &'static str, value: f32) -> Result<f64> {
    if value.is_finite() && value > 0.0 {
        Ok(f64::from(value))
    } else {
        Err(EgtoError::parameter(name, format!("{value} is not a positive number")))
    }
}

fn per_channel<'a>(
    name: &'static str,
    values: Option<&'a [f64]>,
    default: &'a [f64],
) -> Result<&'a [f64]> {
    match values {
        None => Ok(default),
        Some(values) if values.len() == default.len() => Ok(values),
        Some(values) => Err(EgtoError::parameter(
            name,
            format!("{} entries for {} angular channels", values.len(), default.len()),
        )),
    }
}

/// Elemental GTO representation, with its coordinate derivative when `gradients` is set.
///
/// `coordinates` is `(batch, atoms, 3)` or `(atoms, 3)`; the other per-atom tensors follow the
/// same batching.  Every tensor must live on `backend.device()`.
#[allow(clippy::too_many_arguments)]
pub fn get_egto(
    backend: &dyn Backend,
    coordinates: &Tensor<f32>,
    charges: &Tensor<f32>,
    species: &Tensor<f32>,
    element_types: &Tensor<i32>,
    block_atom_ids: &Tensor<i32>,
    block_mol_ids: &Tensor<i32>,
    neighbourlist: &Tensor<i32>,
    nneighbours: &Tensor<i32>,
    mbodylist: &Tensor<i32>,
    gto_components: &Tensor<f32>,
    orbital_weights: &Tensor<f32>,
    gto_powers: &Tensor<i32>,
    gridpoints: &Tensor<f32>,
    eta: f32,
    lmax: i32,
    rcut: f32,
    gradients: bool,
) -> Result<EgtoOutput> {
    EgtoRequest {
        coordinates,
        charges,
        species,
        element_types,
        block_atom_ids,
        block_mol_ids,
        neighbourlist,
        nneighbours,
        mbodylist,
        gto_components,
        orbital_weights,
        gto_powers,
        gridpoints,
        eta,
        lmax,
        rcut,
        cutoff: Cutoff::Cosine,
        channel_weights: None,
        inv_factors: None,
        cells: None,
    }
    .compute(backend, gradients)
}

/// [`get_egto`] with a switching cutoff that stays at one up to `rswitch`.
#[allow(clippy::too_many_arguments)]
pub fn get_egto_rswitch(
    backend: &dyn Backend,
    coordinates: &Tensor<f32>,
    charges: &Tensor<f32>,
    species: &Tensor<f32>,
    element_types: &Tensor<i32>,
    block_atom_ids: &Tensor<i32>,
    block_mol_ids: &Tensor<i32>,
    neighbourlist: &Tensor<i32>,
    nneighbours: &Tensor<i32>,
    mbodylist: &Tensor<i32>,
    gto_components: &Tensor<f32>,
    orbital_weights: &Tensor<f32>,
    gto_powers: &Tensor<i32>,
    gridpoints: &Tensor<f32>,
    eta: f32,
    lmax: i32,
    rcut: f32,
    rswitch: f32,
    gradients: bool,
) -> Result<EgtoOutput> {
    EgtoRequest {
        coordinates,
        charges,
        species,
        element_types,
        block_atom_ids,
        block_mol_ids,
        neighbourlist,
        nneighbours,
        mbodylist,
        gto_components,
        orbital_weights,
        gto_powers,
        gridpoints,
        eta,
        lmax,
        rcut,
        cutoff: Cutoff::Switch {
            rswitch: f64::from(rswitch),
        },
        channel_weights: None,
        inv_factors: None,
        cells: None,
    }
    .compute(backend, gradients)
}

/// Index into `species` of every real atom, shape `(batch, atoms)`.  Atoms past
/// `natom_counts[b]` stay zero; atoms whose charge matches no species get `-1`.
pub fn get_element_types(
    backend: &dyn Backend,
    coordinates: &Tensor<f32>,
    charges: &Tensor<f32>,
    natom_counts: &Tensor<i32>,
    species: &Tensor<f32>,
) -> Result<Tensor<i32>> {
    let device: Device = backend.device();
    require_device(
        device,
        [
            ("coordinates", coordinates.device()),
            ("charges", charges.device()),
            ("natom_counts", natom_counts.device()),
            ("species", species.device()),
        ],
    )?;

    let batch = normalize_batch(coordinates, charges)?;
    let natom_counts = promote(natom_counts, 1);
    expect_shape("natom_counts", &*natom_counts, &[batch.nbatch])?;
    expect_rank("species", species, 1)?;

    let mut element_types = backend.zeros_i32(&[batch.nbatch, batch.natoms]);
    backend.element_types(
        &ElementTypeArgs {
            coordinates: &batch.coordinates,
            charges: &batch.charges,
            natom_counts: &natom_counts,
            species,
        },
        &mut element_types,
    )?;
    Ok(element_types)
}

// End of File
