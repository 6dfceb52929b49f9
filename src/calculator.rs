// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

//! A configured eGTO calculator.
//!
//! [`ElementalGto`] owns everything that depends only on its configuration (the orbital basis,
//! the Gaussian grid, the pair table) and derives everything that depends on the structure
//! (neighbour lists, work blocks, element types) before each call into the kernels.

use crate::{
    basis::{gaussian_grid, GtoBasis},
    binding::{get_element_types, EgtoOutput, EgtoRequest},
    config::{CutoffFunction, EgtoConfig},
    error::{EgtoError, Result},
    kernels::{Backend, Cutoff},
    neighbours::{block_ids, count_neighbours, neighbour_list},
    shape::{promote, repsize},
    species::{mbody_list, species_tensor},
    tensor::Tensor,
    validate::require_device,
};
use common::PeriodicCell;
use std::{fmt, sync::Arc};

pub struct ElementalGto {
    config: EgtoConfig,
    backend: Arc<dyn Backend>,
    species: Tensor<f32>,
    mbodylist: Tensor<i32>,
    gto_components: Tensor<f32>,
    orbital_weights: Tensor<f32>,
    gto_powers: Tensor<i32>,
    gridpoints: Tensor<f32>,
    channel_weights: Vec<f64>,
    inv_factors: Vec<f64>,
}

impl ElementalGto {
    pub fn new(config: EgtoConfig, backend: Arc<dyn Backend>) -> Result<Self> {
        config.validate()?;
        let device = backend.device();
        let basis = GtoBasis::new(config.lmax);
        let grid = gaussian_grid(config.high_cutoff, config.ngaussians)
            .into_iter()
            .map(|x| x as f32)
            .collect();

        let calculator = Self {
            species: species_tensor(&config.species, device),
            mbodylist: mbody_list(config.species.len(), device),
            gto_components: basis.components_tensor(device),
            orbital_weights: basis.weights_tensor(device),
            gto_powers: basis.powers_tensor(device),
            gridpoints: Tensor::vector(grid, device),
            channel_weights: config.lchannel_weights.expand(config.lmax),
            inv_factors: config.inv_factors.expand(config.lmax),
            config,
            backend,
        };
        log::info!(
            "eGTO calculator on {}: {} species, lmax {}, {} gaussians, {} features per atom",
            calculator.backend.name(),
            calculator.config.species.len(),
            calculator.config.lmax,
            calculator.config.ngaussians,
            calculator.fp_size()
        );
        Ok(calculator)
    }

    pub fn config(&self) -> &EgtoConfig {
        &self.config
    }

    pub fn backend(&self) -> &dyn Backend {
        self.backend.as_ref()
    }

    /// Features per atom.
    pub fn fp_size(&self) -> usize {
        repsize(self.config.species.len(), self.config.lmax, self.config.ngaussians)
    }

    fn cutoff(&self) -> Cutoff {
        match self.config.cutoff_function {
            CutoffFunction::Cosine => Cutoff::Cosine,
            CutoffFunction::Switch => Cutoff::Switch {
                rswitch: self.config.rswitch,
            },
        }
    }

    /// Representation of a padded batch, shape `(batch, atoms, fp_size)`.
    ///
    /// `cells` holds one periodic cell per molecule, or a single cell shared by all of them.
    pub fn get_representation(
        &self,
        coordinates: &Tensor<f32>,
        charges: &Tensor<f32>,
        natom_counts: &Tensor<i32>,
        cells: Option<&[PeriodicCell]>,
    ) -> Result<Tensor<f32>> {
        self.evaluate(coordinates, charges, natom_counts, cells, false)
            .map(|output| output.representation)
    }

    /// Representation and its analytic derivative, shape `(batch, atoms, atoms, 3, fp_size)`,
    /// indexed by centre atom then displaced atom.
    pub fn get_representation_and_derivative(
        &self,
        coordinates: &Tensor<f32>,
        charges: &Tensor<f32>,
        natom_counts: &Tensor<i32>,
        cells: Option<&[PeriodicCell]>,
    ) -> Result<(Tensor<f32>, Tensor<f32>)> {
        let output = self.evaluate(coordinates, charges, natom_counts, cells, true)?;
        let derivative = output
            .derivative
            .ok_or_else(|| EgtoError::kernel("egto", "no derivative was produced"))?;
        Ok((output.representation, derivative))
    }

    /// Central finite-difference derivative with step `dx`, in the layout of
    /// [`get_representation_and_derivative`](Self::get_representation_and_derivative).
    /// Neighbour lists are rebuilt for every displaced geometry.
    pub fn finite_difference_derivative(
        &self,
        coordinates: &Tensor<f32>,
        charges: &Tensor<f32>,
        natom_counts: &Tensor<i32>,
        cells: Option<&[PeriodicCell]>,
        dx: f32,
    ) -> Result<Tensor<f32>> {
        if !(dx.is_finite() && dx > 0.0) {
            return Err(EgtoError::parameter("dx", format!("{dx} is not positive")));
        }
        let coordinates = promote(coordinates, 3).into_owned();
        let (nbatch, natoms) = (coordinates.size(0), coordinates.size(1));
        let fp_size = self.fp_size();
        let mut derivative = self
            .backend
            .zeros_f32(&[nbatch, natoms, natoms, 3, fp_size]);

        for atom in 0..natoms {
            for axis in 0..3 {
                let mut displaced = coordinates.clone();
                shift(&mut displaced, atom, axis, dx);
                let plus = self.get_representation(&displaced, charges, natom_counts, cells)?;
                shift(&mut displaced, atom, axis, -2.0 * dx);
                let minus = self.get_representation(&displaced, charges, natom_counts, cells)?;

                for b in 0..nbatch {
                    for centre in 0..natoms {
                        for k in 0..fp_size {
                            let slope = (plus.get(&[b, centre, k]) - minus.get(&[b, centre, k]))
                                / (2.0 * dx);
                            derivative.set(&[b, centre, atom, axis, k], slope);
                        }
                    }
                }
            }
        }
        log::debug!("finite-difference derivative over {natoms} atoms, dx {dx}");
        Ok(derivative)
    }

    fn evaluate(
        &self,
        coordinates: &Tensor<f32>,
        charges: &Tensor<f32>,
        natom_counts: &Tensor<i32>,
        cells: Option<&[PeriodicCell]>,
        gradients: bool,
    ) -> Result<EgtoOutput> {
        // Neighbour search allocates, so placement is checked first.
        require_device(
            self.backend.device(),
            [
                ("coordinates", coordinates.device()),
                ("charges", charges.device()),
                ("natom_counts", natom_counts.device()),
            ],
        )?;

        let rcut = self.config.high_cutoff;
        let nneighbours = count_neighbours(coordinates, natom_counts, rcut, cells)?;
        let max_neighbours = nneighbours.max().unwrap_or(0).max(0) as usize;
        let neighbourlist =
            neighbour_list(coordinates, natom_counts, max_neighbours, rcut, cells)?;
        let (block_atom_ids, block_mol_ids) = block_ids(natom_counts);
        let element_types = get_element_types(
            self.backend.as_ref(),
            coordinates,
            charges,
            natom_counts,
            &self.species,
        )?;
        log::trace!(
            "{} work blocks, at most {max_neighbours} neighbours",
            block_atom_ids.numel()
        );

        let lmax = i32::try_from(self.config.lmax)
            .map_err(|_| EgtoError::parameter("lmax", "does not fit in 32 bits"))?;
        EgtoRequest {
            coordinates,
            charges,
            species: &self.species,
            element_types: &element_types,
            block_atom_ids: &block_atom_ids,
            block_mol_ids: &block_mol_ids,
            neighbourlist: &neighbourlist,
            nneighbours: &nneighbours,
            mbodylist: &self.mbodylist,
            gto_components: &self.gto_components,
            orbital_weights: &self.orbital_weights,
            gto_powers: &self.gto_powers,
            gridpoints: &self.gridpoints,
            eta: self.config.eta as f32,
            lmax,
            rcut: rcut as f32,
            cutoff: self.cutoff(),
            channel_weights: Some(&self.channel_weights),
            inv_factors: Some(&self.inv_factors),
            cells,
        }
        .compute(self.backend.as_ref(), gradients)
    }
}

fn shift(coordinates: &mut Tensor<f32>, atom: usize, axis: usize, by: f32) {
    for b in 0..coordinates.size(0) {
        let value = coordinates.get(&[b, atom, axis]);
        coordinates.set(&[b, atom, axis], value + by);
    }
}

impl fmt::Debug for ElementalGto {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ElementalGto")
            .field("config", &self.config)
            .field("backend", &self.backend.name())
            .finish_non_exhaustive()
    }
}


// End of File
