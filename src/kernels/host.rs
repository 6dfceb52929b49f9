// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

//! Host implementation of the eGTO kernels.
//!
//! The launch grid is one work item per `(molecule, atom)` centre.  Each centre owns a disjoint
//! slice of the representation (`repsize` floats) and of the derivative (`atoms * 3 * repsize`
//! floats), so rayon can hand out slices without any synchronisation.  Arithmetic is carried out
//! in `f64` and stored as `f32`.

use super::{Backend, Cutoff, EgtoArgs, ElementTypeArgs};
use crate::{
    device::Device,
    error::{EgtoError, Result},
    shape::nmbody,
    tensor::Tensor,
};
use common::PeriodicCell;
use periodic_table::Element;
use rayon::prelude::*;
use std::f64::consts::PI;
use ultraviolet::DVec3;

/// Runs the kernels on the host with rayon.
#[derive(Debug, Clone)]
pub struct HostBackend {
    device: Device,
}

impl HostBackend {
    pub fn new() -> Self {
        Self {
            device: Device::Host,
        }
    }

    /// A host backend that presents itself as `device`: it only accepts tensors tagged with that
    /// device and tags its allocations accordingly.
    pub fn emulating(device: Device) -> Self {
        Self { device }
    }
}

impl Default for HostBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Backend for HostBackend {
    fn name(&self) -> &str {
        "host"
    }

    fn device(&self) -> Device {
        self.device
    }

    fn element_types(
        &self,
        args: &ElementTypeArgs<'_>,
        element_types: &mut Tensor<i32>,
    ) -> Result<()> {
        let natoms = args.coordinates.size(1);
        let species = args.species.data();
        let counts = args.natom_counts.data();
        if natoms == 0 {
            return Ok(());
        }

        element_types
            .data_mut()
            .par_chunks_mut(natoms)
            .zip(args.charges.data().par_chunks(natoms))
            .enumerate()
            .for_each(|(batch, (types, charges))| {
                let count = (counts[batch].max(0) as usize).min(natoms);
                for (slot, &charge) in types.iter_mut().zip(charges).take(count) {
                    *slot = Element::from_charge(charge)
                        .and_then(|element| {
                            species
                                .iter()
                                .position(|&z| Element::from_charge(z) == Some(element))
                        })
                        .map_or(-1, |s| s as i32);
                }
            });

        log::trace!("classified {} molecules", counts.len());
        Ok(())
    }

    fn egto(&self, args: &EgtoArgs<'_>, output: &mut Tensor<f32>) -> Result<()> {
        let plan = Plan::new(args)?;
        if output.numel() == 0 {
            return Ok(());
        }
        log::debug!(
            "egto: {} molecules x {} atoms, repsize {}",
            plan.nbatch,
            plan.natoms,
            plan.repsize
        );

        output
            .data_mut()
            .par_chunks_mut(plan.repsize)
            .enumerate()
            .filter(|(centre, _)| plan.active[*centre])
            .for_each(|(centre, rep)| {
                let environment = plan.environment(args, centre, false);
                environment.accumulate_values(&plan, rep);
            });
        Ok(())
    }

    fn egto_derivative(
        &self,
        args: &EgtoArgs<'_>,
        output: &mut Tensor<f32>,
        derivative: &mut Tensor<f32>,
    ) -> Result<()> {
        let plan = Plan::new(args)?;
        if output.numel() == 0 || derivative.numel() == 0 {
            return Ok(());
        }
        log::debug!(
            "egto derivative: {} molecules x {} atoms, repsize {}",
            plan.nbatch,
            plan.natoms,
            plan.repsize
        );

        let derivative_stride = plan.natoms * 3 * plan.repsize;
        output
            .data_mut()
            .par_chunks_mut(plan.repsize)
            .zip(derivative.data_mut().par_chunks_mut(derivative_stride))
            .enumerate()
            .filter(|(centre, _)| plan.active[*centre])
            .for_each(|(centre, (rep, grad))| {
                let environment = plan.environment(args, centre, true);
                environment.accumulate_values(&plan, rep);
                environment.accumulate_derivative(&plan, centre % plan.natoms, grad);
            });
        Ok(())
    }
}

/// One Cartesian orbital, decoded from the basis tensors.
#[derive(Debug, Clone, Copy)]
struct Orbital {
    powers: [i32; 3],
    channel: usize,
    /// Multinomial weight times the channel weight.
    weight: f64,
    /// Total inverse-distance exponent, `inv_factor + l`.
    inv_power: f64,
}

impl Orbital {
    /// Value of `r^-p * dx^n * dy^m * dz^k` and its gradient with respect to `d`.
    fn evaluate(&self, d: DVec3, r: f64) -> (f64, DVec3) {
        let [(px, dpx), (py, dpy), (pz, dpz)] = [
            monomial(d.x, self.powers[0]),
            monomial(d.y, self.powers[1]),
            monomial(d.z, self.powers[2]),
        ];
        let scale = r.powf(-self.inv_power);
        let mono = px * py * pz;
        let gradient = d * (-self.inv_power * scale * mono / (r * r))
            + DVec3::new(dpx * py * pz, px * dpy * pz, px * py * dpz) * scale;
        (scale * mono, gradient)
    }
}

/// `x^n` and its derivative.
fn monomial(x: f64, n: i32) -> (f64, f64) {
    match n {
        0 => (1.0, 0.0),
        _ => (x.powi(n), f64::from(n) * x.powi(n - 1)),
    }
}

/// Per-call decoding of the kernel arguments shared by every centre.
struct Plan<'a> {
    nbatch: usize,
    natoms: usize,
    max_neighbours: usize,
    nspecies: usize,
    nmbody: usize,
    ngaussians: usize,
    repsize: usize,
    orbitals: Vec<Orbital>,
    grid: Vec<f64>,
    mbody: Vec<usize>,
    active: Vec<bool>,
    cells: Option<&'a [PeriodicCell]>,
    eta: f64,
    rcut: f64,
    cutoff: Cutoff,
}

impl<'a> Plan<'a> {
    fn new(args: &EgtoArgs<'a>) -> Result<Self> {
        const KERNEL: &str = "egto";

        let nbatch = args.coordinates.size(0);
        let natoms = args.coordinates.size(1);
        let nspecies = args.mbodylist.size(0);
        let ngaussians = args.gridpoints.size(0);
        let channels = args.lmax + 1;

        if args.channel_weights.len() < channels || args.inv_factors.len() < channels {
            return Err(EgtoError::kernel(
                KERNEL,
                format!("need {channels} channel weights and inverse factors"),
            ));
        }

        let nmbody = nmbody(nspecies);
        let mbody = args
            .mbodylist
            .data()
            .iter()
            .map(|&m| {
                usize::try_from(m)
                    .ok()
                    .filter(|&m| m < nmbody)
                    .ok_or_else(|| {
                        EgtoError::kernel(KERNEL, format!("mbodylist entry {m} out of range"))
                    })
            })
            .collect::<Result<Vec<_>>>()?;

        let components = args.gto_components.data();
        let weights = args.orbital_weights.data();
        let orbitals = args
            .gto_powers
            .data()
            .iter()
            .enumerate()
            .map(|(o, &l)| {
                let channel = usize::try_from(l)
                    .ok()
                    .filter(|&l| l <= args.lmax)
                    .ok_or_else(|| {
                        EgtoError::kernel(KERNEL, format!("orbital {o} has channel {l} > lmax"))
                    })?;
                let powers = [0, 1, 2].map(|axis| components[o * 3 + axis].round() as i32);
                Ok(Orbital {
                    powers,
                    channel,
                    weight: f64::from(weights[o]) * args.channel_weights[channel],
                    inv_power: args.inv_factors[channel] + channel as f64,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut active = vec![false; nbatch * natoms];
        for (&atom, &mol) in args
            .block_atom_ids
            .data()
            .iter()
            .zip(args.block_mol_ids.data())
        {
            let (atom, mol) = match (usize::try_from(atom), usize::try_from(mol)) {
                (Ok(atom), Ok(mol)) if atom < natoms && mol < nbatch => (atom, mol),
                _ => {
                    return Err(EgtoError::kernel(
                        KERNEL,
                        format!("block ({mol}, {atom}) outside {nbatch} x {natoms}"),
                    ))
                }
            };
            active[mol * natoms + atom] = true;
        }

        if let Some(cells) = args.cells {
            if cells.len() != 1 && cells.len() != nbatch {
                return Err(EgtoError::kernel(
                    KERNEL,
                    format!("{} cells for {nbatch} molecules", cells.len()),
                ));
            }
        }

        Ok(Self {
            nbatch,
            natoms,
            max_neighbours: args.neighbourlist.size(2),
            nspecies,
            nmbody,
            ngaussians,
            repsize: nmbody * channels * ngaussians,
            orbitals,
            grid: args.gridpoints.data().iter().map(|&g| f64::from(g)).collect(),
            mbody,
            active,
            cells: args.cells,
            eta: args.eta,
            rcut: args.rcut,
            cutoff: args.cutoff,
        })
    }

    fn cell(&self, batch: usize) -> Option<&PeriodicCell> {
        self.cells.and_then(|cells| cells.get(batch).or_else(|| cells.first()))
    }

    /// Output column of orbital channel `l`, two-body channel `m` and Gaussian `g`.
    fn column(&self, l: usize, m: usize, g: usize) -> usize {
        (l * self.nmbody + m) * self.ngaussians + g
    }

    fn pair(&self, s: usize, t: usize) -> usize {
        self.mbody[s * self.nspecies + t]
    }

    /// Gathers the neighbours of `centre` (a flat `batch * natoms + atom` index) and projects
    /// them onto the basis.
    fn environment(
        &self,
        args: &EgtoArgs<'_>,
        centre: usize,
        with_gradients: bool,
    ) -> Environment {
        let batch = centre / self.natoms;
        let atom = centre % self.natoms;
        let position = |index: usize| {
            let p = args.coordinates.row(batch);
            DVec3::new(
                f64::from(p[index * 3]),
                f64::from(p[index * 3 + 1]),
                f64::from(p[index * 3 + 2]),
            )
        };
        let centre_position = position(atom);
        let types = args.element_types.row(batch);
        let count = (args.nneighbours.data()[centre].max(0) as usize).min(self.max_neighbours);
        let slots = &args.neighbourlist.data()
            [centre * self.max_neighbours..centre * self.max_neighbours + count];

        let norbs = self.orbitals.len();
        let ngauss = self.ngaussians;
        let mut neighbours = Vec::with_capacity(count);
        let mut coefficients = vec![0.0; self.nspecies * norbs * ngauss];
        let mut gradients = Vec::new();
        let mut radial = vec![0.0; ngauss];
        let mut radial_slope = vec![0.0; ngauss];
        let normalisation = (self.eta / PI).sqrt();

        for &slot in slots {
            let Ok(index) = usize::try_from(slot) else {
                continue;
            };
            if index >= self.natoms || index == atom {
                continue;
            }
            let Some(species) = usize::try_from(types[index])
                .ok()
                .filter(|&s| s < self.nspecies)
            else {
                continue;
            };

            let mut d = centre_position - position(index);
            if let Some(cell) = self.cell(batch) {
                d = cell.minimum_image(d);
            }
            let r = d.mag();
            if r <= 0.0 || r >= self.rcut {
                continue;
            }

            let (fc, dfc) = self.cutoff.evaluate(r, self.rcut);
            for (g, &centre_g) in self.grid.iter().enumerate() {
                let delta = r - centre_g;
                let gaussian = normalisation * (-self.eta * delta * delta).exp();
                radial[g] = gaussian * fc;
                radial_slope[g] = gaussian * (dfc - 2.0 * self.eta * delta * fc);
            }

            let base = species * norbs * ngauss;
            for (o, orbital) in self.orbitals.iter().enumerate() {
                let (angular, angular_gradient) = orbital.evaluate(d, r);
                for g in 0..ngauss {
                    coefficients[base + o * ngauss + g] += angular * radial[g];
                    if with_gradients {
                        gradients.push(
                            angular_gradient * radial[g] + d * (angular * radial_slope[g] / r),
                        );
                    }
                }
            }
            neighbours.push((index, species));
        }

        Environment {
            neighbours,
            coefficients,
            gradients,
        }
    }
}

/// A centre's neighbourhood projected onto the basis.
struct Environment {
    /// `(atom index, species index)` of every contributing neighbour.
    neighbours: Vec<(usize, usize)>,
    /// `C[species][orbital][gaussian]`.
    coefficients: Vec<f64>,
    /// Gradient of each neighbour's term with respect to the displacement `x_centre - x_neighbour`,
    /// `[neighbour][orbital][gaussian]`; empty unless requested.
    gradients: Vec<DVec3>,
}

impl Environment {
    fn coefficient(&self, plan: &Plan<'_>, species: usize, orbital: usize, g: usize) -> f64 {
        self.coefficients[(species * plan.orbitals.len() + orbital) * plan.ngaussians + g]
    }

    fn accumulate_values(&self, plan: &Plan<'_>, rep: &mut [f32]) {
        let mut values = vec![0.0f64; plan.repsize];
        for (o, orbital) in plan.orbitals.iter().enumerate() {
            let l = orbital.channel;
            for s in 0..plan.nspecies {
                let single = plan.pair(s, s);
                for g in 0..plan.ngaussians {
                    let c = self.coefficient(plan, s, o, g);
                    values[plan.column(l, single, g)] += orbital.weight * c * c;
                }
                // (C_s + C_t)^2 - C_s^2 - C_t^2
                for t in (s + 1)..plan.nspecies {
                    let mixed = plan.pair(s, t);
                    for g in 0..plan.ngaussians {
                        let cs = self.coefficient(plan, s, o, g);
                        let ct = self.coefficient(plan, t, o, g);
                        values[plan.column(l, mixed, g)] += 2.0 * orbital.weight * cs * ct;
                    }
                }
            }
        }
        for (out, value) in rep.iter_mut().zip(values) {
            *out += value as f32;
        }
    }

    fn accumulate_derivative(&self, plan: &Plan<'_>, atom: usize, grad: &mut [f32]) {
        let norbs = plan.orbitals.len();
        let ngauss = plan.ngaussians;
        let repsize = plan.repsize;
        let mut values = vec![0.0f64; grad.len()];
        let mut add = |target: usize, column: usize, v: DVec3| {
            values[(target * 3) * repsize + column] += v.x;
            values[(target * 3 + 1) * repsize + column] += v.y;
            values[(target * 3 + 2) * repsize + column] += v.z;
        };

        for (n, &(index, s)) in self.neighbours.iter().enumerate() {
            for (o, orbital) in plan.orbitals.iter().enumerate() {
                let l = orbital.channel;
                for g in 0..ngauss {
                    // d(term)/d(x_neighbour) = -gradient; the centre receives the opposite.
                    let gradient = self.gradients[(n * norbs + o) * ngauss + g];
                    for t in 0..plan.nspecies {
                        let column = plan.column(l, plan.pair(s, t), g);
                        let v = gradient * (2.0 * orbital.weight * self.coefficient(plan, t, o, g));
                        add(index, column, -v);
                        add(atom, column, v);
                    }
                }
            }
        }

        for (out, value) in grad.iter_mut().zip(values) {
            *out += value as f32;
        }
    }
}


// End of File
