// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

//! Neighbour lists and work-block ids consumed by the eGTO kernels.
//!
//! Open systems are binned into cubic cells of side `rcut` over the molecule's bounding box, so
//! only the 27 surrounding bins are searched per atom; when the grid would hold more bins than
//! atoms every pair is scanned instead.  Periodic systems use the minimum image convention over
//! all pairs.  Neighbours are always listed in ascending atom order.

use crate::{
    error::{EgtoError, Result},
    shape::{expect_shape, promote},
    tensor::Tensor,
};
use common::{BoundingBox, PeriodicCell};
use rayon::prelude::*;
use std::collections::HashMap;
use ultraviolet::DVec3;

/// Number of neighbours within `rcut` of every atom, shape `(batch, atoms)`.  Padding atoms
/// (index `>= natom_counts[b]`) have no neighbours and are nobody's neighbour.
pub fn count_neighbours(
    coordinates: &Tensor<f32>,
    natom_counts: &Tensor<i32>,
    rcut: f64,
    cells: Option<&[PeriodicCell]>,
) -> Result<Tensor<i32>> {
    let Neighbourhoods { natoms, lists } = build(coordinates, natom_counts, rcut, cells)?;
    let nbatch = lists.len();
    let counts = lists
        .iter()
        .flat_map(|molecule| {
            (0..natoms).map(move |i| molecule.get(i).map_or(0, |list| list.len() as i32))
        })
        .collect();
    Tensor::from_vec(&[nbatch, natoms], counts, coordinates.device())
}

/// Neighbour indices within `rcut`, shape `(batch, atoms, max_neighbours)`, padded with `-1`.
/// Fails if an atom has more than `max_neighbours` neighbours.
pub fn neighbour_list(
    coordinates: &Tensor<f32>,
    natom_counts: &Tensor<i32>,
    max_neighbours: usize,
    rcut: f64,
    cells: Option<&[PeriodicCell]>,
) -> Result<Tensor<i32>> {
    let Neighbourhoods { natoms, lists } = build(coordinates, natom_counts, rcut, cells)?;
    let nbatch = lists.len();
    let mut table = Tensor::from_vec(
        &[nbatch, natoms, max_neighbours],
        vec![-1; nbatch * natoms * max_neighbours],
        coordinates.device(),
    )?;

    for (batch, molecule) in lists.iter().enumerate() {
        for (atom, list) in molecule.iter().enumerate() {
            if list.len() > max_neighbours {
                return Err(EgtoError::parameter(
                    "max_neighbours",
                    format!(
                        "atom {atom} of molecule {batch} has {} neighbours, room for {}",
                        list.len(),
                        max_neighbours
                    ),
                ));
            }
            for (slot, &neighbour) in list.iter().enumerate() {
                table.set(&[batch, atom, slot], neighbour as i32);
            }
        }
    }
    Ok(table)
}

/// One work block per real atom: `(block_atom_ids, block_mol_ids)`.
pub fn block_ids(natom_counts: &Tensor<i32>) -> (Tensor<i32>, Tensor<i32>) {
    let mut atoms = Vec::new();
    let mut molecules = Vec::new();
    for (molecule, &count) in natom_counts.data().iter().enumerate() {
        for atom in 0..count.max(0) {
            atoms.push(atom);
            molecules.push(molecule as i32);
        }
    }
    let device = natom_counts.device();
    (Tensor::vector(atoms, device), Tensor::vector(molecules, device))
}

/// Neighbour lists of every molecule in a batch.
struct Neighbourhoods {
    natoms: usize,
    /// Per molecule, per real atom, the ascending list of neighbour indices.
    lists: Vec<Vec<Vec<usize>>>,
}

fn build(
    coordinates: &Tensor<f32>,
    natom_counts: &Tensor<i32>,
    rcut: f64,
    cells: Option<&[PeriodicCell]>,
) -> Result<Neighbourhoods> {
    if rcut.is_nan() || rcut <= 0.0 {
        return Err(EgtoError::parameter("rcut", format!("{rcut} is not positive")));
    }
    let coordinates = promote(coordinates, 3);
    if coordinates.dim() != 3 || coordinates.size(2) != 3 {
        return Err(EgtoError::shape(
            "coordinates",
            "(batch, atoms, 3) or (atoms, 3)",
            coordinates.shape(),
        ));
    }
    let (nbatch, natoms) = (coordinates.size(0), coordinates.size(1));
    expect_shape("natom_counts", natom_counts, &[nbatch])?;
    if let Some(cells) = cells {
        if cells.len() != 1 && cells.len() != nbatch {
            return Err(EgtoError::parameter(
                "cells",
                format!("{} cells for {nbatch} molecules", cells.len()),
            ));
        }
    }

    let lists = (0..nbatch)
        .into_par_iter()
        .map(|b| {
            let count = (natom_counts.data()[b].max(0) as usize).min(natoms);
            let row = coordinates.row(b);
            let positions = (0..count)
                .map(|i| {
                    DVec3::new(
                        f64::from(row[i * 3]),
                        f64::from(row[i * 3 + 1]),
                        f64::from(row[i * 3 + 2]),
                    )
                })
                .collect::<Vec<_>>();
            let cell = cells.and_then(|cells| cells.get(b).or_else(|| cells.first()));
            match cell {
                Some(cell) => all_pairs(&positions, rcut, |d| cell.minimum_image(d)),
                None => binned_neighbours(&positions, rcut),
            }
        })
        .collect::<Vec<_>>();
    log::debug!("built neighbour lists for {nbatch} molecules, rcut {rcut}");

    Ok(Neighbourhoods { natoms, lists })
}

fn binned_neighbours(positions: &[DVec3], rcut: f64) -> Vec<Vec<usize>> {
    let Some(bounds) = BoundingBox::from_points(positions.iter().copied()) else {
        return Vec::new();
    };
    // A grid with more bins than atoms would be mostly empty; scan all pairs instead.
    if bounds.bin_count(rcut).map_or(true, |count| count > positions.len()) {
        return all_pairs(positions, rcut, |d| d);
    }
    let bins = bounds.bins(rcut);
    let mut occupants: HashMap<[usize; 3], Vec<usize>> = HashMap::new();
    for (i, &p) in positions.iter().enumerate() {
        occupants.entry(bounds.bin_of(p, rcut)).or_default().push(i);
    }

    let rcut_sq = rcut * rcut;
    positions
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            let home = bounds.bin_of(p, rcut);
            let mut list = Vec::new();
            for dx in 0..3 {
                for dy in 0..3 {
                    for dz in 0..3 {
                        let bin = [
                            (home[0], dx, bins[0]),
                            (home[1], dy, bins[1]),
                            (home[2], dz, bins[2]),
                        ]
                        .map(|(h, offset, extent)| {
                            (h + offset).checked_sub(1).filter(|&v| v < extent)
                        });
                        let [Some(x), Some(y), Some(z)] = bin else {
                            continue;
                        };
                        let Some(candidates) = occupants.get(&[x, y, z]) else {
                            continue;
                        };
                        list.extend(
                            candidates
                                .iter()
                                .copied()
                                .filter(|&j| j != i && (positions[j] - p).mag_sq() < rcut_sq),
                        );
                    }
                }
            }
            list.sort_unstable();
            list
        })
        .collect()
}

/// Every pair within `rcut` after `image` is applied to the displacement.
fn all_pairs(
    positions: &[DVec3],
    rcut: f64,
    image: impl Fn(DVec3) -> DVec3,
) -> Vec<Vec<usize>> {
    let rcut_sq = rcut * rcut;
    positions
        .iter()
        .enumerate()
        .map(|(i, &p)| {
            (0..positions.len())
                .filter(|&j| j != i && image(p - positions[j]).mag_sq() < rcut_sq)
                .collect()
        })
        .collect()
}


// End of File
