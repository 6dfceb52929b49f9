// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

//! Species bookkeeping: the species tensor and the pair table (`mbodylist`) that assigns every
//! unordered species pair its two-body channel.

use crate::{device::Device, shape::nmbody, tensor::Tensor};
use periodic_table::Element;

/// The `(nspecies, nspecies)` pair table.  Self-pairs come first (`mbody[s][s] = s`), followed by
/// the mixed pairs `s < t` in row-major order; the table is symmetric.
pub fn mbody_list(nspecies: usize, device: Device) -> Tensor<i32> {
    let mut table = Tensor::zeros(&[nspecies, nspecies], device);
    for s in 0..nspecies {
        table.set(&[s, s], s as i32);
    }
    let mut channel = nspecies as i32;
    for s in 0..nspecies {
        for t in (s + 1)..nspecies {
            table.set(&[s, t], channel);
            table.set(&[t, s], channel);
            channel += 1;
        }
    }
    debug_assert_eq!(channel as usize, nmbody(nspecies));
    table
}

/// Mixed species pairs in channel order, e.g. `[(H, C), (H, O), (C, O)]` for `[H, C, O]`.
pub fn element_combinations(species: &[Element]) -> Vec<(Element, Element)> {
    species
        .iter()
        .enumerate()
        .flat_map(|(i, &a)| species[i + 1..].iter().map(move |&b| (a, b)))
        .collect()
}

/// The species tensor the kernels consume: atomic numbers as `f32`.
pub fn species_tensor(species: &[Element], device: Device) -> Tensor<f32> {
    Tensor::vector(
        species.iter().map(|e| e.atomic_number() as f32).collect(),
        device,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pair_table_for_four_species() {
        let table = mbody_list(4, Device::Host);
        #[rustfmt::skip]
        let expected = vec![
            0, 4, 5, 6,
            4, 1, 7, 8,
            5, 7, 2, 9,
            6, 8, 9, 3,
        ];
        assert_eq!(table.data(), expected.as_slice());
        assert_eq!(table.max(), Some(nmbody(4) as i32 - 1));
    }

    #[test]
    fn combinations_follow_channel_order() {
        let species = [Element::Hydrogen, Element::Carbon, Element::Oxygen];
        assert_eq!(
            element_combinations(&species),
            vec![
                (Element::Hydrogen, Element::Carbon),
                (Element::Hydrogen, Element::Oxygen),
                (Element::Carbon, Element::Oxygen),
            ]
        );
        let table = mbody_list(3, Device::Host);
        assert_eq!(table.get(&[0, 1]), 3);
        assert_eq!(table.get(&[0, 2]), 4);
        assert_eq!(table.get(&[1, 2]), 5);
    }

    #[test]
    fn species_tensor_holds_atomic_numbers() {
        let t = species_tensor(&[Element::Hydrogen, Element::Nitrogen], Device::Host);
        assert_eq!(t.data(), &[1.0, 7.0]);
    }
}

// End of File
