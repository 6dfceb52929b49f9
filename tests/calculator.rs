// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

use egto::{
    get_reductors, structure, CutoffFunction, Device, EgtoConfig, Element, ElementalGto,
    HostBackend, PeriodicCell, Tensor,
};
use std::sync::Arc;

fn calculator(config: EgtoConfig) -> ElementalGto {
    ElementalGto::new(config, Arc::new(HostBackend::new())).unwrap()
}

fn small_config() -> EgtoConfig {
    EgtoConfig {
        species: vec![Element::Hydrogen, Element::Carbon, Element::Oxygen],
        high_cutoff: 4.0,
        ngaussians: 8,
        lmax: 2,
        ..EgtoConfig::default()
    }
}

/// A distorted formaldehyde.
fn formaldehyde() -> (Tensor<f32>, Tensor<f32>, Tensor<i32>) {
    let coordinates = Tensor::from_vec(
        &[1, 4, 3],
        vec![
            0.0, 0.0, 0.0, //
            1.21, 0.05, -0.02, //
            -0.55, 0.93, 0.1, //
            -0.5, -0.95, -0.08,
        ],
        Device::Host,
    )
    .unwrap();
    let charges = Tensor::from_vec(&[1, 4], vec![6.0, 8.0, 1.0, 1.0], Device::Host).unwrap();
    (coordinates, charges, Tensor::vector(vec![4], Device::Host))
}

fn largest(tensor: &Tensor<f32>) -> f32 {
    tensor.data().iter().fold(0.0f32, |m, v| m.max(v.abs()))
}

#[test]
fn analytic_derivative_matches_finite_differences() {
    for cutoff_function in [CutoffFunction::Cosine, CutoffFunction::Switch] {
        let gto = calculator(EgtoConfig {
            cutoff_function,
            rswitch: 1.0,
            lchannel_weights: egto::config::ChannelValues::PerChannel(vec![1.0, 0.7, 0.3]),
            ..small_config()
        });
        let (coordinates, charges, natom_counts) = formaldehyde();
        let (_, analytic) = gto
            .get_representation_and_derivative(&coordinates, &charges, &natom_counts, None)
            .unwrap();
        let numeric = gto
            .finite_difference_derivative(&coordinates, &charges, &natom_counts, None, 5e-3)
            .unwrap();

        let scale = largest(&analytic).max(1.0);
        let error = analytic.max_abs_diff(&numeric).unwrap();
        assert!(
            error < 2e-3 * scale,
            "{cutoff_function:?}: error {error} against scale {scale}"
        );
    }
}

#[test]
fn derivative_rows_sum_to_zero() {
    // Moving every atom together leaves each centre's representation unchanged.
    let gto = calculator(small_config());
    let (coordinates, charges, natom_counts) = formaldehyde();
    let (_, derivative) = gto
        .get_representation_and_derivative(&coordinates, &charges, &natom_counts, None)
        .unwrap();
    let width = gto.fp_size();
    let scale = largest(&derivative).max(1.0);
    for centre in 0..4 {
        for axis in 0..3 {
            for k in 0..width {
                let total: f32 = (0..4)
                    .map(|atom| derivative.get(&[0, centre, atom, axis, k]))
                    .sum();
                assert!(total.abs() < 1e-4 * scale);
            }
        }
    }
}

#[test]
fn representation_is_translation_invariant() {
    let gto = calculator(small_config());
    let (coordinates, charges, natom_counts) = formaldehyde();
    let shifted = Tensor::from_vec(
        coordinates.shape(),
        coordinates
            .data()
            .chunks(3)
            .flat_map(|p| [p[0] + 1.5, p[1] - 2.0, p[2] + 0.25])
            .collect(),
        Device::Host,
    )
    .unwrap();

    let a = gto.get_representation(&coordinates, &charges, &natom_counts, None).unwrap();
    let b = gto.get_representation(&shifted, &charges, &natom_counts, None).unwrap();
    assert!(a.max_abs_diff(&b).unwrap() < 1e-4 * largest(&a).max(1.0));
}

#[test]
fn isolated_and_padding_atoms_have_zero_rows() {
    let gto = calculator(small_config());
    // Two molecules: formaldehyde plus a distant hydrogen, and a lone oxygen padded to five atoms.
    let coordinates = Tensor::from_vec(
        &[2, 5, 3],
        vec![
            0.0, 0.0, 0.0, 1.21, 0.05, -0.02, -0.55, 0.93, 0.1, -0.5, -0.95, -0.08, 20.0, 0.0, 0.0,
            0.0, 0.0, 0.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0, 9.0,
        ],
        Device::Host,
    )
    .unwrap();
    let charges = Tensor::from_vec(
        &[2, 5],
        vec![6.0, 8.0, 1.0, 1.0, 1.0, 8.0, 0.0, 0.0, 0.0, 0.0],
        Device::Host,
    )
    .unwrap();
    let natom_counts = Tensor::vector(vec![5, 1], Device::Host);

    let (rep, derivative) = gto
        .get_representation_and_derivative(&coordinates, &charges, &natom_counts, None)
        .unwrap();
    let width = gto.fp_size();
    let row = |b: usize, i: usize| &rep.data()[(b * 5 + i) * width..(b * 5 + i + 1) * width];
    assert!(row(0, 0).iter().any(|&v| v != 0.0));
    assert!(row(0, 4).iter().all(|&v| v == 0.0));
    for i in 0..5 {
        assert!(row(1, i).iter().all(|&v| v == 0.0), "atom {i} of the lone oxygen");
    }

    let block = 5 * 3 * width;
    let centre = |b: usize, i: usize| {
        let start = (b * 5 + i) * block;
        &derivative.data()[start..start + block]
    };
    assert!(centre(0, 4).iter().all(|&v| v == 0.0));
    assert!(centre(1, 0).iter().all(|&v| v == 0.0));
}

#[test]
fn periodic_images_complete_a_wrapped_molecule() {
    let gto = calculator(small_config());
    let charges = Tensor::from_vec(&[1, 3], vec![8.0, 1.0, 1.0], Device::Host).unwrap();
    let natom_counts = Tensor::vector(vec![3], Device::Host);
    let whole = Tensor::from_vec(
        &[1, 3, 3],
        vec![4.1, 4.0, 4.0, 3.5, 4.6, 4.0, 3.5, 3.4, 4.0],
        Device::Host,
    )
    .unwrap();
    // The same molecule with the oxygen wrapped across the x = 8 face.
    let wrapped = Tensor::from_vec(
        &[1, 3, 3],
        vec![0.1, 4.0, 4.0, 7.5, 4.6, 4.0, 7.5, 3.4, 4.0],
        Device::Host,
    )
    .unwrap();
    let cells = [PeriodicCell::orthorhombic(8.0, 8.0, 8.0).unwrap()];

    let open = gto.get_representation(&whole, &charges, &natom_counts, None).unwrap();
    let periodic = gto
        .get_representation(&wrapped, &charges, &natom_counts, Some(&cells))
        .unwrap();
    assert!(open.max_abs_diff(&periodic).unwrap() < 1e-4 * largest(&open).max(1.0));

    let broken = gto.get_representation(&wrapped, &charges, &natom_counts, None).unwrap();
    assert!(open.max_abs_diff(&broken).unwrap() > 1e-3);
}

#[test]
fn structure_files_through_the_calculator() {
    let config = EgtoConfig::load("tests/assets/egto.json").unwrap();
    assert_eq!(config.species, vec![Element::Hydrogen, Element::Oxygen]);
    let gto = calculator(config);
    assert_eq!(gto.fp_size(), 3 * 3 * 12);

    let frames = structure::read("tests/assets/water-dimer.xyz").unwrap();
    assert_eq!(frames.len(), 2);
    let batch = structure::batch(&frames, Device::Host).unwrap();
    assert_eq!(batch.natom_counts.data(), &[6, 3]);

    let rep = gto
        .get_representation(&batch.coordinates, &batch.charges, &batch.natom_counts, None)
        .unwrap();
    assert_eq!(rep.shape(), &[2, 6, gto.fp_size()]);

    // Both hydrogens of the monomer see the same environment.
    let width = gto.fp_size();
    let h1 = &rep.data()[(6 + 1) * width..(6 + 2) * width];
    let h2 = &rep.data()[(6 + 2) * width..(6 + 3) * width];
    for (a, b) in h1.iter().zip(h2) {
        assert!((a - b).abs() < 1e-5);
    }
    assert!(rep.data()[(6 + 3) * width..].iter().all(|&v| v == 0.0));
}

#[test]
fn reduced_features_of_the_water_dimer() {
    let config = EgtoConfig::load("tests/assets/egto.json").unwrap();
    let species = config.species.clone();
    let gto = calculator(config);
    let frames = structure::read("tests/assets/water-dimer.xyz").unwrap();
    let batch = structure::batch(&frames, Device::Host).unwrap();
    let (rep, derivative) = gto
        .get_representation_and_derivative(
            &batch.coordinates,
            &batch.charges,
            &batch.natom_counts,
            None,
        )
        .unwrap();

    let reductors = get_reductors(&rep, &batch.charges, &species, 3, 512).unwrap();
    assert_eq!(reductors.len(), 2);
    for reductor in &reductors {
        assert_eq!(reductor.input_size(), gto.fp_size());
        assert!(reductor.explained_variance() > 0.0 && reductor.explained_variance() <= 100.0);
    }

    let hydrogen = &reductors[0];
    assert_eq!(hydrogen.element(), Element::Hydrogen);
    let reduced = hydrogen.project_representation(&rep).unwrap();
    assert_eq!(reduced.shape(), &[2, 6, 3]);
    let reduced_derivative = hydrogen.project_derivative(&derivative).unwrap();
    assert_eq!(reduced_derivative.shape(), &[2, 6, 6, 3, 3]);
    // Padding rows stay zero after projection.
    assert!(reduced.data()[(6 + 3) * 3..].iter().all(|&v| v == 0.0));
}

// End of File
