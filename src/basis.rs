// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

//! The Cartesian Gaussian-type orbital basis and the radial grid the kernels expand onto.

use crate::{device::Device, tensor::Tensor};

/// Cartesian angular components for every channel `l <= lmax`.
///
/// Channel `l` contributes one orbital for each `(n, m, k)` with `n + m + k = l`, weighted by the
/// multinomial coefficient `l! / (n! m! k!)`, so that summing the weighted squares over a channel
/// gives a rotationally invariant quantity.
#[derive(Debug, Clone, PartialEq)]
pub struct GtoBasis {
    lmax: usize,
    components: Vec<[u32; 3]>,
    weights: Vec<f64>,
    powers: Vec<u32>,
}

impl GtoBasis {
    pub fn new(lmax: usize) -> Self {
        let mut components = Vec::with_capacity(Self::norbs(lmax));
        let mut weights = Vec::with_capacity(Self::norbs(lmax));
        let mut powers = Vec::with_capacity(Self::norbs(lmax));

        for l in 0..=lmax as u32 {
            for k in 0..=l {
                for m in 0..=(l - k) {
                    let n = l - k - m;
                    components.push([n, m, k]);
                    weights.push(factorial(l) / (factorial(n) * factorial(m) * factorial(k)));
                    powers.push(l);
                }
            }
        }

        Self {
            lmax,
            components,
            weights,
            powers,
        }
    }

    /// Number of Cartesian orbitals with `l <= lmax`.
    pub fn norbs(lmax: usize) -> usize {
        (0..=lmax).map(|l| (l + 1) * (l + 2) / 2).sum()
    }

    pub fn lmax(&self) -> usize {
        self.lmax
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }

    pub fn components(&self) -> &[[u32; 3]] {
        &self.components
    }

    pub fn weights(&self) -> &[f64] {
        &self.weights
    }

    pub fn powers(&self) -> &[u32] {
        &self.powers
    }

    /// `gto_components`, shape `(norbs, 3)`.
    pub fn components_tensor(&self, device: Device) -> Tensor<f32> {
        let mut tensor = Tensor::zeros(&[self.len(), 3], device);
        for (row, chunk) in self.components.iter().zip(tensor.data_mut().chunks_exact_mut(3)) {
            for (dst, &p) in chunk.iter_mut().zip(row) {
                *dst = p as f32;
            }
        }
        tensor
    }

    /// `orbital_weights`, shape `(norbs,)`.
    pub fn weights_tensor(&self, device: Device) -> Tensor<f32> {
        Tensor::vector(self.weights.iter().map(|&w| w as f32).collect(), device)
    }

    /// `gto_powers`, shape `(norbs,)`.
    pub fn powers_tensor(&self, device: Device) -> Tensor<i32> {
        Tensor::vector(self.powers.iter().map(|&l| l as i32).collect(), device)
    }
}

fn factorial(n: u32) -> f64 {
    (1..=n).map(f64::from).product()
}

/// Gaussian centres evenly spaced on `(0, high_cutoff]`, excluding the origin.
pub fn gaussian_grid(high_cutoff: f64, ngaussians: usize) -> Vec<f64> {
    let step = high_cutoff / ngaussians as f64;
    (1..=ngaussians).map(|g| g as f64 * step).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn orbital_counts_per_channel() {
        assert_eq!(GtoBasis::norbs(0), 1);
        assert_eq!(GtoBasis::norbs(1), 4);
        assert_eq!(GtoBasis::norbs(2), 10);
        assert_eq!(GtoBasis::norbs(3), 20);
        assert_eq!(GtoBasis::new(3).len(), 20);
    }

    #[test]
    fn components_are_ordered_by_channel() {
        let basis = GtoBasis::new(1);
        assert_eq!(
            basis.components(),
            &[[0, 0, 0], [1, 0, 0], [0, 1, 0], [0, 0, 1]]
        );
        assert_eq!(basis.powers(), &[0, 1, 1, 1]);
        assert_eq!(basis.weights(), &[1.0, 1.0, 1.0, 1.0]);
    }

    #[test]
    fn weights_are_multinomial() {
        let basis = GtoBasis::new(2);
        for (c, &w) in basis.components().iter().zip(basis.weights()) {
            let expected = match c {
                [2, 0, 0] | [0, 2, 0] | [0, 0, 2] => 1.0,
                _ if c.iter().sum::<u32>() == 2 => 2.0,
                _ => 1.0,
            };
            assert_eq!(w, expected, "{c:?}");
        }
        // Multinomial weights of channel l sum to 3^l.
        let l2: f64 = basis
            .weights()
            .iter()
            .zip(basis.powers())
            .filter(|(_, l)| **l == 2)
            .map(|(w, _)| w)
            .sum();
        assert_eq!(l2, 9.0);
    }

    #[test]
    fn tensors_have_kernel_shapes() {
        let basis = GtoBasis::new(2);
        assert_eq!(basis.components_tensor(Device::Host).shape(), &[10, 3]);
        assert_eq!(basis.weights_tensor(Device::Host).shape(), &[10]);
        assert_eq!(basis.powers_tensor(Device::Host).data()[9], 2);
    }

    #[test]
    fn grid_excludes_origin() {
        let grid = gaussian_grid(6.0, 4);
        assert_eq!(grid, vec![1.5, 3.0, 4.5, 6.0]);
    }
}

// End of File
