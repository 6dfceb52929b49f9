// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

//! Per-element dimensionality reduction of eGTO features.
//!
//! A [`Reductor`] holds the leading left singular vectors of a sample of one element's feature
//! rows.  Projection contracts the last (feature) axis, so it applies unchanged to
//! representations `(…, repsize)` and to derivatives `(…, 3, repsize)`.

use crate::{
    error::{EgtoError, Result},
    tensor::Tensor,
};
use nalgebra::DMatrix;
use periodic_table::Element;

/// Projection of one element's features onto their principal directions.
#[derive(Debug, Clone, PartialEq)]
pub struct Reductor {
    element: Element,
    /// `(repsize, npcas)`, orthonormal columns.
    projection: DMatrix<f64>,
    explained_variance: f64,
}

impl Reductor {
    /// Fits a reductor to `samples`, each a feature row of equal length, keeping `npcas`
    /// directions.
    pub fn fit(element: Element, samples: &[&[f32]], npcas: usize) -> Result<Self> {
        let repsize = samples.first().map_or(0, |row| row.len());
        if repsize == 0 || samples.iter().any(|row| row.len() != repsize) {
            return Err(EgtoError::shape(
                "samples",
                "non-empty rows of equal length",
                &[samples.len(), repsize],
            ));
        }
        if npcas == 0 || npcas > repsize.min(samples.len()) {
            return Err(EgtoError::parameter(
                "npcas",
                format!(
                    "{npcas} directions from {} samples of {repsize} features",
                    samples.len()
                ),
            ));
        }
        if samples.iter().flat_map(|row| row.iter()).any(|v| !v.is_finite()) {
            return Err(EgtoError::parameter("samples", "features must be finite"));
        }

        // Features along rows, samples along columns.
        let matrix =
            DMatrix::from_fn(repsize, samples.len(), |r, c| f64::from(samples[c][r]));
        let svd = matrix.svd(true, false);
        let u = svd
            .u
            .ok_or_else(|| EgtoError::kernel("svd", "left singular vectors were not computed"))?;
        let singular_values = svd.singular_values;

        let mut order = (0..singular_values.len()).collect::<Vec<_>>();
        order.sort_by(|&a, &b| singular_values[b].total_cmp(&singular_values[a]));
        let projection = DMatrix::from_fn(repsize, npcas, |r, c| u[(r, order[c])]);

        let total = singular_values.sum();
        let kept: f64 = order[..npcas].iter().map(|&i| singular_values[i]).sum();
        let explained_variance = if total > 0.0 { 100.0 * kept / total } else { 0.0 };
        log::info!(
            "{element}: {repsize} -> {npcas}, cumulative explained feature variance \
             {explained_variance:6.2}%"
        );

        Ok(Self {
            element,
            projection,
            explained_variance,
        })
    }

    pub fn element(&self) -> Element {
        self.element
    }

    /// Features per row before projection.
    pub fn input_size(&self) -> usize {
        self.projection.nrows()
    }

    /// Features per row after projection.
    pub fn output_size(&self) -> usize {
        self.projection.ncols()
    }

    /// Share of the summed singular values kept, in percent.
    pub fn explained_variance(&self) -> f64 {
        self.explained_variance
    }

    /// `(…, repsize)` to `(…, npcas)`.
    pub fn project_representation(&self, representation: &Tensor<f32>) -> Result<Tensor<f32>> {
        self.contract("representation", representation)
    }

    /// `(…, 3, repsize)` to `(…, 3, npcas)`.
    pub fn project_derivative(&self, derivative: &Tensor<f32>) -> Result<Tensor<f32>> {
        let dim = derivative.dim();
        if dim < 2 || derivative.size(dim - 2) != 3 {
            return Err(EgtoError::shape(
                "derivative",
                format!("(..., 3, {})", self.input_size()),
                derivative.shape(),
            ));
        }
        self.contract("derivative", derivative)
    }

    fn contract(&self, argument: &'static str, input: &Tensor<f32>) -> Result<Tensor<f32>> {
        let repsize = self.input_size();
        let dim = input.dim();
        if dim == 0 || input.size(dim - 1) != repsize {
            return Err(EgtoError::shape(
                argument,
                format!("(..., {repsize})"),
                input.shape(),
            ));
        }
        let rows = input.numel() / repsize;
        let values = input.data().iter().map(|&v| f64::from(v)).collect::<Vec<_>>();
        let product = DMatrix::from_row_slice(rows, repsize, &values) * &self.projection;

        let mut shape = input.shape().to_vec();
        shape[dim - 1] = self.output_size();
        // nalgebra stores columns contiguously; the transpose is the row-major order.
        let data = product.transpose().iter().map(|&v| v as f32).collect();
        Tensor::from_vec(&shape, data, input.device())
    }
}

/// Fits one [`Reductor`] per element of `species` that occurs in `charges`.
///
/// `representation` is `(…, repsize)` with one row per entry of `charges`; rows whose charge is
/// not a known element (padding) are never sampled.  At most `max_samples` rows per element are
/// used, spread evenly over the occurrences.
pub fn get_reductors(
    representation: &Tensor<f32>,
    charges: &Tensor<f32>,
    species: &[Element],
    npcas: usize,
    max_samples: usize,
) -> Result<Vec<Reductor>> {
    let dim = representation.dim();
    let repsize = if dim == 0 { 0 } else { representation.size(dim - 1) };
    if repsize == 0 || charges.numel() * repsize != representation.numel() {
        return Err(EgtoError::shape(
            "representation",
            format!("one feature row per charge ({} charges)", charges.numel()),
            representation.shape(),
        ));
    }
    if max_samples == 0 {
        return Err(EgtoError::parameter("max_samples", "must be at least 1"));
    }

    let rows = representation.data().chunks_exact(repsize).collect::<Vec<_>>();
    let mut reductors = Vec::with_capacity(species.len());
    for &element in species {
        let occurrences = charges
            .data()
            .iter()
            .enumerate()
            .filter(|&(_, &z)| Element::from_charge(z) == Some(element))
            .map(|(i, _)| i)
            .collect::<Vec<_>>();
        if occurrences.is_empty() {
            log::debug!("{element} does not occur; no reductor fitted");
            continue;
        }
        let chosen = occurrences.len().min(max_samples);
        let samples = (0..chosen)
            .map(|i| rows[occurrences[i * occurrences.len() / chosen]])
            .collect::<Vec<_>>();
        reductors.push(Reductor::fit(element, &samples, npcas)?);
    }
    Ok(reductors)
}


// End of File
