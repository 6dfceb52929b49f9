// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

//! A minimal dense, row-major tensor tagged with the [`Device`] its memory lives on.
//!
//! Only the two element types the kernels exchange are supported: `f32` for coordinates, charges
//! and outputs, and `i32` for index tables (neighbour lists, element types, block ids).

use crate::{
    device::Device,
    error::{EgtoError, Result},
};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

/// Element types a [`Tensor`] may hold.
pub trait Scalar: Copy + Default + PartialEq + Debug + Send + Sync + 'static {}

impl Scalar for f32 {}

impl Scalar for i32 {}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tensor<T> {
    shape: Vec<usize>,
    data: Vec<T>,
    #[serde(default)]
    device: Device,
}

impl<T: Scalar> Tensor<T> {
    /// Wraps `data` (row-major) as a tensor of the given shape.
    pub fn from_vec(shape: &[usize], data: Vec<T>, device: Device) -> Result<Self> {
        let expected: usize = shape.iter().product();
        if expected != data.len() {
            return Err(EgtoError::shape(
                "tensor data",
                format!("{expected} elements"),
                &[data.len()],
            ));
        }
        Ok(Self {
            shape: shape.to_vec(),
            data,
            device,
        })
    }

    /// A zero-filled tensor.
    pub fn zeros(shape: &[usize], device: Device) -> Self {
        Self {
            shape: shape.to_vec(),
            data: vec![T::default(); shape.iter().product()],
            device,
        }
    }

    /// A one-dimensional tensor holding `data`.
    pub fn vector(data: Vec<T>, device: Device) -> Self {
        Self {
            shape: vec![data.len()],
            data,
            device,
        }
    }

    pub fn device(&self) -> Device {
        self.device
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    /// Number of dimensions.
    pub fn dim(&self) -> usize {
        self.shape.len()
    }

    /// Extent of dimension `dim`, or zero when the tensor has fewer dimensions.
    pub fn size(&self, dim: usize) -> usize {
        self.shape.get(dim).copied().unwrap_or(0)
    }

    pub fn numel(&self) -> usize {
        self.data.len()
    }

    pub fn data(&self) -> &[T] {
        &self.data
    }

    pub fn data_mut(&mut self) -> &mut [T] {
        &mut self.data
    }

    /// Row-major offset of a full multi-index.  Panics on rank mismatch or out-of-range
    /// indices, like slice indexing.
    pub fn offset(&self, index: &[usize]) -> usize {
        assert_eq!(index.len(), self.shape.len(), "index rank mismatch");
        index
            .iter()
            .zip(&self.shape)
            .fold(0, |offset, (&i, &extent)| {
                assert!(i < extent, "index {i} out of range for extent {extent}");
                offset * extent + i
            })
    }

    pub fn get(&self, index: &[usize]) -> T {
        self.data[self.offset(index)]
    }

    pub fn set(&mut self, index: &[usize], value: T) {
        let offset = self.offset(index);
        self.data[offset] = value;
    }

    /// Returns a copy with a new dimension of extent one inserted at `dim`.
    pub fn unsqueeze(&self, dim: usize) -> Self {
        let mut shape = self.shape.clone();
        shape.insert(dim.min(shape.len()), 1);
        Self {
            shape,
            data: self.data.clone(),
            device: self.device,
        }
    }

    /// Reinterprets the data with a new shape of equal element count.
    pub fn reshape(self, shape: &[usize]) -> Result<Self> {
        Self::from_vec(shape, self.data, self.device)
    }

    /// Copies the tensor, tagging the copy as resident on `device`.
    pub fn to_device(&self, device: Device) -> Self {
        Self {
            shape: self.shape.clone(),
            data: self.data.clone(),
            device,
        }
    }

    /// Contiguous sub-tensor at `index` along the leading dimension.
    pub fn row(&self, index: usize) -> &[T] {
        let stride = self.stride(0);
        &self.data[index * stride..(index + 1) * stride]
    }

    /// Number of elements spanned by one step along dimension `dim`.
    pub fn stride(&self, dim: usize) -> usize {
        self.shape.iter().skip(dim + 1).product()
    }
}

impl Tensor<i32> {
    /// Largest element, or `None` for an empty tensor.
    pub fn max(&self) -> Option<i32> {
        self.data.iter().copied().max()
    }
}

impl Tensor<f32> {
    /// Largest absolute element-wise difference to `other`, or `None` when the shapes differ.
    pub fn max_abs_diff(&self, other: &Self) -> Option<f32> {
        (self.shape == other.shape).then(|| {
            self.data
                .iter()
                .zip(&other.data)
                .map(|(a, b)| (a - b).abs())
                .fold(0.0, f32::max)
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_vec_checks_element_count() {
        assert!(Tensor::from_vec(&[2, 3], vec![0.0f32; 6], Device::Host).is_ok());
        assert!(matches!(
            Tensor::from_vec(&[2, 3], vec![0.0f32; 5], Device::Host),
            Err(EgtoError::ShapeMismatch { .. })
        ));
    }

    #[test]
    fn zeros_are_zero() {
        let t = Tensor::<f32>::zeros(&[2, 2, 3], Device::Accelerator(1));
        assert_eq!(t.numel(), 12);
        assert!(t.data().iter().all(|&x| x == 0.0));
        assert_eq!(t.device(), Device::Accelerator(1));
    }

    #[test]
    fn unsqueeze_inserts_leading_batch() {
        let t = Tensor::from_vec(&[4, 3], (0..12).collect::<Vec<i32>>(), Device::Host).unwrap();
        let batched = t.unsqueeze(0);
        assert_eq!(batched.shape(), &[1, 4, 3]);
        assert_eq!(batched.data(), t.data());
        assert_eq!(batched.get(&[0, 2, 1]), 7);
    }

    #[test]
    fn offsets_are_row_major() {
        let mut t = Tensor::<i32>::zeros(&[2, 3, 4], Device::Host);
        assert_eq!(t.offset(&[1, 2, 3]), 23);
        assert_eq!(t.stride(0), 12);
        assert_eq!(t.stride(1), 4);
        t.set(&[1, 0, 2], 5);
        assert_eq!(t.row(1)[2], 5);
        assert_eq!(t.size(5), 0);
    }

    #[test]
    #[should_panic]
    fn out_of_range_index_panics() {
        let t = Tensor::<f32>::zeros(&[2, 2], Device::Host);
        t.get(&[2, 0]);
    }
}

// End of File
