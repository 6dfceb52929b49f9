// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

use ultraviolet::DVec3;

/// An axis-aligned bounding box defined by two opposite corners (`min` and `max`).
/// `min.x <= max.x`, `min.y <= max.y`, `min.z <= max.z`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct BoundingBox {
    pub min: DVec3,
    pub max: DVec3,
}

impl BoundingBox {
    /// The smallest box containing every point, or `None` for an empty iterator.
    pub fn from_points(points: impl IntoIterator<Item = DVec3>) -> Option<Self> {
        let mut points = points.into_iter();
        let first = points.next()?;
        let mut bounds = Self {
            min: first,
            max: first,
        };
        for point in points {
            bounds.enclose_point(point);
        }
        Some(bounds)
    }

    /// Grows this `BoundingBox` in-place to ensure that it will contain a given `point`.
    pub fn enclose_point(&mut self, point: DVec3) {
        self.min = self.min.min_by_component(point);
        self.max = self.max.max_by_component(point);
    }

    pub fn extent(&self) -> DVec3 {
        self.max - self.min
    }

    /// Number of cubic bins of side `bin_size` needed along each axis to tile the box.  Always at
    /// least one bin per axis, even for a degenerate (flat or point-like) box.  Saturates at
    /// `usize::MAX` for bins too small to count.
    pub fn bins(&self, bin_size: f64) -> [usize; 3] {
        let extent = self.extent();
        [extent.x, extent.y, extent.z]
            .map(|length| ((length / bin_size).floor() as usize).saturating_add(1))
    }

    /// Total bin count of [`BoundingBox::bins`], or `None` when it does not fit in a `usize`.
    pub fn bin_count(&self, bin_size: f64) -> Option<usize> {
        self.bins(bin_size)
            .into_iter()
            .try_fold(1usize, |total, n| total.checked_mul(n))
    }

    /// Integer bin coordinates of `point` in the tiling returned by [`BoundingBox::bins`].
    pub fn bin_of(&self, point: DVec3, bin_size: f64) -> [usize; 3] {
        let bins = self.bins(bin_size);
        let local = point - self.min;
        let mut bin = [0; 3];
        for (axis, value) in [local.x, local.y, local.z].into_iter().enumerate() {
            bin[axis] = ((value.max(0.0) / bin_size).floor() as usize).min(bins[axis] - 1);
        }
        bin
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_points_encloses_everything() {
        let bounds = BoundingBox::from_points([
            DVec3::new(0.0, 1.0, -1.0),
            DVec3::new(2.0, -3.0, 0.5),
            DVec3::new(1.0, 0.0, 4.0),
        ])
        .unwrap();
        assert_eq!(bounds.min, DVec3::new(0.0, -3.0, -1.0));
        assert_eq!(bounds.max, DVec3::new(2.0, 1.0, 4.0));
        assert!(BoundingBox::from_points(std::iter::empty()).is_none());
    }

    #[test]
    fn degenerate_boxes_still_have_one_bin() {
        let bounds = BoundingBox::from_points([DVec3::new(1.0, 1.0, 1.0)]).unwrap();
        assert_eq!(bounds.bins(2.0), [1, 1, 1]);
        assert_eq!(bounds.bin_of(DVec3::new(1.0, 1.0, 1.0), 2.0), [0, 0, 0]);
    }

    #[test]
    fn bins_cover_the_far_corner() {
        let bounds =
            BoundingBox::from_points([DVec3::zero(), DVec3::new(4.0, 1.0, 0.0)]).unwrap();
        assert_eq!(bounds.bins(2.0), [3, 1, 1]);
        assert_eq!(bounds.bin_of(DVec3::new(4.0, 1.0, 0.0), 2.0), [2, 0, 0]);
        assert_eq!(bounds.bin_of(DVec3::new(1.9, 0.0, 0.0), 2.0), [0, 0, 0]);
        assert_eq!(bounds.bin_count(2.0), Some(3));
    }

    #[test]
    fn tiny_bins_saturate() {
        let bounds =
            BoundingBox::from_points([DVec3::zero(), DVec3::new(1.0, 0.0, 0.0)]).unwrap();
        assert_eq!(bounds.bins(1e-30), [usize::MAX, 1, 1]);
        assert_eq!(bounds.bin_count(1e-30), Some(usize::MAX));
        assert_eq!(
            bounds.bin_of(DVec3::new(1.0, 0.0, 0.0), 1e-30),
            [usize::MAX - 1, 0, 0]
        );

        let cube = BoundingBox::from_points([DVec3::zero(), DVec3::one()]).unwrap();
        assert_eq!(cube.bin_count(1e-30), None);
    }
}

// End of File
