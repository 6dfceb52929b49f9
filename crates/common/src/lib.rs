// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

//! Geometry shared by the eGTO crates: bounding boxes for spatial binning and periodic cells for
//! the minimum image convention.

mod bounding_box;
mod cell;

pub use bounding_box::BoundingBox;
pub use cell::{CellError, PeriodicCell};

// End of File
