// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Where a tensor's memory lives.  Kernels only accept tensors resident on the device their
/// backend computes on.
#[derive(Debug, Default, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Device {
    /// Ordinary host memory.
    #[default]
    Host,
    /// An accelerator, identified by its ordinal.
    Accelerator(u32),
}

impl fmt::Display for Device {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Device::Host => f.write_str("host"),
            Device::Accelerator(ordinal) => write!(f, "accelerator:{ordinal}"),
        }
    }
}

// End of File
