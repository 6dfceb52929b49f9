// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

//! Device placement guard run by every entry point before anything is allocated.

use crate::{
    device::Device,
    error::{EgtoError, Result},
};

/// Collects `(argument name, device)` pairs for the named tensor fields of a struct, in the order
/// given, e.g. `tensor_devices!(request; coordinates, charges)`.
macro_rules! tensor_devices {
    ($owner:expr; $($field:ident),+ $(,)?) => {
        [$((stringify!($field), $owner.$field.device())),+]
    };
}
pub(crate) use tensor_devices;

/// Fails on the first argument not resident on `expected`.
pub fn require_device(
    expected: Device,
    arguments: impl IntoIterator<Item = (&'static str, Device)>,
) -> Result<()> {
    for (argument, found) in arguments {
        if found != expected {
            log::debug!("rejecting {argument}: resident on {found}, kernel runs on {expected}");
            return Err(EgtoError::WrongDevice {
                argument,
                expected,
                found,
            });
        }
    }
    Ok(())
}


// End of File
