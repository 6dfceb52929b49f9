// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

use crate::{config::ConfigError, device::Device};
use common::CellError;
use thiserror::Error;

pub type Result<T, E = EgtoError> = std::result::Result<T, E>;

/// Errors raised by the eGTO entry points and the kernels behind them.
///
/// [`EgtoError::WrongDevice`] is the precondition guard of every entry point: it is reported
/// before any output buffer is allocated.
#[derive(Debug, Error)]
pub enum EgtoError {
    /// A tensor argument is not resident on the device the backend computes on.
    #[error("{argument} must be resident on {expected} (found on {found})")]
    WrongDevice {
        argument: &'static str,
        expected: Device,
        found: Device,
    },

    /// A tensor argument has the wrong rank or extents.
    #[error("{argument} has shape {found:?}, expected {expected}")]
    ShapeMismatch {
        argument: &'static str,
        expected: String,
        found: Vec<usize>,
    },

    /// A scalar hyperparameter is out of range.
    #[error("invalid {name}: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// A positional argument passed through [`Module::call`](crate::Module::call) has the wrong
    /// kind, or the argument count is wrong.
    #[error("{function}: argument {position}: {reason}")]
    Argument {
        function: String,
        position: usize,
        reason: String,
    },

    /// No entry point with this name was registered.
    #[error("no function named {0:?} is registered")]
    UnknownFunction(String),

    /// The kernel rejected its inputs while running.  Fatal to the call.
    #[error("{kernel} kernel failed: {reason}")]
    Kernel { kernel: &'static str, reason: String },

    #[error(transparent)]
    Cell(#[from] CellError),

    #[error(transparent)]
    Config(#[from] ConfigError),
}

impl EgtoError {
    pub(crate) fn shape(
        argument: &'static str,
        expected: impl Into<String>,
        found: &[usize],
    ) -> Self {
        Self::ShapeMismatch {
            argument,
            expected: expected.into(),
            found: found.to_vec(),
        }
    }

    pub(crate) fn parameter(name: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    pub(crate) fn kernel(kernel: &'static str, reason: impl Into<String>) -> Self {
        Self::Kernel {
            kernel,
            reason: reason.into(),
        }
    }
}


// End of File
