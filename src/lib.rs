// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

//! Elemental Gaussian-type orbital (eGTO) atomic representations.
//!
//! Every atom is described by how its neighbours, grouped by element, project onto a set of
//! Cartesian Gaussian-type orbitals.  The low-level entry points ([`get_egto`],
//! [`get_egto_rswitch`], [`get_element_types`]) take precomputed neighbour lists and basis tensors
//! and are also reachable by name through a [`Module`].  [`ElementalGto`] wraps them behind a
//! configuration and derives everything else from a padded batch of structures, and
//! [`Reductor`]s compress its per-atom features element by element.

pub mod basis;
mod binding;
mod calculator;
pub mod config;
mod device;
mod error;
pub mod kernels;
mod module;
pub mod neighbours;
pub mod reduction;
pub mod shape;
pub mod species;
pub mod structure;
mod tensor;
mod validate;

pub use binding::{get_egto, get_egto_rswitch, get_element_types, EgtoOutput, EgtoRequest};
pub use calculator::ElementalGto;
pub use config::{ConfigError, CutoffFunction, EgtoConfig};
pub use device::Device;
pub use error::{EgtoError, Result};
pub use kernels::{Backend, Cutoff, HostBackend};
pub use module::{register, Arg, Function, Module};
pub use reduction::{get_reductors, Reductor};
pub use tensor::{Scalar, Tensor};

pub use common::PeriodicCell;
pub use periodic_table::Element;

pub const APP_NAME: &str = "egto";

/// Crates whose log output the command line tool enables.
pub const LOG_TARGETS: &[&str] = &[
    env!("CARGO_PKG_NAME"),
    "egto_common",
    "egto_logging",
    "egto_periodic_table",
];

// End of File
