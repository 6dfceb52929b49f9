// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

//! Hyperparameters of the [`ElementalGto`](crate::ElementalGto) calculator, loaded from JSON.
//!
//! ```json
//! {
//!     "species": [1, 6, 7, 8],
//!     "high_cutoff": 6.0,
//!     "ngaussians": 24,
//!     "eta": 1.2,
//!     "lmax": 3,
//!     "lchannel_weights": [1.0, 1.0, 0.5, 0.25],
//!     "cutoff_function": "switch",
//!     "rswitch": 4.5
//! }
//! ```
//!
//! Missing keys take their default.  `lchannel_weights` and `inv_factors` take either one number
//! for every angular channel or a list with one entry per channel.

use periodic_table::Element;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("unable to read {path}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("malformed configuration: {0}")]
    Json(#[from] serde_json::Error),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Which radial cutoff multiplies every neighbour contribution.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CutoffFunction {
    #[default]
    Cosine,
    #[serde(alias = "rswitch")]
    Switch,
}

/// A value given once for every angular channel, or once per channel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ChannelValues {
    Uniform(f64),
    PerChannel(Vec<f64>),
}

impl Default for ChannelValues {
    fn default() -> Self {
        ChannelValues::Uniform(1.0)
    }
}

impl ChannelValues {
    /// One value for each of the `lmax + 1` channels.
    pub fn expand(&self, lmax: usize) -> Vec<f64> {
        match self {
            ChannelValues::Uniform(value) => vec![*value; lmax + 1],
            ChannelValues::PerChannel(values) => values.clone(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EgtoConfig {
    /// Elements with their own channels.  Atoms of other elements contribute nothing.
    pub species: Vec<Element>,
    /// Neighbour cutoff and the last Gaussian centre, in Ångström.
    pub high_cutoff: f64,
    pub ngaussians: usize,
    pub eta: f64,
    pub lmax: usize,
    pub lchannel_weights: ChannelValues,
    pub inv_factors: ChannelValues,
    pub cutoff_function: CutoffFunction,
    /// Start of the switching region; only read with [`CutoffFunction::Switch`].
    pub rswitch: f64,
}

impl Default for EgtoConfig {
    fn default() -> Self {
        Self {
            species: vec![Element::Hydrogen, Element::Carbon, Element::Nitrogen, Element::Oxygen],
            high_cutoff: 6.0,
            ngaussians: 24,
            eta: 1.2,
            lmax: 3,
            lchannel_weights: ChannelValues::default(),
            inv_factors: ChannelValues::default(),
            cutoff_function: CutoffFunction::Cosine,
            rswitch: 4.5,
        }
    }
}

impl EgtoConfig {
    /// Reads and validates a JSON configuration file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_owned(),
            source,
        })?;
        let config = Self::from_json_str(&text)?;
        log::info!("loaded eGTO configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_json_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |reason: String| Err(ConfigError::Invalid(reason));
        if self.species.is_empty() {
            return invalid("species must name at least one element".into());
        }
        for (i, element) in self.species.iter().enumerate() {
            if self.species[..i].contains(element) {
                return invalid(format!("{element} is listed twice in species"));
            }
        }
        if !(self.high_cutoff.is_finite() && self.high_cutoff > 0.0) {
            return invalid(format!("high_cutoff {} is not positive", self.high_cutoff));
        }
        if self.ngaussians == 0 {
            return invalid("ngaussians must be at least 1".into());
        }
        if !(self.eta.is_finite() && self.eta > 0.0) {
            return invalid(format!("eta {} is not positive", self.eta));
        }
        for (name, values) in [
            ("lchannel_weights", &self.lchannel_weights),
            ("inv_factors", &self.inv_factors),
        ] {
            let count = values.expand(self.lmax).len();
            if count != self.lmax + 1 {
                return invalid(format!(
                    "{name} has {count} entries, lmax {} needs {}",
                    self.lmax,
                    self.lmax + 1
                ));
            }
        }
        if self.cutoff_function == CutoffFunction::Switch
            && !(0.0..self.high_cutoff).contains(&self.rswitch)
        {
            return invalid(format!(
                "rswitch {} is outside [0, {})",
                self.rswitch, self.high_cutoff
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_gives_the_defaults() {
        let config = EgtoConfig::from_json_str("{}").unwrap();
        assert_eq!(config, EgtoConfig::default());
        assert_eq!(config.species.len(), 4);
        assert_eq!(config.cutoff_function, CutoffFunction::Cosine);
    }

    #[test]
    fn channel_values_take_scalars_or_lists() {
        let config = EgtoConfig::from_json_str(
            r#"{"lmax": 2, "lchannel_weights": [1.0, 0.5, 0.25], "inv_factors": 2.0}"#,
        )
        .unwrap();
        assert_eq!(config.lchannel_weights.expand(2), vec![1.0, 0.5, 0.25]);
        assert_eq!(config.inv_factors.expand(2), vec![2.0; 3]);
    }

    #[test]
    fn channel_count_must_match_lmax() {
        let err = EgtoConfig::from_json_str(r#"{"lmax": 1, "lchannel_weights": [1.0]}"#);
        assert!(matches!(err, Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn species_by_atomic_number() {
        let config = EgtoConfig::from_json_str(r#"{"species": [1, 8]}"#).unwrap();
        assert_eq!(config.species, vec![Element::Hydrogen, Element::Oxygen]);
        assert!(EgtoConfig::from_json_str(r#"{"species": [1, 1]}"#).is_err());
        assert!(EgtoConfig::from_json_str(r#"{"species": [0]}"#).is_err());
    }

    #[test]
    fn switch_cutoff_checks_rswitch() {
        let ok = r#"{"cutoff_function": "rswitch", "rswitch": 3.0}"#;
        assert_eq!(
            EgtoConfig::from_json_str(ok).unwrap().cutoff_function,
            CutoffFunction::Switch
        );
        let bad = r#"{"cutoff_function": "switch", "rswitch": 7.0}"#;
        assert!(matches!(
            EgtoConfig::from_json_str(bad),
            Err(ConfigError::Invalid(_))
        ));
    }

    #[test]
    fn unknown_keys_are_rejected() {
        assert!(matches!(
            EgtoConfig::from_json_str(r#"{"cutof": 6.0}"#),
            Err(ConfigError::Json(_))
        ));
    }
}

// End of File
