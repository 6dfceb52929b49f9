// This Source Code Form is subject to the terms of the Mozilla Public License, v. 2.0.
// If a copy of the MPL was not distributed with this file,
// You can obtain one at <https://mozilla.org/MPL/2.0/>.

//! # eGTO's Logging Framework
//!
//! Library code logs through the [`log`] facade only.  Executables call [`init`] once at startup,
//! which installs [`env_logger`] on desktop platforms with a per-crate filter.
//!
//! By default, the logging level is set to [`Info`](log::Level::Info) for debug builds, and
//! [`Warn`](log::Level::Warn) for release builds. This can be overridden by setting the `RUST_LOG`
//! environment variable, like so:
//!
//! ```sh
//! $> RUST_LOG=egto=debug egto --config egto.json water.xyz
//! ```

mod platform_impl;

/// The default level for the current build profile.
pub fn default_level() -> log::LevelFilter {
    if cfg!(debug_assertions) {
        log::LevelFilter::Info
    } else {
        log::LevelFilter::Warn
    }
}

/// Initializes logging for the listed crates at the profile's [`default_level`].  Calling this
/// more than once is harmless; only the first call installs a logger.
pub fn init(crates: &[&'static str]) {
    init_with_level(crates, default_level());
}

/// Like [`init`], with an explicit minimum level (e.g. from a `--verbose` flag).
pub fn init_with_level(crates: &[&'static str], log_level: log::LevelFilter) {
    crate::platform_impl::init_with_level(crates, log_level);
}

/// Builds the filter string that would have been set in `RUST_LOG`, e.g.
/// `egto=info,egto_common=info`.
pub fn filter_string(crates: &[&'static str], log_level: log::LevelFilter) -> String {
    let level_str = match log_level {
        log::LevelFilter::Off => "off",
        log::LevelFilter::Error => "error",
        log::LevelFilter::Warn => "warn",
        log::LevelFilter::Info => "info",
        log::LevelFilter::Debug => "debug",
        log::LevelFilter::Trace => "trace",
    };
    crates
        .iter()
        .map(|&pkg_name| format!("{}={}", pkg_name.replace('-', "_"), level_str))
        .collect::<Vec<_>>()
        .join(",")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_string_lists_every_crate() {
        assert_eq!(
            filter_string(&["egto", "egto-common"], log::LevelFilter::Debug),
            "egto=debug,egto_common=debug"
        );
        assert_eq!(filter_string(&[], log::LevelFilter::Warn), "");
    }

    #[test]
    fn init_twice_does_not_panic() {
        init(&["egto_logging"]);
        init(&["egto_logging"]);
    }
}

// End of File
