// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration system for the Tipflow settlement engine.
//!
//! TOML configuration with strict parsing (`deny_unknown_fields`), XDG
//! file hierarchy lookup, environment variable overrides, and miette
//! diagnostics with typo suggestions for unknown keys.
//!
//! # Usage
//!
//! ```no_run
//! use tipflow_config::load_and_validate;
//!
//! let config = load_and_validate().expect("config errors");
//! println!("listening on {}:{}", config.server.host, config.server.port);
//! ```

pub mod diagnostic;
pub mod loader;
pub mod model;
pub mod validation;

pub use diagnostic::{render_errors, ConfigError};
pub use loader::{load_config, load_config_from_path, load_config_from_str};
pub use model::TipflowConfig;

/// Load configuration from the XDG hierarchy and validate it.
///
/// Returns either a valid [`TipflowConfig`] or a list of diagnostic
/// errors ready for [`render_errors`].
pub fn load_and_validate() -> Result<TipflowConfig, Vec<ConfigError>> {
    match loader::load_config() {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err)),
    }
}

/// Load configuration from a TOML string and validate it.
///
/// Useful for testing and explicit configuration.
pub fn load_and_validate_str(toml_content: &str) -> Result<TipflowConfig, Vec<ConfigError>> {
    match loader::load_config_from_str(toml_content) {
        Ok(config) => {
            validation::validate_config(&config)?;
            Ok(config)
        }
        Err(err) => Err(diagnostic::figment_to_config_errors(err)),
    }
}
