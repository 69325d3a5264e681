// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration loader using Figment for layered config merging.
//!
//! Supports XDG hierarchy: `./tipflow.toml` > `~/.config/tipflow/tipflow.toml`
//! > `/etc/tipflow/tipflow.toml` with environment variable overrides via
//! the `TIPFLOW_` prefix.

#![allow(clippy::result_large_err)] // figment::Error is external and cannot be boxed without wrapper

use std::path::Path;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};

use crate::model::TipflowConfig;

/// Load configuration from the standard XDG hierarchy with env var overrides.
///
/// Merge order (later overrides earlier):
/// 1. Compiled defaults
/// 2. `/etc/tipflow/tipflow.toml` (system-wide)
/// 3. `~/.config/tipflow/tipflow.toml` (user XDG config)
/// 4. `./tipflow.toml` (local directory)
/// 5. `TIPFLOW_*` environment variables
pub fn load_config() -> Result<TipflowConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TipflowConfig::default()))
        .merge(Toml::file("/etc/tipflow/tipflow.toml"))
        .merge(Toml::file(
            dirs::config_dir()
                .map(|d| d.join("tipflow/tipflow.toml"))
                .unwrap_or_default(),
        ))
        .merge(Toml::file("tipflow.toml"))
        .merge(env_provider())
        .extract()
}

/// Load configuration from a TOML string only (no XDG lookup, no env).
///
/// Used for testing and explicit configuration.
pub fn load_config_from_str(toml_content: &str) -> Result<TipflowConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TipflowConfig::default()))
        .merge(Toml::string(toml_content))
        .extract()
}

/// Load configuration from a specific file path with env var overrides.
pub fn load_config_from_path(path: &Path) -> Result<TipflowConfig, figment::Error> {
    Figment::new()
        .merge(Serialized::defaults(TipflowConfig::default()))
        .merge(Toml::file(path))
        .merge(env_provider())
        .extract()
}

/// Create the environment variable provider using explicit `map()` for
/// section-to-dot mapping.
///
/// Uses `Env::map()` NOT `Env::split("_")` to avoid ambiguity with
/// underscore-containing key names: `TIPFLOW_PROCESSOR_SECRET_KEY` must map
/// to `processor.secret_key`, not `processor.secret.key`.
fn env_provider() -> Env {
    Env::prefixed("TIPFLOW_").map(|key| {
        let key_str = key.as_str();
        let mapped = key_str
            .replacen("service_", "service.", 1)
            .replacen("server_", "server.", 1)
            .replacen("storage_", "storage.", 1)
            .replacen("processor_", "processor.", 1)
            .replacen("refund_", "refund.", 1)
            .replacen("summary_", "summary.", 1);
        mapped.into()
    })
}
