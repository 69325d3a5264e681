// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup.

use serde::{Deserialize, Serialize};

/// Top-level Tipflow configuration.
///
/// Loaded from TOML files following the XDG hierarchy, with environment
/// variable overrides. All sections are optional and default to sensible
/// values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TipflowConfig {
    /// Service identity and logging.
    #[serde(default)]
    pub service: ServiceConfig,

    /// HTTP server settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Storage backend settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// External payment processor settings.
    #[serde(default)]
    pub processor: ProcessorConfig,

    /// Refund policy settings.
    #[serde(default)]
    pub refund: RefundConfig,

    /// Summary cache settings.
    #[serde(default)]
    pub summary: SummaryConfig,
}

/// Service identity and logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Default currency for tips and summaries when none is supplied.
    #[serde(default = "default_currency")]
    pub default_currency: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            default_currency: default_currency(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_currency() -> String {
    "GBP".to_string()
}

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token guarding the operator routes (refunds, summaries).
    /// `None` leaves them open, which is only acceptable in development.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8470
}

/// Storage backend configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_database_path")]
    pub database_path: String,

    /// Enable WAL (Write-Ahead Logging) mode for SQLite.
    #[serde(default = "default_wal_mode")]
    pub wal_mode: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
            wal_mode: default_wal_mode(),
        }
    }
}

fn default_database_path() -> String {
    dirs::data_dir()
        .map(|p| p.join("tipflow").join("tipflow.db"))
        .and_then(|p| p.to_str().map(str::to_string))
        .unwrap_or_else(|| "tipflow.db".to_string())
}

fn default_wal_mode() -> bool {
    true
}

/// External payment processor configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ProcessorConfig {
    /// Base URL of the processor API.
    #[serde(default = "default_processor_base_url")]
    pub base_url: String,

    /// API secret key. `None` requires the environment variable
    /// `TIPFLOW_PROCESSOR_SECRET_KEY`.
    #[serde(default)]
    pub secret_key: Option<String>,

    /// Shared secret for webhook signature verification.
    #[serde(default)]
    pub webhook_secret: Option<String>,

    /// Bound on outbound charge/refund calls, in seconds.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,

    /// Webhook timestamp tolerance for replay prevention, in seconds.
    #[serde(default = "default_signature_tolerance_secs")]
    pub signature_tolerance_secs: i64,
}

impl Default for ProcessorConfig {
    fn default() -> Self {
        Self {
            base_url: default_processor_base_url(),
            secret_key: None,
            webhook_secret: None,
            request_timeout_secs: default_request_timeout_secs(),
            signature_tolerance_secs: default_signature_tolerance_secs(),
        }
    }
}

fn default_processor_base_url() -> String {
    "https://api.stripe.com".to_string()
}

fn default_request_timeout_secs() -> u64 {
    15
}

fn default_signature_tolerance_secs() -> i64 {
    300
}

/// Refund policy configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RefundConfig {
    /// Days after settlement during which a tip may be refunded.
    #[serde(default = "default_refund_window_days")]
    pub window_days: i64,
}

impl Default for RefundConfig {
    fn default() -> Self {
        Self {
            window_days: default_refund_window_days(),
        }
    }
}

fn default_refund_window_days() -> i64 {
    30
}

/// Summary cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SummaryConfig {
    /// Seconds a cached summary stays fresh before `get_or_rebuild`
    /// triggers a recalculation.
    #[serde(default = "default_staleness_secs")]
    pub staleness_secs: i64,
}

impl Default for SummaryConfig {
    fn default() -> Self {
        Self {
            staleness_secs: default_staleness_secs(),
        }
    }
}

fn default_staleness_secs() -> i64 {
    300
}
