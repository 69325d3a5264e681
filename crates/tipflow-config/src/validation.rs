// SPDX-FileCopyrightText: 2026 Tipflow Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Validates semantic constraints that cannot be expressed via serde
//! attributes: address shapes, positive windows, currency codes.

use crate::diagnostic::ConfigError;
use crate::model::TipflowConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects all validation errors rather than failing fast.
pub fn validate_config(config: &TipflowConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::Validation {
            message: "server.host must not be empty".to_string(),
        });
    } else {
        let is_valid_ip = host.parse::<std::net::IpAddr>().is_ok();
        let is_valid_hostname = host
            .chars()
            .all(|c| c.is_alphanumeric() || c == '.' || c == '-' || c == ':');
        if !is_valid_ip && !is_valid_hostname {
            errors.push(ConfigError::Validation {
                message: format!("server.host `{host}` is not a valid IP address or hostname"),
            });
        }
    }

    if config.storage.database_path.trim().is_empty() {
        errors.push(ConfigError::Validation {
            message: "storage.database_path must not be empty".to_string(),
        });
    }

    if config.refund.window_days < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "refund.window_days must be at least 1, got {}",
                config.refund.window_days
            ),
        });
    }

    if config.summary.staleness_secs < 0 {
        errors.push(ConfigError::Validation {
            message: format!(
                "summary.staleness_secs must be non-negative, got {}",
                config.summary.staleness_secs
            ),
        });
    }

    if config.processor.request_timeout_secs == 0 {
        errors.push(ConfigError::Validation {
            message: "processor.request_timeout_secs must be at least 1".to_string(),
        });
    }

    if config.processor.signature_tolerance_secs < 1 {
        errors.push(ConfigError::Validation {
            message: format!(
                "processor.signature_tolerance_secs must be at least 1, got {}",
                config.processor.signature_tolerance_secs
            ),
        });
    }

    let currency = config.service.default_currency.as_str();
    if currency.len() != 3 || !currency.chars().all(|c| c.is_ascii_uppercase()) {
        errors.push(ConfigError::Validation {
            message: format!(
                "service.default_currency must be a three-letter uppercase code, got `{currency}`"
            ),
        });
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_validates() {
        let config = TipflowConfig::default();
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn empty_database_path_fails() {
        let mut config = TipflowConfig::default();
        config.storage.database_path = "".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("database_path"))));
    }

    #[test]
    fn zero_refund_window_fails() {
        let mut config = TipflowConfig::default();
        config.refund.window_days = 0;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("window_days"))));
    }

    #[test]
    fn lowercase_currency_fails() {
        let mut config = TipflowConfig::default();
        config.service.default_currency = "gbp".to_string();
        let errors = validate_config(&config).unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ConfigError::Validation { message } if message.contains("default_currency"))));
    }

    #[test]
    fn multiple_errors_are_collected() {
        let mut config = TipflowConfig::default();
        config.server.host = "".to_string();
        config.refund.window_days = -1;
        let errors = validate_config(&config).unwrap_err();
        assert!(errors.len() >= 2);
    }

    #[test]
    fn custom_valid_config_passes() {
        let mut config = TipflowConfig::default();
        config.server.host = "0.0.0.0".to_string();
        config.storage.database_path = "/tmp/tips.db".to_string();
        config.refund.window_days = 14;
        config.service.default_currency = "EUR".to_string();
        assert!(validate_config(&config).is_ok());
    }
}
