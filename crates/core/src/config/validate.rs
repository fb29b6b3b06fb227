use rust_decimal::Decimal;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Matching tolerance is positive and the date window non-negative
/// - Bulk concurrency is at least 1
/// - Ticket number prefix and parent display name are not empty
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.matching.amount_tolerance <= Decimal::ZERO {
        return Err(ConfigError::ValidationError(
            "matching.amount_tolerance must be positive".to_string(),
        ));
    }

    if config.matching.date_window_days < 0 {
        return Err(ConfigError::ValidationError(
            "matching.date_window_days cannot be negative".to_string(),
        ));
    }

    if config.bulk.max_concurrency == 0 {
        return Err(ConfigError::ValidationError(
            "bulk.max_concurrency cannot be 0".to_string(),
        ));
    }

    if config.reconcile.ticket_number_prefix.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "reconcile.ticket_number_prefix cannot be empty".to_string(),
        ));
    }

    if config.reconcile.parent_display_name.trim().is_empty() {
        return Err(ConfigError::ValidationError(
            "reconcile.parent_display_name cannot be empty".to_string(),
        ));
    }

    Ok(())
}
