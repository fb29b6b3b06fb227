//! Matching engine configuration.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Tunables for the ticket matching rules.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchingConfig {
    /// Amounts match when they differ by strictly less than this.
    #[serde(default = "default_amount_tolerance")]
    pub amount_tolerance: Decimal,
    /// Maximum distance between ticket creation and charge date, inclusive.
    #[serde(default = "default_date_window_days")]
    pub date_window_days: i64,
}

fn default_amount_tolerance() -> Decimal {
    Decimal::new(1, 2)
}

fn default_date_window_days() -> i64 {
    30
}

impl Default for MatchingConfig {
    fn default() -> Self {
        Self {
            amount_tolerance: default_amount_tolerance(),
            date_window_days: default_date_window_days(),
        }
    }
}

impl MatchingConfig {
    /// The date window in seconds.
    pub fn date_window_secs(&self) -> i64 {
        self.date_window_days.saturating_mul(86_400)
    }
}
