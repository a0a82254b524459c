//! Common configuration types for Broadcast Controller components.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Default `tracing` filter when `RUST_LOG` is not set.
pub const DEFAULT_LOG_FILTER: &str = "bc_service=debug,tower_http=debug";

/// Observability configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// `tracing` env-filter directive (trace, debug, info, warn, error per target)
    pub log_filter: String,
    /// Enable JSON-formatted logs
    pub json_logs: bool,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            json_logs: false,
        }
    }
}

impl ObservabilityConfig {
    /// Read `RUST_LOG` and `BC_LOG_JSON` from a variable map.
    ///
    /// `BC_LOG_JSON` accepts `true`/`1` (case-insensitive); anything else is off.
    #[must_use]
    pub fn from_vars(vars: &HashMap<String, String>) -> Self {
        let log_filter = vars
            .get("RUST_LOG")
            .cloned()
            .unwrap_or_else(|| DEFAULT_LOG_FILTER.to_string());

        let json_logs = vars
            .get("BC_LOG_JSON")
            .is_some_and(|v| v.eq_ignore_ascii_case("true") || v == "1");

        Self {
            log_filter,
            json_logs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_when_unset() {
        let config = ObservabilityConfig::from_vars(&HashMap::new());
        assert_eq!(config, ObservabilityConfig::default());
        assert!(!config.json_logs);
    }

    #[test]
    fn test_json_logs_flag() {
        let vars = HashMap::from([
            ("BC_LOG_JSON".to_string(), "TRUE".to_string()),
            ("RUST_LOG".to_string(), "info".to_string()),
        ]);
        let config = ObservabilityConfig::from_vars(&vars);
        assert!(config.json_logs);
        assert_eq!(config.log_filter, "info");

        let vars = HashMap::from([("BC_LOG_JSON".to_string(), "yes".to_string())]);
        assert!(!ObservabilityConfig::from_vars(&vars).json_logs);
    }
}
