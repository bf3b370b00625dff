// crates/slowbro-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for slowbro-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use slowbro_config::ConfigError;
use slowbro_config::SlowbroConfig;

/// Parses a TOML string into a `SlowbroConfig` without validation.
pub fn config_from_toml(toml_str: &str) -> Result<SlowbroConfig, toml::de::Error> {
    toml::from_str(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<SlowbroConfig, toml::de::Error> {
    config_from_toml("")
}

/// Asserts that a result is an error whose message contains `needle`.
pub fn assert_invalid<T>(result: Result<T, ConfigError>, needle: &str) -> Result<(), String> {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(_) => Err("expected invalid config".to_string()),
    }
}
