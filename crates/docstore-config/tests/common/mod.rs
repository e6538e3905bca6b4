// crates/docstore-config/tests/common/mod.rs
// =============================================================================
// Module: Config Test Helpers
// Description: Shared helpers for config validation tests.
// Purpose: Reduce duplication across integration tests for docstore-config.
// =============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::path::PathBuf;

use docstore_config::ConfigError;
use docstore_config::DocstoreConfig;
use tempfile::TempDir;

/// Parses a TOML string into a `DocstoreConfig` for tests.
pub fn config_from_toml(toml_str: &str) -> Result<DocstoreConfig, ConfigError> {
    DocstoreConfig::from_toml(toml_str)
}

/// Returns a minimal config with all defaults applied.
pub fn minimal_config() -> Result<DocstoreConfig, ConfigError> {
    config_from_toml("")
}

/// Writes `content` to `docstore.toml` inside `dir` and returns the path.
pub fn write_config(dir: &TempDir, content: &str) -> Result<PathBuf, String> {
    let path = dir.path().join("docstore.toml");
    std::fs::write(&path, content).map_err(|err| err.to_string())?;
    Ok(path)
}

/// Asserts that `result` failed with a message containing `needle`.
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
