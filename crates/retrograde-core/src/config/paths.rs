//! Standard locations for the configuration file

use std::path::PathBuf;

/// Get the default configuration directory
///
/// Returns: `<platform config dir>/retrograde`, falling back to `./retrograde`
pub fn default_config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("retrograde")
}

/// Get the default config file path
///
/// Returns: `<platform config dir>/retrograde/config.yaml`
pub fn default_config_path() -> PathBuf {
    default_config_dir().join("config.yaml")
}
