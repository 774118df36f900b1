// src/config.rs

//! Policy switches for the package manager
//!
//! Loaded from TOML; every key is optional.
//!
//! ```toml
//! immediate_configure = true
//! immediate_configure_all = false
//! force_loop_break = false
//! unpack_all = true
//! configure = "all"
//! debug = false
//! ```

use crate::error::Result;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::Path;
use std::str::FromStr;

/// How much configuring the engine does itself
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigureMode {
    /// Configure everything, including the final sweep
    #[default]
    All,
    /// Configure only what ordering requires; the sweep just marks packages
    Smart,
    /// Never call configure; the backend configures on its own
    No,
}

impl ConfigureMode {
    pub fn as_str(&self) -> &str {
        match self {
            ConfigureMode::All => "all",
            ConfigureMode::Smart => "smart",
            ConfigureMode::No => "no",
        }
    }

    /// SmartConfigure runs the configure primitive
    pub fn runs_configure(&self) -> bool {
        matches!(self, ConfigureMode::All | ConfigureMode::Smart)
    }
}

impl FromStr for ConfigureMode {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "all" => Ok(ConfigureMode::All),
            "smart" => Ok(ConfigureMode::Smart),
            "no" => Ok(ConfigureMode::No),
            _ => Err(format!("Invalid configure mode: {s}")),
        }
    }
}

impl fmt::Display for ConfigureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn default_true() -> bool {
    true
}

/// Policy for one transaction
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagerConfig {
    /// Configure essential/important packages and their closure right after unpack
    #[serde(default = "default_true")]
    pub immediate_configure: bool,

    /// Configure every package right after unpack
    #[serde(default)]
    pub immediate_configure_all: bool,

    /// Allow temporarily removing essential packages to break loops
    #[serde(default)]
    pub force_loop_break: bool,

    /// Full unpack order instead of critical-path-only
    #[serde(default = "default_true")]
    pub unpack_all: bool,

    #[serde(default)]
    pub configure: ConfigureMode,

    /// Enables debug-only warnings
    #[serde(default)]
    pub debug: bool,
}

impl Default for ManagerConfig {
    fn default() -> Self {
        Self {
            immediate_configure: true,
            immediate_configure_all: false,
            force_loop_break: false,
            unpack_all: true,
            configure: ConfigureMode::All,
            debug: false,
        }
    }
}

impl ManagerConfig {
    pub fn to_toml(&self) -> std::result::Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }
}

/// Parse a policy from a file
pub fn load_config(path: &Path) -> Result<ManagerConfig> {
    let content = std::fs::read_to_string(path)?;
    parse_config_string(&content)
}

/// Parse a policy from a TOML string
pub fn parse_config_string(content: &str) -> Result<ManagerConfig> {
    let config: ManagerConfig = toml::from_str(content)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = parse_config_string("").unwrap();
        assert_eq!(config, ManagerConfig::default());
        assert!(config.immediate_configure);
        assert!(config.unpack_all);
        assert_eq!(config.configure, ConfigureMode::All);
    }

    #[test]
    fn test_parse_overrides() {
        let config = parse_config_string(
            r#"
immediate_configure = false
force_loop_break = true
configure = "smart"
"#,
        )
        .unwrap();
        assert!(!config.immediate_configure);
        assert!(config.force_loop_break);
        assert_eq!(config.configure, ConfigureMode::Smart);
        assert!(config.configure.runs_configure());
        assert!(!ConfigureMode::No.runs_configure());
    }

    #[test]
    fn test_bad_mode_rejected() {
        assert!(parse_config_string("configure = \"sometimes\"").is_err());
        assert!("sometimes".parse::<ConfigureMode>().is_err());
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "immediate_configure_all = true").unwrap();
        let config = load_config(file.path()).unwrap();
        assert!(config.immediate_configure_all);

        let again = parse_config_string(&config.to_toml().unwrap()).unwrap();
        assert_eq!(again, config);
    }
}
