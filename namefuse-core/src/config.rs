//! Wrapper configuration.
//!
//! Parsed from YAML:
//!
//! ```yaml
//! native_zone: "eth"
//! grace_period_secs: 7776000
//! max_label_length: 255
//! wrapper_address: "0x1111111111111111111111111111111111111111"
//! admin: "0x2222222222222222222222222222222222222222"
//! ```

use crate::name::{namehash, Address, Node, MAX_WIRE_LABEL_LENGTH};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Default grace period after registrar expiry: 90 days.
pub const DEFAULT_GRACE_PERIOD_SECS: u64 = 90 * 24 * 60 * 60;

/// Wrapper configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WrapperConfig {
    /// Label of the single top-level zone whose names come from the
    /// legacy registrar.
    #[serde(default = "default_native_zone")]
    pub native_zone: String,
    /// Added to registrar expiry to get the wrapped expiry of native names.
    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,
    #[serde(default = "default_max_label_length")]
    pub max_label_length: usize,
    /// The wrapper's own account. Never a valid wrapped owner.
    pub wrapper_address: Address,
    /// May manage controllers and the upgrade target.
    pub admin: Address,
}

fn default_native_zone() -> String {
    "eth".into()
}

fn default_grace_period() -> u64 {
    DEFAULT_GRACE_PERIOD_SECS
}

fn default_max_label_length() -> usize {
    MAX_WIRE_LABEL_LENGTH
}

impl WrapperConfig {
    /// Config with defaults for everything but the two addresses.
    pub fn new(wrapper_address: Address, admin: Address) -> Self {
        Self {
            native_zone: default_native_zone(),
            grace_period_secs: default_grace_period(),
            max_label_length: default_max_label_length(),
            wrapper_address,
            admin,
        }
    }

    /// Parse configuration from YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(yaml).map_err(ConfigError::YamlParse)
    }

    /// Load configuration from a file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::FileRead(path.as_ref().display().to_string(), e))?;
        Self::from_yaml(&content)
    }

    /// Node of the native zone.
    pub fn native_node(&self) -> Node {
        namehash(&self.native_zone)
    }

    /// Validate the configuration, collecting every problem.
    pub fn validate(&self) -> Result<(), Vec<ConfigValidationError>> {
        let mut errors = Vec::new();

        if self.native_zone.is_empty() || self.native_zone.contains('.') {
            errors.push(ConfigValidationError {
                location: "native_zone".into(),
                message: format!(
                    "must be a single non-empty label, got '{}'",
                    self.native_zone
                ),
            });
        } else if self.native_zone.len() > MAX_WIRE_LABEL_LENGTH {
            errors.push(ConfigValidationError {
                location: "native_zone".into(),
                message: "label is longer than 255 bytes".into(),
            });
        }

        if self.max_label_length == 0 || self.max_label_length > MAX_WIRE_LABEL_LENGTH {
            errors.push(ConfigValidationError {
                location: "max_label_length".into(),
                message: format!(
                    "must be between 1 and {}, got {}",
                    MAX_WIRE_LABEL_LENGTH, self.max_label_length
                ),
            });
        }

        if self.wrapper_address.is_zero() {
            errors.push(ConfigValidationError {
                location: "wrapper_address".into(),
                message: "must not be the zero address".into(),
            });
        }

        if self.admin.is_zero() {
            errors.push(ConfigValidationError {
                location: "admin".into(),
                message: "must not be the zero address".into(),
            });
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Configuration loading error.
#[derive(Debug)]
pub enum ConfigError {
    /// YAML parsing error
    YamlParse(serde_yaml::Error),
    /// File reading error
    FileRead(String, std::io::Error),
}

impl std::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConfigError::YamlParse(e) => write!(f, "YAML parse error: {}", e),
            ConfigError::FileRead(path, e) => write!(f, "Failed to read {}: {}", path, e),
        }
    }
}

impl std::error::Error for ConfigError {}

/// Configuration validation error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    /// Field in the config (e.g., "max_label_length")
    pub location: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.location, self.message)
    }
}
