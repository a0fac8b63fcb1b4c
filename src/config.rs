//! # Configuration Module
//!
//! Environment variable-based configuration for the spec generator.
//!
//! ## Environment Variables
//!
//! | Variable | Default | Effect |
//! |----------|---------|--------|
//! | `SPECULATOR_INFO_TITLE` | `Swagger` | `info.title` of generated documents |
//! | `SPECULATOR_INFO_VERSION` | `1.0.0` | `info.version` of generated documents |
//! | `SPECULATOR_INFO_DESCRIPTION` | `This is a generated Open API Spec` | `info.description` |
//! | `SPECULATOR_PATH_SEPARATOR` | `/` | Segment separator used by the path tries |
//!
//! Empty values fall back to the default.
//!
//! ## Usage
//!
//! ```rust
//! use speculator::config::SpeculatorConfig;
//!
//! let config = SpeculatorConfig::from_env();
//! println!("Generated documents are titled {}", config.info_title);
//! ```

use crate::pathtrie::DEFAULT_PATH_SEPARATOR;
use crate::spec::Info;
use std::env;

pub const DEFAULT_INFO_TITLE: &str = "Swagger";
pub const DEFAULT_INFO_VERSION: &str = "1.0.0";
pub const DEFAULT_INFO_DESCRIPTION: &str = "This is a generated Open API Spec";

/// Generator configuration loaded from environment variables.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpeculatorConfig {
    pub info_title: String,
    pub info_version: String,
    pub info_description: String,
    /// Separator for template segments (default `/`)
    pub path_separator: String,
}

impl Default for SpeculatorConfig {
    fn default() -> Self {
        Self {
            info_title: DEFAULT_INFO_TITLE.to_string(),
            info_version: DEFAULT_INFO_VERSION.to_string(),
            info_description: DEFAULT_INFO_DESCRIPTION.to_string(),
            path_separator: DEFAULT_PATH_SEPARATOR.to_string(),
        }
    }
}

impl SpeculatorConfig {
    /// Load configuration from environment variables.
    #[must_use]
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();
        let read = |key: &str, default: String| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
                .unwrap_or(default)
        };
        Self {
            info_title: read("SPECULATOR_INFO_TITLE", defaults.info_title),
            info_version: read("SPECULATOR_INFO_VERSION", defaults.info_version),
            info_description: read("SPECULATOR_INFO_DESCRIPTION", defaults.info_description),
            path_separator: read("SPECULATOR_PATH_SEPARATOR", defaults.path_separator),
        }
    }

    /// `info` block of generated documents
    #[must_use]
    pub fn info(&self) -> Info {
        Info {
            title: self.info_title.clone(),
            version: self.info_version.clone(),
            description: Some(self.info_description.clone()),
            ..Info::default()
        }
    }
}
