use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::GridError;

/// Environment variable the binary reads to locate a TOML grid config.
pub const CONFIG_ENV_VAR: &str = "COURTGRID_CONFIG";

/// Operating-day settings for a facility.
///
/// ```toml
/// interval_minutes = 15
/// day_start = "06:00"
/// day_end = "23:00"
/// ```
///
/// JSON requests carry the same fields in camelCase.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct GridConfig {
    #[serde(alias = "intervalMinutes")]
    pub interval_minutes: u32,
    #[serde(alias = "dayStart")]
    pub day_start: String,
    #[serde(alias = "dayEnd")]
    pub day_end: String,
}

impl Default for GridConfig {
    fn default() -> Self {
        GridConfig {
            interval_minutes: 15,
            day_start: "06:00".to_string(),
            day_end: "23:00".to_string(),
        }
    }
}

impl GridConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self, GridError> {
        Ok(toml::from_str(raw)?)
    }

    pub fn load(path: impl AsRef<Path>) -> Result<Self, GridError> {
        let path = path.as_ref();
        log::debug!("loading grid config from {}", path.display());
        let raw = std::fs::read_to_string(path)?;
        GridConfig::from_toml_str(&raw)
    }

    /// Config from `COURTGRID_CONFIG` when set, defaults otherwise.
    pub fn from_env() -> Result<Self, GridError> {
        match std::env::var_os(CONFIG_ENV_VAR) {
            Some(path) => GridConfig::load(path),
            None => Ok(GridConfig::default()),
        }
    }
}
