//! Conversion configuration.
//!
//! Values are layered: built-in defaults, then environment variables, then
//! command-line flags (applied by the CLI).
//!
//! | Variable           | Meaning                                  |
//! |--------------------|------------------------------------------|
//! | `MMU_NSIDE`        | HEALPix resolution (power of two)        |
//! | `MMU_FORMAT`       | `binary` or `json`                       |
//! | `MMU_IGNORED_KEYS` | comma list of extra keys to drop         |
//! | `MMU_TABLE`        | observation table name (default `OBS`)   |

use mmu_core::healpix::{DEFAULT_NSIDE, Healpix, HealpixError};
use mmu_core::snana::DEFAULT_TABLE;
use mmu_core::{ConversionOptions, OutputFormat};
use thiserror::Error;

pub const ENV_NSIDE: &str = "MMU_NSIDE";
pub const ENV_FORMAT: &str = "MMU_FORMAT";
pub const ENV_IGNORED_KEYS: &str = "MMU_IGNORED_KEYS";
pub const ENV_TABLE: &str = "MMU_TABLE";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {var}: '{value}'")]
    InvalidValue { var: &'static str, value: String },

    #[error(transparent)]
    Healpix(#[from] HealpixError),
}

/// Everything a conversion run needs besides its paths.
#[derive(Debug, Clone, PartialEq)]
pub struct ConvertConfig {
    pub nside: u64,
    pub format: OutputFormat,
    pub table: String,
    pub remove_source: bool,
    pub options: ConversionOptions,
}

impl Default for ConvertConfig {
    fn default() -> Self {
        Self {
            nside: DEFAULT_NSIDE,
            format: OutputFormat::default(),
            table: DEFAULT_TABLE.to_string(),
            remove_source: false,
            options: ConversionOptions::default(),
        }
    }
}

impl ConvertConfig {
    /// Defaults overlaid with the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::default().with_env(|var| std::env::var(var).ok())
    }

    /// Overlay values from `lookup` (an environment accessor).
    pub fn with_env(
        mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        if let Some(value) = lookup(ENV_NSIDE) {
            self.nside = value
                .trim()
                .parse()
                .map_err(|_| ConfigError::InvalidValue {
                    var: ENV_NSIDE,
                    value: value.clone(),
                })?;
        }

        if let Some(value) = lookup(ENV_FORMAT) {
            self.format = value.parse().map_err(|_| ConfigError::InvalidValue {
                var: ENV_FORMAT,
                value: value.clone(),
            })?;
        }

        if let Some(value) = lookup(ENV_IGNORED_KEYS) {
            self.add_ignored_keys(value.split(',').map(str::trim).filter(|k| !k.is_empty()));
        }

        if let Some(value) = lookup(ENV_TABLE) {
            let table = value.trim();
            if table.is_empty() || table.contains(char::is_whitespace) {
                return Err(ConfigError::InvalidValue {
                    var: ENV_TABLE,
                    value,
                });
            }
            self.table = table.to_string();
        }

        Ok(self)
    }

    /// Add keys to the ignore list, skipping ones already present.
    pub fn add_ignored_keys<I, S>(&mut self, keys: I)
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for key in keys {
            let key = key.as_ref();
            if !self.options.is_ignored(key) {
                self.options.ignored_keys.push(key.to_string());
            }
        }
    }

    /// The tessellation for `nside`, validated.
    pub fn healpix(&self) -> Result<Healpix, ConfigError> {
        Ok(Healpix::new(self.nside)?)
    }
}
