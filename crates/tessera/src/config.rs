//! # Driver Configuration
//!
//! ```toml
//! frames = 600
//! fixed_dt = 0.016666668
//! entity_count = 1000
//! log_filter = "info,tessera_core=debug"
//!
//! [ecs]
//! entity_capacity = 4096
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use tessera_core::{ConfigError, EcsConfig};

/// Headless run settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct HeadlessConfig {
    /// Coordinator sizing.
    pub ecs: EcsConfig,
    /// Number of update + render frames to run.
    pub frames: u32,
    /// Seconds per frame.
    pub fixed_dt: f32,
    /// Movers kept alive in the demo world.
    pub entity_count: u32,
    /// `EnvFilter` directives used when `RUST_LOG` is unset.
    pub log_filter: String,
}

impl Default for HeadlessConfig {
    fn default() -> Self {
        Self {
            ecs: EcsConfig::default(),
            frames: 600,
            fixed_dt: 1.0 / 60.0,
            entity_count: 1_000,
            log_filter: "info,tessera_core=debug".to_owned(),
        }
    }
}

impl HeadlessConfig {
    /// Parses and validates a TOML document.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Io`], [`ConfigError::Parse`] or [`ConfigError::Invalid`].
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&source)
    }

    /// Checks that the values are usable.
    ///
    /// The demo needs one extra id for the swarm root and one spare for
    /// the replacement spawned before an expired mover is freed.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`].
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.ecs.validate()?;

        if !self.fixed_dt.is_finite() || self.fixed_dt <= 0.0 {
            return Err(ConfigError::Invalid(format!(
                "fixed_dt must be a positive number of seconds, got {}",
                self.fixed_dt
            )));
        }
        let needed = u64::from(self.entity_count) + 3;
        if needed > u64::from(self.ecs.entity_capacity) {
            return Err(ConfigError::Invalid(format!(
                "entity_count {} does not fit in entity_capacity {}",
                self.entity_count, self.ecs.entity_capacity
            )));
        }
        Ok(())
    }
}
