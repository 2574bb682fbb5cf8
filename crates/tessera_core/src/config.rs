//! # ECS Configuration
//!
//! Sizing knobs for a [`Coordinator`](crate::Coordinator), loadable from TOML:
//!
//! ```toml
//! entity_capacity = 4096
//! preallocate_storage = true
//! ```
//!
//! Missing keys fall back to [`EcsConfig::default`].

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::ecs::MAX_ENTITIES;
use crate::error::ConfigError;

/// Coordinator sizing.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EcsConfig {
    /// Size of the entity id space. Ids `1..entity_capacity` are usable,
    /// so at most `entity_capacity - 1` entities are alive at once.
    pub entity_capacity: u32,
    /// Reserve the dense array of every storage for `entity_capacity`
    /// components when the type is registered.
    pub preallocate_storage: bool,
}

impl Default for EcsConfig {
    fn default() -> Self {
        Self {
            entity_capacity: MAX_ENTITIES,
            preallocate_storage: false,
        }
    }
}

impl EcsConfig {
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
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if `entity_capacity` is not in
    /// `2..=MAX_ENTITIES`.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(2..=MAX_ENTITIES).contains(&self.entity_capacity) {
            return Err(ConfigError::Invalid(format!(
                "entity_capacity must be between 2 and {MAX_ENTITIES}, got {}",
                self.entity_capacity
            )));
        }
        Ok(())
    }
}
