//! # ECS Error Types
//!
//! Every way a caller can break the ECS contract, plus configuration failures.
//!
//! Contract violations are fatal: the plain operations on
//! [`Coordinator`](crate::Coordinator) log the error and panic. The `try_`
//! variants hand the same [`EcsError`] back instead.

use std::path::PathBuf;

use thiserror::Error;

use crate::ecs::Entity;

/// Contract violations detected by the ECS core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EcsError {
    /// Every entity id is in use.
    #[error("entity capacity exhausted: {living} entities alive, capacity {capacity}")]
    EntityCapacityExhausted {
        /// Number of living entities.
        living: u32,
        /// Configured entity capacity (ids `1..capacity`).
        capacity: u32,
    },

    /// Entity id outside of the configured id space.
    #[error("entity {entity} is out of range (capacity {capacity})")]
    EntityOutOfRange {
        /// The offending entity.
        entity: Entity,
        /// Configured entity capacity.
        capacity: u32,
    },

    /// The null entity was passed where a live entity is required.
    #[error("the null entity cannot be used here")]
    NullEntity,

    /// The entity id is in range but not currently alive.
    #[error("entity {0} is not alive")]
    EntityNotAlive(Entity),

    /// A component type was registered twice.
    #[error("component type {0} is already registered")]
    ComponentAlreadyRegistered(&'static str),

    /// A component type was used before registration.
    #[error("component type {0} was never registered")]
    ComponentNotRegistered(&'static str),

    /// All signature bits are taken.
    #[error("cannot register {component}: at most {max} component types are supported")]
    TooManyComponentTypes {
        /// The component that did not fit.
        component: &'static str,
        /// Signature width.
        max: usize,
    },

    /// The entity already holds a component of this type.
    #[error("entity {entity} already has a {component} component")]
    DuplicateComponent {
        /// The offending entity.
        entity: Entity,
        /// Component type name.
        component: &'static str,
    },

    /// The entity holds no component of this type.
    #[error("entity {entity} has no {component} component")]
    MissingComponent {
        /// The offending entity.
        entity: Entity,
        /// Component type name.
        component: &'static str,
    },

    /// A system type was registered twice.
    #[error("system type {0} is already registered")]
    SystemAlreadyRegistered(&'static str),

    /// A system type was used before registration.
    #[error("system type {0} was never registered")]
    SystemNotRegistered(&'static str),

    /// A sibling list is not a consistent doubly-linked chain.
    #[error("relationship of entity {entity} is corrupt: {reason}")]
    CorruptRelationship {
        /// Entity whose links are inconsistent.
        entity: Entity,
        /// What was wrong.
        reason: &'static str,
    },
}

/// Result type for ECS operations.
pub type EcsResult<T> = Result<T, EcsError>;

/// Errors raised while loading or validating configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("failed to read config file {path}: {source}")]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid TOML for the expected schema.
    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// The config parsed but holds an unusable value.
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

/// Logs a contract violation and panics with its message.
#[track_caller]
#[cold]
pub(crate) fn fatal(err: EcsError) -> ! {
    tracing::error!(error = %err, "ECS contract violation");
    panic!("{err}");
}

/// Turns a contract violation into the fatal path.
pub(crate) trait OrFatal<T> {
    /// Unwraps the value or terminates through [`fatal`].
    fn or_fatal(self) -> T;
}

impl<T> OrFatal<T> for EcsResult<T> {
    #[inline]
    #[track_caller]
    fn or_fatal(self) -> T {
        match self {
            Ok(value) => value,
            Err(err) => fatal(err),
        }
    }
}
