//! # TESSERA
//!
//! Headless driver for the ECS core. Registers a small demo world and runs
//! it for a fixed number of frames:
//!
//! ```text
//! swarm root
//! ├─ mover ── Position, Velocity, Lifetime, Relationship
//! ├─ mover
//! └─ ...
//! ```
//!
//! Movers drift, expire and get replaced, so every frame exercises entity
//! recycling, component churn and relationship unlinking.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod config;
pub mod demo;
pub mod logger;

pub use config::HeadlessConfig;
pub use demo::{run, RunStats};

use tessera_core::{ConfigError, EcsError};
use thiserror::Error;

/// Errors that stop the driver.
#[derive(Error, Debug)]
pub enum HeadlessError {
    /// Configuration failed to load or validate.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The demo world broke an ECS contract.
    #[error(transparent)]
    Ecs(#[from] EcsError),

    /// The tracing subscriber could not be installed.
    #[error("failed to initialize logging: {0}")]
    Logger(String),
}
