//! # TESSERA Core
//!
//! Entity Component System core for the TESSERA engine:
//! - Recycled `u32` entity ids with a 64-bit component signature
//! - Packed per-type component storage
//! - Systems that track every entity matching their signature
//! - Parent/child relationships as an ordinary component
//!
//! ## Architecture Rules
//!
//! 1. **One facade** - All structural changes go through [`Coordinator`]
//! 2. **Always consistent** - Every manager is updated before a call returns
//! 3. **Contract violations are fatal** - Use the `try_` variants to recover
//!
//! ## Example
//!
//! ```rust,ignore
//! use tessera_core::{Coordinator, Signature};
//!
//! let mut coordinator = Coordinator::new();
//! let position = coordinator.register_component::<Position>();
//! coordinator.register_system(Gravity);
//! coordinator.set_system_signature::<Gravity>(Signature::EMPTY.with(position));
//!
//! let entity = coordinator.create_entity();
//! coordinator.add_component(entity, Position::default());
//! coordinator.update(1.0 / 60.0);
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(clippy::pedantic)]
#![deny(clippy::perf)]

pub mod config;
pub mod ecs;
pub mod error;

pub use config::EcsConfig;
pub use ecs::{
    Component, ComponentManager, ComponentStorage, ComponentType, Coordinator, Entity,
    EntityManager, ErasedStorage, Relationship, Signature, System, SystemHandle, SystemManager,
    MAX_COMPONENTS, MAX_ENTITIES,
};
pub use error::{ConfigError, EcsError, EcsResult};
