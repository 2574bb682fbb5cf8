//! # Entity Component System
//!
//! A signature-based ECS built from three managers behind one facade.
//!
//! ## Design Philosophy
//!
//! - Entities are bare ids recycled through a FIFO queue
//! - Components live in packed arrays, one per type, with no holes
//! - Systems declare a signature and see exactly the matching entities
//! - All structural changes go through the [`Coordinator`]

mod component;
mod coordinator;
mod entity;
mod relationship;
mod storage;
mod system;

pub use component::{Component, ComponentManager, ComponentType, MAX_COMPONENTS};
pub use coordinator::Coordinator;
pub use entity::{Entity, EntityManager, Signature, MAX_ENTITIES};
pub use relationship::Relationship;
pub use storage::{ComponentStorage, ErasedStorage};
pub use system::{System, SystemHandle, SystemManager};
