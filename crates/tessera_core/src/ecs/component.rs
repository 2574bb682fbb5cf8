//! # Component Registry
//!
//! Components are plain data attached to entities. Every component type is
//! registered once, receives the next free [`ComponentType`] index, and gets
//! its own [`ComponentStorage`].

use std::any::{type_name, TypeId};
use std::collections::HashMap;

use super::entity::Entity;
use super::storage::{ComponentStorage, ErasedStorage};
use crate::error::{EcsError, EcsResult};

/// Maximum number of component types, one per [`Signature`](super::Signature) bit.
pub const MAX_COMPONENTS: usize = 64;

/// Marker trait for ECS components.
///
/// # Example
///
/// ```rust,ignore
/// #[derive(Clone, Copy, Debug, Default)]
/// struct Position {
///     x: f32,
///     y: f32,
/// }
///
/// impl Component for Position {}
/// ```
pub trait Component: 'static {}

/// Index of a registered component type, in registration order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ComponentType(u8);

impl ComponentType {
    /// Wraps a raw index.
    ///
    /// # Panics
    ///
    /// Panics if `index` does not fit in a [`Signature`](super::Signature).
    #[inline]
    #[must_use]
    pub const fn new(index: u8) -> Self {
        assert!((index as usize) < MAX_COMPONENTS, "Component index out of range");
        Self(index)
    }

    /// Returns the raw index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Returns the signature bit for this type.
    #[inline]
    #[must_use]
    pub const fn bit(self) -> u64 {
        1 << self.0
    }
}

/// One registered component type.
struct Registration {
    name: &'static str,
    storage: Box<dyn ErasedStorage>,
}

/// Owns one storage per registered component type.
pub struct ComponentManager {
    /// Registration order; position is the [`ComponentType`] index.
    registrations: Vec<Registration>,
    /// Explicit registration table.
    types: HashMap<TypeId, ComponentType>,
    /// Entity id space every storage is sized for.
    entity_capacity: u32,
    /// Reserve dense slots on registration.
    preallocate: bool,
}

impl ComponentManager {
    /// Creates an empty registry whose storages cover `entity_capacity` ids.
    #[must_use]
    pub fn new(entity_capacity: u32, preallocate: bool) -> Self {
        Self {
            registrations: Vec::with_capacity(MAX_COMPONENTS),
            types: HashMap::with_capacity(MAX_COMPONENTS),
            entity_capacity,
            preallocate,
        }
    }

    /// Number of registered component types.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.registrations.len()
    }

    /// Checks if no component type is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.registrations.is_empty()
    }

    /// Registers `C` under the next sequential index.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentAlreadyRegistered`] or
    /// [`EcsError::TooManyComponentTypes`].
    pub fn try_register<C: Component>(&mut self) -> EcsResult<ComponentType> {
        let name = type_name::<C>();
        if self.types.contains_key(&TypeId::of::<C>()) {
            return Err(EcsError::ComponentAlreadyRegistered(name));
        }
        if self.registrations.len() >= MAX_COMPONENTS {
            return Err(EcsError::TooManyComponentTypes {
                component: name,
                max: MAX_COMPONENTS,
            });
        }

        let component_type = ComponentType(self.registrations.len() as u8);
        self.registrations.push(Registration {
            name,
            storage: Box::new(ComponentStorage::<C>::new(self.entity_capacity, self.preallocate)),
        });
        self.types.insert(TypeId::of::<C>(), component_type);

        tracing::debug!(component = name, index = component_type.index(), "component registered");
        Ok(component_type)
    }

    /// Looks up the index assigned to `C`.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentNotRegistered`].
    pub fn try_component_type<C: Component>(&self) -> EcsResult<ComponentType> {
        self.types
            .get(&TypeId::of::<C>())
            .copied()
            .ok_or(EcsError::ComponentNotRegistered(type_name::<C>()))
    }

    /// Checks if `C` is registered.
    #[inline]
    #[must_use]
    pub fn is_registered<C: Component>(&self) -> bool {
        self.types.contains_key(&TypeId::of::<C>())
    }

    /// Returns the type name recorded for `component_type`.
    #[must_use]
    pub fn name_of(&self, component_type: ComponentType) -> Option<&'static str> {
        self.registrations
            .get(component_type.index())
            .map(|registration| registration.name)
    }

    /// Returns the storage for `C`.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentNotRegistered`].
    pub fn try_storage<C: Component>(&self) -> EcsResult<&ComponentStorage<C>> {
        let component_type = self.try_component_type::<C>()?;
        self.registrations[component_type.index()]
            .storage
            .as_any()
            .downcast_ref::<ComponentStorage<C>>()
            .ok_or(EcsError::ComponentNotRegistered(type_name::<C>()))
    }

    /// Returns the storage for `C` mutably.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentNotRegistered`].
    pub fn try_storage_mut<C: Component>(&mut self) -> EcsResult<&mut ComponentStorage<C>> {
        let component_type = self.try_component_type::<C>()?;
        self.registrations[component_type.index()]
            .storage
            .as_any_mut()
            .downcast_mut::<ComponentStorage<C>>()
            .ok_or(EcsError::ComponentNotRegistered(type_name::<C>()))
    }

    /// Stores `value` for `entity`.
    ///
    /// # Errors
    ///
    /// Unregistered type or duplicate component.
    pub fn try_add<C: Component>(&mut self, entity: Entity, value: C) -> EcsResult<()> {
        self.try_storage_mut::<C>()?.insert(entity, value)
    }

    /// Removes and returns `entity`'s `C`.
    ///
    /// # Errors
    ///
    /// Unregistered type or missing component.
    pub fn try_remove<C: Component>(&mut self, entity: Entity) -> EcsResult<C> {
        self.try_storage_mut::<C>()?.remove(entity)
    }

    /// Gets `entity`'s `C`.
    ///
    /// # Errors
    ///
    /// Unregistered type or missing component.
    pub fn try_get<C: Component>(&self, entity: Entity) -> EcsResult<&C> {
        self.try_storage::<C>()?.try_get(entity)
    }

    /// Gets `entity`'s `C` mutably.
    ///
    /// # Errors
    ///
    /// Unregistered type or missing component.
    pub fn try_get_mut<C: Component>(&mut self, entity: Entity) -> EcsResult<&mut C> {
        self.try_storage_mut::<C>()?.try_get_mut(entity)
    }

    /// Purges `entity` from every storage that holds it.
    pub fn entity_destroyed(&mut self, entity: Entity) {
        for registration in &mut self.registrations {
            registration.storage.entity_destroyed(entity);
        }
    }
}
