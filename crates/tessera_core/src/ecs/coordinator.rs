//! # Coordinator
//!
//! The single entry point into the ECS. Composes the entity, component and
//! system managers and keeps them consistent: every structural change is
//! fanned out to all three before the call returns.

use std::any::TypeId;
use std::collections::BTreeSet;

use super::component::{Component, ComponentManager, ComponentType};
use super::entity::{Entity, EntityManager, Signature};
use super::relationship::Relationship;
use super::storage::ComponentStorage;
use super::system::{System, SystemHandle, SystemManager};
use crate::config::EcsConfig;
use crate::error::{ConfigError, EcsResult, OrFatal};

/// The ECS facade - owns all entity, component and system state.
///
/// Every plain operation is fatal on a contract violation; the `try_`
/// variant returns the [`EcsError`](crate::EcsError) instead.
///
/// # Example
///
/// ```rust,ignore
/// let mut coordinator = Coordinator::new();
/// coordinator.register_component::<Position>();
///
/// let entity = coordinator.create_entity();
/// coordinator.add_component(entity, Position { x: 1.0, y: 2.0 });
/// ```
pub struct Coordinator {
    config: EcsConfig,
    entities: EntityManager,
    components: ComponentManager,
    systems: SystemManager,
}

impl Default for Coordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl Coordinator {
    /// Creates a coordinator with the default configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::build(EcsConfig::default())
    }

    /// Creates a coordinator from an explicit configuration.
    ///
    /// # Errors
    ///
    /// [`ConfigError::Invalid`] if the configuration fails validation.
    pub fn with_config(config: EcsConfig) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: EcsConfig) -> Self {
        tracing::debug!(
            entity_capacity = config.entity_capacity,
            preallocate = config.preallocate_storage,
            "coordinator created"
        );

        Self {
            entities: EntityManager::new(config.entity_capacity),
            components: ComponentManager::new(config.entity_capacity, config.preallocate_storage),
            systems: SystemManager::new(),
            config,
        }
    }

    /// Returns the configuration this coordinator was built from.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &EcsConfig {
        &self.config
    }

    // =========================================================================
    // Entities
    // =========================================================================

    /// Creates an entity with an empty signature.
    ///
    /// # Panics
    ///
    /// Panics if the entity capacity is exhausted.
    #[track_caller]
    pub fn create_entity(&mut self) -> Entity {
        self.try_create_entity().or_fatal()
    }

    /// Creates an entity with an empty signature.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityCapacityExhausted`](crate::EcsError::EntityCapacityExhausted).
    pub fn try_create_entity(&mut self) -> EcsResult<Entity> {
        let entity = self.entities.try_create_entity()?;
        self.systems.entity_signature_changed(entity, Signature::EMPTY);

        tracing::trace!(%entity, "entity created");
        Ok(entity)
    }

    /// Destroys an entity and everything attached to it.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is null, out of range or not alive.
    #[track_caller]
    pub fn destroy_entity(&mut self, entity: Entity) {
        self.try_destroy_entity(entity).or_fatal();
    }

    /// Destroys an entity and everything attached to it.
    ///
    /// A [`Relationship`] is unlinked first: the entity leaves its parent's
    /// sibling list and its children become roots. Then the id is freed,
    /// every storage drops the entity and every system forgets it.
    ///
    /// # Errors
    ///
    /// Fails if `entity` is null, out of range or not alive.
    pub fn try_destroy_entity(&mut self, entity: Entity) -> EcsResult<()> {
        self.entities.ensure_alive(entity)?;

        if self.has_component::<Relationship>(entity) {
            self.try_unlink(entity)?;
        }

        self.entities.try_free_entity(entity)?;
        self.components.entity_destroyed(entity);
        self.systems.entity_destroyed(entity);

        tracing::trace!(%entity, "entity destroyed");
        Ok(())
    }

    /// Checks if an entity is alive.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.entities.is_alive(entity)
    }

    /// Returns the number of currently alive entities.
    #[inline]
    #[must_use]
    pub fn living_entity_count(&self) -> u32 {
        self.entities.living_count()
    }

    /// Returns the entity's signature.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is out of range.
    #[track_caller]
    #[must_use]
    pub fn signature(&self, entity: Entity) -> Signature {
        self.entities.try_signature(entity).or_fatal()
    }

    /// Iterates over alive entities and their signatures, in id order.
    pub fn living(&self) -> impl Iterator<Item = (Entity, Signature)> + '_ {
        self.entities.living()
    }

    // =========================================================================
    // Components
    // =========================================================================

    /// Registers a component type.
    ///
    /// # Panics
    ///
    /// Panics if `C` is already registered or all 64 slots are taken.
    #[track_caller]
    pub fn register_component<C: Component>(&mut self) -> ComponentType {
        self.components.try_register::<C>().or_fatal()
    }

    /// Registers a component type.
    ///
    /// # Errors
    ///
    /// Duplicate registration or a full registry.
    pub fn try_register_component<C: Component>(&mut self) -> EcsResult<ComponentType> {
        self.components.try_register::<C>()
    }

    /// Returns the index assigned to `C`.
    ///
    /// # Panics
    ///
    /// Panics if `C` was never registered.
    #[track_caller]
    #[must_use]
    pub fn component_type<C: Component>(&self) -> ComponentType {
        self.components.try_component_type::<C>().or_fatal()
    }

    /// Returns the index assigned to `C`.
    ///
    /// # Errors
    ///
    /// [`EcsError::ComponentNotRegistered`](crate::EcsError::ComponentNotRegistered).
    pub fn try_component_type<C: Component>(&self) -> EcsResult<ComponentType> {
        self.components.try_component_type::<C>()
    }

    /// Attaches `value` to `entity` and re-evaluates system membership.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not alive, `C` is unregistered, or the entity
    /// already has a `C`.
    #[track_caller]
    pub fn add_component<C: Component>(&mut self, entity: Entity, value: C) {
        self.try_add_component(entity, value).or_fatal();
    }

    /// Attaches `value` to `entity` and re-evaluates system membership.
    ///
    /// # Errors
    ///
    /// Dead entity, unregistered type or duplicate component.
    pub fn try_add_component<C: Component>(&mut self, entity: Entity, value: C) -> EcsResult<()> {
        self.entities.ensure_alive(entity)?;
        let component_type = self.components.try_component_type::<C>()?;
        self.components.try_add(entity, value)?;

        let signature = self.entities.try_signature(entity)?.with(component_type);
        self.entities.try_set_signature(entity, signature)?;
        self.systems.entity_signature_changed(entity, signature);

        tracing::trace!(%entity, component = component_type.index(), "component added");
        Ok(())
    }

    /// Detaches and returns `entity`'s `C`, re-evaluating system membership.
    ///
    /// # Panics
    ///
    /// Panics if `entity` is not alive, `C` is unregistered, or the entity
    /// has no `C`.
    #[track_caller]
    pub fn remove_component<C: Component>(&mut self, entity: Entity) -> C {
        self.try_remove_component(entity).or_fatal()
    }

    /// Detaches and returns `entity`'s `C`, re-evaluating system membership.
    ///
    /// Removing a [`Relationship`] first unlinks the entity the same way
    /// [`Coordinator::destroy_entity`] does, so the returned value has no
    /// links.
    ///
    /// # Errors
    ///
    /// Dead entity, unregistered type or missing component.
    pub fn try_remove_component<C: Component>(&mut self, entity: Entity) -> EcsResult<C> {
        self.entities.ensure_alive(entity)?;
        let component_type = self.components.try_component_type::<C>()?;
        if TypeId::of::<C>() == TypeId::of::<Relationship>() && self.has_component::<C>(entity) {
            self.try_unlink(entity)?;
        }
        let value = self.components.try_remove::<C>(entity)?;

        let signature = self.entities.try_signature(entity)?.without(component_type);
        self.entities.try_set_signature(entity, signature)?;
        self.systems.entity_signature_changed(entity, signature);

        tracing::trace!(%entity, component = component_type.index(), "component removed");
        Ok(value)
    }

    /// Gets `entity`'s `C`.
    ///
    /// # Panics
    ///
    /// Panics if `C` is unregistered or the entity has no `C`.
    #[track_caller]
    #[must_use]
    pub fn get_component<C: Component>(&self, entity: Entity) -> &C {
        self.components.try_get::<C>(entity).or_fatal()
    }

    /// Gets `entity`'s `C` mutably.
    ///
    /// # Panics
    ///
    /// Panics if `C` is unregistered or the entity has no `C`.
    #[track_caller]
    pub fn get_component_mut<C: Component>(&mut self, entity: Entity) -> &mut C {
        self.components.try_get_mut::<C>(entity).or_fatal()
    }

    /// Gets `entity`'s `C`.
    ///
    /// # Errors
    ///
    /// Unregistered type or missing component.
    pub fn try_get_component<C: Component>(&self, entity: Entity) -> EcsResult<&C> {
        self.components.try_get::<C>(entity)
    }

    /// Gets `entity`'s `C` mutably.
    ///
    /// # Errors
    ///
    /// Unregistered type or missing component.
    pub fn try_get_component_mut<C: Component>(&mut self, entity: Entity) -> EcsResult<&mut C> {
        self.components.try_get_mut::<C>(entity)
    }

    /// Checks if `entity` has a `C`. False for unregistered types.
    #[must_use]
    pub fn has_component<C: Component>(&self, entity: Entity) -> bool {
        match self.components.try_component_type::<C>() {
            Ok(component_type) => self
                .entities
                .try_has_component(entity, component_type)
                .unwrap_or(false),
            Err(_) => false,
        }
    }

    /// Returns the packed storage of `C` for iteration.
    ///
    /// # Panics
    ///
    /// Panics if `C` is unregistered.
    #[track_caller]
    #[must_use]
    pub fn storage<C: Component>(&self) -> &ComponentStorage<C> {
        self.components.try_storage::<C>().or_fatal()
    }

    /// Returns the packed values of `C` mutably, in the order of
    /// [`ComponentStorage::entities`]. Values may be changed in place;
    /// adding or removing goes through the coordinator.
    ///
    /// # Panics
    ///
    /// Panics if `C` is unregistered.
    #[track_caller]
    pub fn components_mut<C: Component>(&mut self) -> &mut [C] {
        self.components.try_storage_mut::<C>().or_fatal().as_mut_slice()
    }

    // =========================================================================
    // Systems
    // =========================================================================

    /// Registers a system with an empty signature and returns its handle.
    ///
    /// # Panics
    ///
    /// Panics if a system of type `S` is already registered.
    #[track_caller]
    pub fn register_system<S: System>(&mut self, system: S) -> SystemHandle<S> {
        self.try_register_system(system).or_fatal()
    }

    /// Registers a system with an empty signature and returns its handle.
    ///
    /// # Errors
    ///
    /// [`EcsError::SystemAlreadyRegistered`](crate::EcsError::SystemAlreadyRegistered).
    pub fn try_register_system<S: System>(&mut self, system: S) -> EcsResult<SystemHandle<S>> {
        self.systems.try_register(system, self.entities.living())
    }

    /// Sets the components `S` requires and recomputes its tracked set.
    ///
    /// # Panics
    ///
    /// Panics if `S` was never registered.
    #[track_caller]
    pub fn set_system_signature<S: System>(&mut self, signature: Signature) {
        self.try_set_system_signature::<S>(signature).or_fatal();
    }

    /// Sets the components `S` requires and recomputes its tracked set.
    ///
    /// # Errors
    ///
    /// [`EcsError::SystemNotRegistered`](crate::EcsError::SystemNotRegistered).
    pub fn try_set_system_signature<S: System>(&mut self, signature: Signature) -> EcsResult<()> {
        self.systems
            .try_set_signature::<S, _>(signature, self.entities.living())
    }

    /// Returns the entities `S` currently tracks.
    ///
    /// # Panics
    ///
    /// Panics if `S` was never registered.
    #[track_caller]
    #[must_use]
    pub fn system_entities<S: System>(&self) -> &BTreeSet<Entity> {
        self.systems.try_entities::<S>().or_fatal()
    }

    /// Returns the required signature of `S`.
    ///
    /// # Panics
    ///
    /// Panics if `S` was never registered.
    #[track_caller]
    #[must_use]
    pub fn system_signature<S: System>(&self) -> Signature {
        self.systems.try_signature::<S>().or_fatal()
    }

    /// Returns the handle of a registered system.
    #[must_use]
    pub fn system<S: System>(&self) -> Option<SystemHandle<S>> {
        self.systems.handle::<S>()
    }

    /// Runs every system's `create` hook, in registration order.
    pub fn start(&mut self) {
        for slot in 0..self.systems.len() {
            if let Some(system) = self.systems.system_at(slot) {
                tracing::debug!(system = self.systems.name_at(slot), "system create");
                system.lock().create(self);
            }
        }
    }

    /// Runs every system's `update` hook, in registration order.
    ///
    /// Each system gets a snapshot of its tracked set taken right before
    /// its hook, so it may create and destroy entities while iterating.
    pub fn update(&mut self, dt: f32) {
        for slot in 0..self.systems.len() {
            if let Some((system, entities)) = self.systems.snapshot(slot) {
                system.lock().update(self, &entities, dt);
            }
        }
    }

    /// Runs every system's `render` hook, in registration order.
    pub fn render(&mut self, dt: f32) {
        for slot in 0..self.systems.len() {
            if let Some((system, entities)) = self.systems.snapshot(slot) {
                system.lock().render(self, &entities, dt);
            }
        }
    }

    /// Runs every system's `destroy` hook, in reverse registration order.
    pub fn shutdown(&mut self) {
        for slot in (0..self.systems.len()).rev() {
            if let Some(system) = self.systems.system_at(slot) {
                tracing::debug!(system = self.systems.name_at(slot), "system destroy");
                system.lock().destroy(self);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::EcsError;

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Position {
        x: f32,
        y: f32,
    }
    impl Component for Position {}

    #[derive(Clone, Copy, Debug, PartialEq)]
    struct Velocity {
        dx: f32,
        dy: f32,
    }
    impl Component for Velocity {}

    #[derive(Default)]
    struct MovementSystem {
        runs: u32,
    }

    impl System for MovementSystem {
        fn update(&mut self, coordinator: &mut Coordinator, entities: &[Entity], dt: f32) {
            self.runs += 1;
            for &entity in entities {
                let velocity = *coordinator.get_component::<Velocity>(entity);
                let position = coordinator.get_component_mut::<Position>(entity);
                position.x += velocity.dx * dt;
                position.y += velocity.dy * dt;
            }
        }
    }

    fn small() -> Coordinator {
        Coordinator::with_config(EcsConfig {
            entity_capacity: 64,
            ..EcsConfig::default()
        })
        .unwrap()
    }

    fn movement_world() -> Coordinator {
        let mut coordinator = small();
        let position = coordinator.register_component::<Position>();
        let velocity = coordinator.register_component::<Velocity>();
        coordinator.register_system(MovementSystem::default());
        coordinator.set_system_signature::<MovementSystem>(
            Signature::EMPTY.with(position).with(velocity),
        );
        coordinator
    }

    #[test]
    fn test_add_get_remove() {
        let mut coordinator = movement_world();
        let e = coordinator.create_entity();
        coordinator.add_component(e, Position { x: 1.0, y: 2.0 });

        assert_eq!(coordinator.get_component::<Position>(e), &Position { x: 1.0, y: 2.0 });
        assert!(coordinator.has_component::<Position>(e));
        assert!(coordinator
            .signature(e)
            .contains(coordinator.component_type::<Position>()));

        let removed = coordinator.remove_component::<Position>(e);
        assert_eq!(removed, Position { x: 1.0, y: 2.0 });
        assert!(!coordinator.has_component::<Position>(e));
        assert!(coordinator.signature(e).is_empty());
        assert!(coordinator.try_get_component::<Position>(e).is_err());
    }

    #[test]
    fn test_membership_tracks_add_and_remove() {
        let mut coordinator = movement_world();
        let e = coordinator.create_entity();

        coordinator.add_component(e, Position { x: 0.0, y: 0.0 });
        assert!(!coordinator.system_entities::<MovementSystem>().contains(&e));

        coordinator.add_component(e, Velocity { dx: 1.0, dy: 0.0 });
        assert!(coordinator.system_entities::<MovementSystem>().contains(&e));

        coordinator.remove_component::<Position>(e);
        assert!(!coordinator.system_entities::<MovementSystem>().contains(&e));
    }

    #[test]
    fn test_update_moves_only_matching_entities() {
        let mut coordinator = movement_world();
        let a = coordinator.create_entity();
        coordinator.add_component(a, Position { x: 0.0, y: 0.0 });
        coordinator.add_component(a, Velocity { dx: 2.0, dy: -1.0 });
        let b = coordinator.create_entity();
        coordinator.add_component(b, Position { x: 5.0, y: 5.0 });

        let tracked = coordinator.system_entities::<MovementSystem>();
        assert!(tracked.contains(&a));
        assert!(!tracked.contains(&b));

        coordinator.update(0.5);

        assert_eq!(coordinator.get_component::<Position>(a), &Position { x: 1.0, y: -0.5 });
        assert_eq!(coordinator.get_component::<Position>(b), &Position { x: 5.0, y: 5.0 });
        let handle = coordinator.system::<MovementSystem>().unwrap();
        assert_eq!(handle.lock().runs, 1);
    }

    #[test]
    fn test_destroy_purges_everything() {
        let mut coordinator = movement_world();
        let e = coordinator.create_entity();
        coordinator.add_component(e, Position { x: 0.0, y: 0.0 });
        coordinator.add_component(e, Velocity { dx: 0.0, dy: 0.0 });

        coordinator.destroy_entity(e);

        assert!(!coordinator.is_alive(e));
        assert_eq!(coordinator.living_entity_count(), 0);
        assert!(coordinator.storage::<Position>().is_empty());
        assert!(coordinator.storage::<Velocity>().is_empty());
        assert!(coordinator.system_entities::<MovementSystem>().is_empty());
        assert!(coordinator.signature(e).is_empty());
    }

    #[test]
    fn test_components_mut_edits_in_place() {
        let mut coordinator = movement_world();
        let a = coordinator.create_entity();
        let b = coordinator.create_entity();
        coordinator.add_component(a, Position { x: 1.0, y: 0.0 });
        coordinator.add_component(b, Position { x: 2.0, y: 0.0 });

        for position in coordinator.components_mut::<Position>() {
            position.y = position.x * 10.0;
        }

        assert_eq!(coordinator.get_component::<Position>(a), &Position { x: 1.0, y: 10.0 });
        assert_eq!(coordinator.get_component::<Position>(b), &Position { x: 2.0, y: 20.0 });
        assert_eq!(coordinator.storage::<Position>().len(), 2);
    }

    #[test]
    fn test_destroy_without_components() {
        let mut coordinator = movement_world();
        let e = coordinator.create_entity();
        coordinator.destroy_entity(e);
        assert_eq!(
            coordinator.try_destroy_entity(e),
            Err(EcsError::EntityNotAlive(e))
        );
    }

    #[test]
    fn test_dead_entities_reject_components() {
        let mut coordinator = movement_world();
        let e = coordinator.create_entity();
        coordinator.destroy_entity(e);
        assert_eq!(
            coordinator.try_add_component(e, Position { x: 0.0, y: 0.0 }),
            Err(EcsError::EntityNotAlive(e))
        );
        assert!(coordinator.storage::<Position>().is_empty());
    }

    #[test]
    fn test_empty_signature_system_tracks_every_entity() {
        struct Census;
        impl System for Census {}

        let mut coordinator = small();
        let before = coordinator.create_entity();
        coordinator.register_system(Census);
        let after = coordinator.create_entity();

        let tracked = coordinator.system_entities::<Census>();
        assert!(tracked.contains(&before));
        assert!(tracked.contains(&after));
    }

    #[test]
    fn test_late_signature_picks_up_existing_entities() {
        let mut coordinator = small();
        let position = coordinator.register_component::<Position>();
        let e = coordinator.create_entity();
        coordinator.add_component(e, Position { x: 0.0, y: 0.0 });

        coordinator.register_system(MovementSystem::default());
        coordinator.set_system_signature::<MovementSystem>(Signature::EMPTY.with(position));
        assert!(coordinator.system_entities::<MovementSystem>().contains(&e));
    }

    #[test]
    fn test_system_may_destroy_while_iterating() {
        struct Reaper;
        impl System for Reaper {
            fn update(&mut self, coordinator: &mut Coordinator, entities: &[Entity], _dt: f32) {
                for &entity in entities {
                    coordinator.destroy_entity(entity);
                }
            }
        }

        let mut coordinator = small();
        coordinator.register_system(Reaper);
        for _ in 0..10 {
            coordinator.create_entity();
        }

        coordinator.update(0.016);
        assert_eq!(coordinator.living_entity_count(), 0);
        assert!(coordinator.system_entities::<Reaper>().is_empty());
    }

    #[test]
    fn test_hooks_run_in_order() {
        use std::sync::Arc;
        use parking_lot::Mutex;

        struct First(Arc<Mutex<Vec<&'static str>>>);
        struct Second(Arc<Mutex<Vec<&'static str>>>);

        impl System for First {
            fn create(&mut self, _: &mut Coordinator) {
                self.0.lock().push("first.create");
            }
            fn render(&mut self, _: &mut Coordinator, _: &[Entity], _: f32) {
                self.0.lock().push("first.render");
            }
            fn destroy(&mut self, _: &mut Coordinator) {
                self.0.lock().push("first.destroy");
            }
        }
        impl System for Second {
            fn create(&mut self, _: &mut Coordinator) {
                self.0.lock().push("second.create");
            }
            fn render(&mut self, _: &mut Coordinator, _: &[Entity], _: f32) {
                self.0.lock().push("second.render");
            }
            fn destroy(&mut self, _: &mut Coordinator) {
                self.0.lock().push("second.destroy");
            }
        }

        let log = Arc::new(Mutex::new(Vec::new()));
        let mut coordinator = small();
        coordinator.register_system(First(log.clone()));
        coordinator.register_system(Second(log.clone()));

        coordinator.start();
        coordinator.render(0.016);
        coordinator.shutdown();

        assert_eq!(
            *log.lock(),
            vec![
                "first.create",
                "second.create",
                "first.render",
                "second.render",
                "second.destroy",
                "first.destroy",
            ]
        );
    }

    #[test]
    #[should_panic(expected = "already has")]
    fn test_duplicate_add_is_fatal() {
        let mut coordinator = movement_world();
        let e = coordinator.create_entity();
        coordinator.add_component(e, Position { x: 0.0, y: 0.0 });
        coordinator.add_component(e, Position { x: 1.0, y: 1.0 });
    }

    #[test]
    #[should_panic(expected = "has no")]
    fn test_get_after_remove_is_fatal() {
        let mut coordinator = movement_world();
        let e = coordinator.create_entity();
        coordinator.add_component(e, Velocity { dx: 0.0, dy: 0.0 });
        coordinator.remove_component::<Velocity>(e);
        let _ = coordinator.get_component::<Velocity>(e);
    }

    #[test]
    #[should_panic(expected = "never registered")]
    fn test_unregistered_component_is_fatal() {
        let mut coordinator = small();
        let e = coordinator.create_entity();
        coordinator.add_component(e, Position { x: 0.0, y: 0.0 });
    }

    #[test]
    #[should_panic(expected = "is already registered")]
    fn test_duplicate_component_registration_is_fatal() {
        let mut coordinator = small();
        coordinator.register_component::<Position>();
        coordinator.register_component::<Position>();
    }

    #[test]
    #[should_panic(expected = "is already registered")]
    fn test_duplicate_system_is_fatal() {
        let mut coordinator = small();
        coordinator.register_system(MovementSystem::default());
        coordinator.register_system(MovementSystem::default());
    }

    #[test]
    #[should_panic(expected = "never registered")]
    fn test_signature_for_unregistered_system_is_fatal() {
        let mut coordinator = small();
        coordinator.set_system_signature::<MovementSystem>(Signature::EMPTY);
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn test_out_of_range_entity_is_fatal() {
        let mut coordinator = small();
        coordinator.destroy_entity(Entity::from_raw(64));
    }
}
