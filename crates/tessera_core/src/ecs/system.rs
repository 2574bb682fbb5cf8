//! # Systems
//!
//! A system is per-frame logic with a required [`Signature`]. The
//! [`SystemManager`] owns each system's tracked entity set and keeps it equal
//! to the set of alive entities whose signature contains the requirement.
//! Systems never own that set; each hook receives a snapshot.

use std::any::{type_name, Any, TypeId};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use parking_lot::Mutex;

use super::coordinator::Coordinator;
use super::entity::{Entity, Signature};
use crate::error::{EcsError, EcsResult};

/// Shared handle to a registered system.
///
/// Do not hold the lock across [`Coordinator::update`] or
/// [`Coordinator::render`]: the coordinator locks every system in turn.
pub type SystemHandle<S> = Arc<Mutex<S>>;

/// Per-frame logic. Every hook defaults to a no-op.
///
/// # Example
///
/// ```rust,ignore
/// struct Gravity;
///
/// impl System for Gravity {
///     fn update(&mut self, coordinator: &mut Coordinator, entities: &[Entity], dt: f32) {
///         for &entity in entities {
///             coordinator.get_component_mut::<Velocity>(entity).dy -= 9.81 * dt;
///         }
///     }
/// }
/// ```
pub trait System: 'static {
    /// Called once by [`Coordinator::start`].
    fn create(&mut self, _coordinator: &mut Coordinator) {}

    /// Called once per frame by [`Coordinator::update`].
    fn update(&mut self, _coordinator: &mut Coordinator, _entities: &[Entity], _dt: f32) {}

    /// Called once per frame by [`Coordinator::render`].
    fn render(&mut self, _coordinator: &mut Coordinator, _entities: &[Entity], _dt: f32) {}

    /// Called once by [`Coordinator::shutdown`].
    fn destroy(&mut self, _coordinator: &mut Coordinator) {}
}

/// One registered system and the entities it tracks.
struct SystemEntry {
    name: &'static str,
    signature: Signature,
    entities: BTreeSet<Entity>,
    system: Arc<Mutex<dyn System>>,
    /// The typed `SystemHandle<S>`, for [`SystemManager::handle`].
    handle: Box<dyn Any>,
}

/// Owns the registered systems and their tracked entity sets.
#[derive(Default)]
pub struct SystemManager {
    /// Registration order.
    entries: Vec<SystemEntry>,
    /// System type to position in `entries`.
    index: HashMap<TypeId, usize>,
}

impl SystemManager {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of registered systems.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks if no system is registered.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Stores `system` with an empty signature.
    ///
    /// An empty signature matches every entity, so the tracked set starts
    /// as every entity in `living`.
    ///
    /// # Errors
    ///
    /// [`EcsError::SystemAlreadyRegistered`].
    pub fn try_register<S, I>(&mut self, system: S, living: I) -> EcsResult<SystemHandle<S>>
    where
        S: System,
        I: IntoIterator<Item = (Entity, Signature)>,
    {
        let name = type_name::<S>();
        if self.index.contains_key(&TypeId::of::<S>()) {
            return Err(EcsError::SystemAlreadyRegistered(name));
        }

        let handle: SystemHandle<S> = Arc::new(Mutex::new(system));
        let mut entry = SystemEntry {
            name,
            signature: Signature::EMPTY,
            entities: BTreeSet::new(),
            system: handle.clone(),
            handle: Box::new(handle.clone()),
        };
        entry.rebuild(living);

        self.index.insert(TypeId::of::<S>(), self.entries.len());
        self.entries.push(entry);

        tracing::debug!(system = name, "system registered");
        Ok(handle)
    }

    /// Records the required signature for `S` and recomputes its tracked set.
    ///
    /// # Errors
    ///
    /// [`EcsError::SystemNotRegistered`].
    pub fn try_set_signature<S, I>(&mut self, signature: Signature, living: I) -> EcsResult<()>
    where
        S: System,
        I: IntoIterator<Item = (Entity, Signature)>,
    {
        let entry = self.entry_mut::<S>()?;
        entry.signature = signature;
        entry.rebuild(living);

        tracing::debug!(
            system = entry.name,
            signature = signature.bits(),
            tracked = entry.entities.len(),
            "system signature set"
        );
        Ok(())
    }

    /// Returns the required signature of `S`.
    ///
    /// # Errors
    ///
    /// [`EcsError::SystemNotRegistered`].
    pub fn try_signature<S: System>(&self) -> EcsResult<Signature> {
        Ok(self.entry::<S>()?.signature)
    }

    /// Returns the entities `S` currently tracks.
    ///
    /// # Errors
    ///
    /// [`EcsError::SystemNotRegistered`].
    pub fn try_entities<S: System>(&self) -> EcsResult<&BTreeSet<Entity>> {
        Ok(&self.entry::<S>()?.entities)
    }

    /// Returns the typed handle of `S`.
    #[must_use]
    pub fn handle<S: System>(&self) -> Option<SystemHandle<S>> {
        let entry = self.entry::<S>().ok()?;
        entry.handle.downcast_ref::<SystemHandle<S>>().cloned()
    }

    /// Re-evaluates `entity` against every system's signature.
    pub fn entity_signature_changed(&mut self, entity: Entity, signature: Signature) {
        for entry in &mut self.entries {
            if signature.matches(entry.signature) {
                entry.entities.insert(entity);
            } else {
                entry.entities.remove(&entity);
            }
        }
    }

    /// Drops `entity` from every tracked set.
    pub fn entity_destroyed(&mut self, entity: Entity) {
        for entry in &mut self.entries {
            entry.entities.remove(&entity);
        }
    }

    /// Returns the system at `slot` with a copy of its tracked set.
    pub(crate) fn snapshot(&self, slot: usize) -> Option<(Arc<Mutex<dyn System>>, Vec<Entity>)> {
        self.entries
            .get(slot)
            .map(|entry| (entry.system.clone(), entry.entities.iter().copied().collect()))
    }

    /// Returns the system at `slot`.
    pub(crate) fn system_at(&self, slot: usize) -> Option<Arc<Mutex<dyn System>>> {
        self.entries.get(slot).map(|entry| entry.system.clone())
    }

    /// Returns the type name of the system at `slot`.
    pub(crate) fn name_at(&self, slot: usize) -> Option<&'static str> {
        self.entries.get(slot).map(|entry| entry.name)
    }

    fn entry<S: System>(&self) -> EcsResult<&SystemEntry> {
        self.index
            .get(&TypeId::of::<S>())
            .map(|&slot| &self.entries[slot])
            .ok_or(EcsError::SystemNotRegistered(type_name::<S>()))
    }

    fn entry_mut<S: System>(&mut self) -> EcsResult<&mut SystemEntry> {
        match self.index.get(&TypeId::of::<S>()) {
            Some(&slot) => Ok(&mut self.entries[slot]),
            None => Err(EcsError::SystemNotRegistered(type_name::<S>())),
        }
    }
}

impl SystemEntry {
    fn rebuild<I>(&mut self, living: I)
    where
        I: IntoIterator<Item = (Entity, Signature)>,
    {
        let required = self.signature;
        self.entities = living
            .into_iter()
            .filter(|(_, signature)| signature.matches(required))
            .map(|(entity, _)| entity)
            .collect();
    }
}
