//! # Entity Management
//!
//! Entities are plain `u32` ids with no payload:
//! - Id 0 is the null entity
//! - Ids `1..capacity` are handed out from a FIFO free queue
//! - Each id carries a [`Signature`] of the component types it holds

use std::collections::VecDeque;
use std::fmt;

use bytemuck::{Pod, Zeroable};

use super::component::{ComponentType, MAX_COMPONENTS};
use crate::error::{EcsError, EcsResult};

/// Size of the entity id space. Valid ids are `1..MAX_ENTITIES`.
pub const MAX_ENTITIES: u32 = 32_768;

/// Opaque entity handle.
///
/// Unique while alive, recycled after destruction. There is no generation
/// counter: a stale handle aliases whichever entity reuses the id.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct Entity(u32);

impl Entity {
    /// The null entity. Never allocated, used as "no link" in relationships.
    pub const NULL: Self = Self(0);

    /// Wraps a raw id.
    #[inline]
    #[must_use]
    pub const fn from_raw(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw id.
    #[inline]
    #[must_use]
    pub const fn id(self) -> u32 {
        self.0
    }

    /// Returns the id as an array index.
    #[inline]
    #[must_use]
    pub const fn index(self) -> usize {
        self.0 as usize
    }

    /// Checks if this is the null entity.
    #[inline]
    #[must_use]
    pub const fn is_null(self) -> bool {
        self.0 == 0
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Bit set of component types, one bit per [`ComponentType`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
#[repr(transparent)]
pub struct Signature(u64);

impl Signature {
    /// No component types.
    pub const EMPTY: Self = Self(0);

    /// Number of bits, equal to [`MAX_COMPONENTS`].
    pub const WIDTH: usize = MAX_COMPONENTS;

    /// Creates a signature from raw bits.
    #[inline]
    #[must_use]
    pub const fn from_bits(bits: u64) -> Self {
        Self(bits)
    }

    /// Returns the raw bits.
    #[inline]
    #[must_use]
    pub const fn bits(self) -> u64 {
        self.0
    }

    /// Returns a copy with the bit for `component` set.
    #[inline]
    #[must_use]
    pub const fn with(self, component: ComponentType) -> Self {
        Self(self.0 | component.bit())
    }

    /// Returns a copy with the bit for `component` cleared.
    #[inline]
    #[must_use]
    pub const fn without(self, component: ComponentType) -> Self {
        Self(self.0 & !component.bit())
    }

    /// Sets the bit for `component`.
    #[inline]
    pub fn insert(&mut self, component: ComponentType) {
        self.0 |= component.bit();
    }

    /// Clears the bit for `component`.
    #[inline]
    pub fn remove(&mut self, component: ComponentType) {
        self.0 &= !component.bit();
    }

    /// Checks the bit for `component`.
    #[inline]
    #[must_use]
    pub const fn contains(self, component: ComponentType) -> bool {
        self.0 & component.bit() == component.bit()
    }

    /// Checks whether every bit of `required` is also set here.
    ///
    /// This is the system interest test: `(self & required) == required`.
    #[inline]
    #[must_use]
    pub const fn matches(self, required: Self) -> bool {
        self.0 & required.0 == required.0
    }

    /// Checks if no bit is set.
    #[inline]
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Number of component types in the set.
    #[inline]
    #[must_use]
    pub const fn len(self) -> u32 {
        self.0.count_ones()
    }
}

impl FromIterator<ComponentType> for Signature {
    fn from_iter<I: IntoIterator<Item = ComponentType>>(iter: I) -> Self {
        iter.into_iter().fold(Self::EMPTY, Self::with)
    }
}

/// Owns the entity id space.
///
/// All storage is sized once from the capacity; creating and freeing
/// entities never reallocates.
pub struct EntityManager {
    /// Ids ready for reuse, oldest first.
    available: VecDeque<Entity>,
    /// Signature per id (index 0 unused).
    signatures: Box<[Signature]>,
    /// Alive flag per id (index 0 unused).
    alive: Box<[bool]>,
    /// Number of currently alive entities.
    living_count: u32,
    /// Size of the id space.
    capacity: u32,
}

impl EntityManager {
    /// Creates a manager with ids `1..capacity` queued in ascending order.
    ///
    /// # Panics
    ///
    /// Panics if capacity is below 2 (there would be no valid id).
    #[must_use]
    pub fn new(capacity: u32) -> Self {
        assert!(capacity >= 2, "Entity capacity must leave room for at least one id");

        Self {
            available: (1..capacity).map(Entity).collect(),
            signatures: vec![Signature::EMPTY; capacity as usize].into_boxed_slice(),
            alive: vec![false; capacity as usize].into_boxed_slice(),
            living_count: 0,
            capacity,
        }
    }

    /// Returns the size of the id space.
    #[inline]
    #[must_use]
    pub const fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Returns the number of currently alive entities.
    #[inline]
    #[must_use]
    pub const fn living_count(&self) -> u32 {
        self.living_count
    }

    /// Takes the oldest free id.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityCapacityExhausted`] when every id is in use.
    pub fn try_create_entity(&mut self) -> EcsResult<Entity> {
        let Some(entity) = self.available.pop_front() else {
            return Err(EcsError::EntityCapacityExhausted {
                living: self.living_count,
                capacity: self.capacity,
            });
        };

        self.alive[entity.index()] = true;
        self.living_count += 1;
        Ok(entity)
    }

    /// Clears the entity's signature and queues its id for reuse.
    ///
    /// # Errors
    ///
    /// Fails for ids out of range, the null entity, or an entity that is
    /// not alive.
    pub fn try_free_entity(&mut self, entity: Entity) -> EcsResult<()> {
        self.ensure_alive(entity)?;

        self.signatures[entity.index()] = Signature::EMPTY;
        self.alive[entity.index()] = false;
        self.available.push_back(entity);
        self.living_count -= 1;
        Ok(())
    }

    /// Stores the entity's signature.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityOutOfRange`] for ids outside the id space.
    pub fn try_set_signature(&mut self, entity: Entity, signature: Signature) -> EcsResult<()> {
        self.check_range(entity)?;
        self.signatures[entity.index()] = signature;
        Ok(())
    }

    /// Reads the entity's signature.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityOutOfRange`] for ids outside the id space.
    pub fn try_signature(&self, entity: Entity) -> EcsResult<Signature> {
        self.check_range(entity)?;
        Ok(self.signatures[entity.index()])
    }

    /// Checks the signature bit for `component`.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityOutOfRange`] for ids outside the id space.
    pub fn try_has_component(&self, entity: Entity, component: ComponentType) -> EcsResult<bool> {
        Ok(self.try_signature(entity)?.contains(component))
    }

    /// Checks if an entity is alive. Out-of-range ids are never alive.
    #[inline]
    #[must_use]
    pub fn is_alive(&self, entity: Entity) -> bool {
        self.alive.get(entity.index()).copied().unwrap_or(false)
    }

    /// Fails unless `entity` is an in-range, non-null, alive entity.
    ///
    /// # Errors
    ///
    /// The first violated condition, checked in that order.
    pub fn ensure_alive(&self, entity: Entity) -> EcsResult<()> {
        self.check_range(entity)?;
        if entity.is_null() {
            return Err(EcsError::NullEntity);
        }
        if !self.alive[entity.index()] {
            return Err(EcsError::EntityNotAlive(entity));
        }
        Ok(())
    }

    /// Iterates over alive entities and their signatures, in id order.
    pub fn living(&self) -> impl Iterator<Item = (Entity, Signature)> + '_ {
        self.alive
            .iter()
            .zip(self.signatures.iter())
            .enumerate()
            .filter(|(_, (alive, _))| **alive)
            .map(|(index, (_, signature))| (Entity(index as u32), *signature))
    }

    #[inline]
    fn check_range(&self, entity: Entity) -> EcsResult<()> {
        if entity.0 >= self.capacity {
            return Err(EcsError::EntityOutOfRange {
                entity,
                capacity: self.capacity,
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ty(index: u8) -> ComponentType {
        ComponentType::new(index)
    }

    #[test]
    fn test_signature_bits() {
        let mut signature = Signature::EMPTY;
        assert!(!signature.contains(ty(5)));

        signature.insert(ty(5));
        assert!(signature.contains(ty(5)));
        assert_eq!(signature.bits(), 1 << 5);

        signature.remove(ty(5));
        assert!(signature.is_empty());

        let top = Signature::EMPTY.with(ty(63));
        assert_eq!(top.bits(), 1 << 63);
    }

    #[test]
    fn test_signature_matches_superset_only() {
        let required: Signature = [ty(0), ty(2)].into_iter().collect();
        assert!(required.with(ty(7)).matches(required));
        assert!(required.matches(required));
        assert!(!Signature::EMPTY.with(ty(0)).matches(required));
        assert!(Signature::EMPTY.matches(Signature::EMPTY));
    }

    #[test]
    fn test_ids_start_at_one_and_are_unique() {
        let mut manager = EntityManager::new(16);
        let a = manager.try_create_entity().unwrap();
        let b = manager.try_create_entity().unwrap();
        assert_eq!(a.id(), 1);
        assert_eq!(b.id(), 2);
        assert_eq!(manager.living_count(), 2);
        assert!(manager.is_alive(a));
        assert!(!manager.is_alive(Entity::NULL));
    }

    #[test]
    fn test_freed_ids_recycle_fifo_after_fresh_ones() {
        let mut manager = EntityManager::new(5);
        let first: Vec<_> = (0..3).map(|_| manager.try_create_entity().unwrap()).collect();

        manager.try_free_entity(first[1]).unwrap();
        manager.try_free_entity(first[0]).unwrap();

        // Id 4 was queued before the freed ids.
        assert_eq!(manager.try_create_entity().unwrap().id(), 4);
        assert_eq!(manager.try_create_entity().unwrap(), first[1]);
        assert_eq!(manager.try_create_entity().unwrap(), first[0]);
    }

    #[test]
    fn test_capacity_exhaustion() {
        let mut manager = EntityManager::new(4);
        for _ in 0..3 {
            manager.try_create_entity().unwrap();
        }
        assert_eq!(
            manager.try_create_entity(),
            Err(EcsError::EntityCapacityExhausted { living: 3, capacity: 4 })
        );
    }

    #[test]
    fn test_free_resets_signature() {
        let mut manager = EntityManager::new(8);
        let e = manager.try_create_entity().unwrap();
        manager.try_set_signature(e, Signature::EMPTY.with(ty(3))).unwrap();
        assert!(manager.try_has_component(e, ty(3)).unwrap());

        manager.try_free_entity(e).unwrap();
        assert_eq!(manager.try_signature(e), Ok(Signature::EMPTY));
        assert_eq!(manager.living_count(), 0);
    }

    #[test]
    fn test_free_rejects_bad_ids() {
        let mut manager = EntityManager::new(8);
        assert_eq!(
            manager.try_free_entity(Entity(8)),
            Err(EcsError::EntityOutOfRange { entity: Entity(8), capacity: 8 })
        );
        assert_eq!(manager.try_free_entity(Entity::NULL), Err(EcsError::NullEntity));
        assert_eq!(
            manager.try_free_entity(Entity(3)),
            Err(EcsError::EntityNotAlive(Entity(3)))
        );

        let e = manager.try_create_entity().unwrap();
        manager.try_free_entity(e).unwrap();
        assert_eq!(manager.try_free_entity(e), Err(EcsError::EntityNotAlive(e)));
    }

    #[test]
    fn test_signature_access_out_of_range() {
        let mut manager = EntityManager::new(8);
        assert!(manager.try_signature(Entity(9)).is_err());
        assert!(manager.try_set_signature(Entity(8), Signature::EMPTY).is_err());
    }

    #[test]
    fn test_living_iterates_in_id_order() {
        let mut manager = EntityManager::new(8);
        let a = manager.try_create_entity().unwrap();
        let b = manager.try_create_entity().unwrap();
        let c = manager.try_create_entity().unwrap();
        manager.try_free_entity(b).unwrap();

        let living: Vec<_> = manager.living().map(|(e, _)| e).collect();
        assert_eq!(living, vec![a, c]);
    }
}
