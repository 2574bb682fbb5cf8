//! # Component Storage
//!
//! Packed storage for one component type.
//!
//! The storage keeps three arrays in lockstep:
//! - `dense`: the component values, no holes
//! - `index_to_entity`: owner of each dense slot
//! - `entity_to_index`: dense slot of each entity id, or [`VACANT`]
//!
//! Removal moves the last value into the vacated slot, so iteration order
//! is not stable across removals.

use std::any::{type_name, Any};

use bytemuck::Pod;

use super::component::Component;
use super::entity::Entity;
use crate::error::{EcsError, EcsResult};

/// Marks an entity id with no slot in this storage.
const VACANT: u32 = u32::MAX;

/// Dense storage for a single component type.
///
/// # Type Parameters
///
/// * `C` - The component type to store
///
/// # Example
///
/// ```rust,ignore
/// let mut storage: ComponentStorage<Position> = ComponentStorage::new(1024, false);
/// storage.insert(entity, Position { x: 1.0, y: 2.0 })?;
/// ```
pub struct ComponentStorage<C: Component> {
    /// Packed component values.
    dense: Vec<C>,
    /// Entity owning each dense slot.
    index_to_entity: Vec<Entity>,
    /// Dense slot per entity id.
    entity_to_index: Box<[u32]>,
}

impl<C: Component> ComponentStorage<C> {
    /// Creates an empty storage for entity ids `0..capacity`.
    ///
    /// # Arguments
    ///
    /// * `capacity` - Size of the entity id space
    /// * `preallocate` - Reserve `capacity` dense slots up front
    #[must_use]
    pub fn new(capacity: u32, preallocate: bool) -> Self {
        let reserve = if preallocate { capacity as usize } else { 0 };

        Self {
            dense: Vec::with_capacity(reserve),
            index_to_entity: Vec::with_capacity(reserve),
            entity_to_index: vec![VACANT; capacity as usize].into_boxed_slice(),
        }
    }

    /// Number of occupied slots.
    #[inline]
    #[must_use]
    pub fn len(&self) -> usize {
        self.dense.len()
    }

    /// Checks if no entity holds this component.
    #[inline]
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.dense.is_empty()
    }

    /// Checks if `entity` has a slot. Out-of-range ids never do.
    #[inline]
    #[must_use]
    pub fn contains(&self, entity: Entity) -> bool {
        self.slot(entity).is_some()
    }

    /// Appends `value` for `entity` at the next free dense slot.
    ///
    /// # Errors
    ///
    /// [`EcsError::EntityOutOfRange`] for ids beyond the storage, or
    /// [`EcsError::DuplicateComponent`] if `entity` already has a slot.
    pub fn insert(&mut self, entity: Entity, value: C) -> EcsResult<()> {
        let capacity = self.entity_to_index.len();
        let Some(entry) = self.entity_to_index.get_mut(entity.index()) else {
            return Err(EcsError::EntityOutOfRange {
                entity,
                capacity: capacity as u32,
            });
        };
        if *entry != VACANT {
            return Err(EcsError::DuplicateComponent {
                entity,
                component: type_name::<C>(),
            });
        }

        *entry = self.dense.len() as u32;
        self.dense.push(value);
        self.index_to_entity.push(entity);
        Ok(())
    }

    /// Removes and returns `entity`'s value.
    ///
    /// The last occupied slot is moved into the hole and its owner's
    /// `entity_to_index` entry is rewritten.
    ///
    /// # Errors
    ///
    /// [`EcsError::MissingComponent`] if `entity` has no slot.
    pub fn remove(&mut self, entity: Entity) -> EcsResult<C> {
        let Some(removed) = self.slot(entity) else {
            return Err(self.missing(entity));
        };

        let value = self.dense.swap_remove(removed);
        self.index_to_entity.swap_remove(removed);
        if let Some(&moved) = self.index_to_entity.get(removed) {
            self.entity_to_index[moved.index()] = removed as u32;
        }
        self.entity_to_index[entity.index()] = VACANT;

        Ok(value)
    }

    /// Gets `entity`'s value.
    #[inline]
    #[must_use]
    pub fn get(&self, entity: Entity) -> Option<&C> {
        self.slot(entity).map(|slot| &self.dense[slot])
    }

    /// Gets `entity`'s value mutably.
    #[inline]
    pub fn get_mut(&mut self, entity: Entity) -> Option<&mut C> {
        self.slot(entity).map(|slot| &mut self.dense[slot])
    }

    /// Gets `entity`'s value, failing if absent.
    ///
    /// # Errors
    ///
    /// [`EcsError::MissingComponent`] if `entity` has no slot.
    pub fn try_get(&self, entity: Entity) -> EcsResult<&C> {
        self.get(entity).ok_or_else(|| self.missing(entity))
    }

    /// Gets `entity`'s value mutably, failing if absent.
    ///
    /// # Errors
    ///
    /// [`EcsError::MissingComponent`] if `entity` has no slot.
    pub fn try_get_mut(&mut self, entity: Entity) -> EcsResult<&mut C> {
        match self.slot(entity) {
            Some(slot) => Ok(&mut self.dense[slot]),
            None => Err(self.missing(entity)),
        }
    }

    /// Returns the packed values.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[C] {
        &self.dense
    }

    /// Returns the packed values mutably.
    #[inline]
    pub fn as_mut_slice(&mut self) -> &mut [C] {
        &mut self.dense
    }

    /// Returns the owners of the packed values, slot for slot.
    #[inline]
    #[must_use]
    pub fn entities(&self) -> &[Entity] {
        &self.index_to_entity
    }

    /// Iterates over owners and values in dense order.
    pub fn iter(&self) -> impl Iterator<Item = (Entity, &C)> {
        self.index_to_entity.iter().copied().zip(self.dense.iter())
    }

    /// Iterates mutably over owners and values in dense order.
    pub fn iter_mut(&mut self) -> impl Iterator<Item = (Entity, &mut C)> {
        self.index_to_entity.iter().copied().zip(self.dense.iter_mut())
    }

    #[inline]
    fn slot(&self, entity: Entity) -> Option<usize> {
        match self.entity_to_index.get(entity.index()) {
            Some(&VACANT) | None => None,
            Some(&slot) => Some(slot as usize),
        }
    }

    fn missing(&self, entity: Entity) -> EcsError {
        EcsError::MissingComponent {
            entity,
            component: type_name::<C>(),
        }
    }

    /// Checks that both indirection maps are exact inverses.
    #[cfg(test)]
    pub(crate) fn assert_consistent(&self) {
        assert_eq!(self.dense.len(), self.index_to_entity.len());
        for (slot, entity) in self.index_to_entity.iter().enumerate() {
            assert_eq!(self.entity_to_index[entity.index()] as usize, slot);
        }
        let occupied = self.entity_to_index.iter().filter(|&&slot| slot != VACANT).count();
        assert_eq!(occupied, self.dense.len());
    }
}

impl<C: Component + Pod> ComponentStorage<C> {
    /// Returns the packed values as raw bytes, ready for a GPU upload.
    #[inline]
    #[must_use]
    pub fn as_bytes(&self) -> &[u8] {
        bytemuck::cast_slice(&self.dense)
    }
}

/// Type-erased view of a [`ComponentStorage`], used for broadcasts.
pub trait ErasedStorage {
    /// Drops `entity`'s value if present. No-op otherwise.
    fn entity_destroyed(&mut self, entity: Entity);

    /// Checks if `entity` has a slot.
    fn contains(&self, entity: Entity) -> bool;

    /// Number of occupied slots.
    fn len(&self) -> usize;

    /// Checks if the storage is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Upcast for downcasting back to the concrete storage.
    fn as_any(&self) -> &dyn Any;

    /// Mutable upcast for downcasting back to the concrete storage.
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<C: Component> ErasedStorage for ComponentStorage<C> {
    fn entity_destroyed(&mut self, entity: Entity) {
        if self.contains(entity) {
            let _ = self.remove(entity);
        }
    }

    fn contains(&self, entity: Entity) -> bool {
        ComponentStorage::contains(self, entity)
    }

    fn len(&self) -> usize {
        ComponentStorage::len(self)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }

    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytemuck::Zeroable;
    use rand::{Rng, SeedableRng};
    use rand_chacha::ChaCha8Rng;

    #[derive(Clone, Copy, Debug, Default, PartialEq, Pod, Zeroable)]
    #[repr(C)]
    struct Health(u32);

    impl Component for Health {}

    fn e(id: u32) -> Entity {
        Entity::from_raw(id)
    }

    #[test]
    fn test_insert_get() {
        let mut storage: ComponentStorage<Health> = ComponentStorage::new(16, false);
        storage.insert(e(3), Health(30)).unwrap();
        storage.insert(e(1), Health(10)).unwrap();

        assert_eq!(storage.get(e(3)), Some(&Health(30)));
        assert_eq!(storage.get(e(1)), Some(&Health(10)));
        assert_eq!(storage.get(e(2)), None);
        assert_eq!(storage.len(), 2);
        assert_eq!(storage.entities(), &[e(3), e(1)]);
    }

    #[test]
    fn test_duplicate_insert_fails() {
        let mut storage: ComponentStorage<Health> = ComponentStorage::new(16, false);
        storage.insert(e(4), Health(1)).unwrap();
        let err = storage.insert(e(4), Health(2)).unwrap_err();
        assert!(matches!(err, EcsError::DuplicateComponent { entity, .. } if entity == e(4)));
        assert_eq!(storage.get(e(4)), Some(&Health(1)));
    }

    #[test]
    fn test_out_of_range_insert_fails() {
        let mut storage: ComponentStorage<Health> = ComponentStorage::new(8, false);
        assert_eq!(
            storage.insert(e(8), Health(0)),
            Err(EcsError::EntityOutOfRange { entity: e(8), capacity: 8 })
        );
        assert!(!storage.contains(e(100)));
    }

    #[test]
    fn test_remove_moves_last_into_hole() {
        let mut storage: ComponentStorage<Health> = ComponentStorage::new(16, false);
        for id in 1..=4 {
            storage.insert(e(id), Health(id * 10)).unwrap();
        }

        assert_eq!(storage.remove(e(2)), Ok(Health(20)));
        assert_eq!(storage.entities(), &[e(1), e(4), e(3)]);
        assert_eq!(storage.get(e(4)), Some(&Health(40)));
        storage.assert_consistent();

        // Removing the last slot moves nothing.
        assert_eq!(storage.remove(e(3)), Ok(Health(30)));
        assert_eq!(storage.entities(), &[e(1), e(4)]);
        storage.assert_consistent();
    }

    #[test]
    fn test_remove_missing_fails() {
        let mut storage: ComponentStorage<Health> = ComponentStorage::new(16, false);
        assert!(matches!(
            storage.remove(e(5)),
            Err(EcsError::MissingComponent { .. })
        ));
        assert!(storage.try_get(e(5)).is_err());
    }

    #[test]
    fn test_erased_destroy_is_idempotent() {
        let mut storage: ComponentStorage<Health> = ComponentStorage::new(16, false);
        storage.insert(e(2), Health(2)).unwrap();

        let erased: &mut dyn ErasedStorage = &mut storage;
        erased.entity_destroyed(e(2));
        erased.entity_destroyed(e(2));
        erased.entity_destroyed(e(9));
        assert!(erased.is_empty());
    }

    #[test]
    fn test_as_bytes_covers_dense_values() {
        let mut storage: ComponentStorage<Health> = ComponentStorage::new(16, true);
        storage.insert(e(1), Health(1)).unwrap();
        storage.insert(e(2), Health(2)).unwrap();
        assert_eq!(storage.as_bytes().len(), 2 * std::mem::size_of::<Health>());
    }

    #[test]
    fn test_random_churn_keeps_maps_inverse() {
        const CAPACITY: u32 = 512;
        let mut rng = ChaCha8Rng::seed_from_u64(0x7e55_e4a0);
        let mut storage: ComponentStorage<Health> = ComponentStorage::new(CAPACITY, false);
        let mut holders = vec![false; CAPACITY as usize];

        for id in 1..CAPACITY {
            storage.insert(e(id), Health(id)).unwrap();
            holders[id as usize] = true;
        }

        for _ in 0..5_000 {
            let id = rng.gen_range(1..CAPACITY);
            if holders[id as usize] {
                assert_eq!(storage.remove(e(id)), Ok(Health(id)));
            } else {
                storage.insert(e(id), Health(id)).unwrap();
            }
            holders[id as usize] = !holders[id as usize];

            let expected = holders.iter().filter(|&&held| held).count();
            assert_eq!(storage.len(), expected);
        }

        storage.assert_consistent();
        for (entity, value) in storage.iter() {
            assert_eq!(value.0, entity.id());
        }
    }
}
