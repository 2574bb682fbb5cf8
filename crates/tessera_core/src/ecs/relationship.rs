//! # Relationships
//!
//! Parent/child links stored as an ordinary component. Each parent keeps an
//! intrusive doubly-linked list of its children:
//!
//! ```text
//! parent.first_child -> c3 <-> c2 <-> c1 -> NULL
//! ```
//!
//! New children are inserted at the head, so `first_child` is always the
//! most recently attached child.

use bytemuck::{Pod, Zeroable};

use super::component::Component;
use super::coordinator::Coordinator;
use super::entity::Entity;
use crate::error::{EcsError, EcsResult, OrFatal};

/// Scene-graph links of one entity.
///
/// `Entity::NULL` means "no link". Register it like any other component
/// before use.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Pod, Zeroable)]
#[repr(C)]
pub struct Relationship {
    /// Owning parent, or null for a root.
    pub parent: Entity,
    /// Head of this entity's child list.
    pub first_child: Entity,
    /// Next sibling (attached earlier).
    pub next: Entity,
    /// Previous sibling (attached later).
    pub prev: Entity,
    /// Number of direct children.
    pub size: u32,
}

impl Component for Relationship {}

impl Relationship {
    /// Checks if the entity has no parent.
    #[inline]
    #[must_use]
    pub const fn is_root(&self) -> bool {
        self.parent.is_null()
    }
}

impl Coordinator {
    /// Makes `child` the first child of `parent`.
    ///
    /// Returns `false` without changing anything if `parent == child`,
    /// `child` is already attached to `parent`, or `parent` descends from
    /// `child`. A child attached elsewhere is detached first.
    ///
    /// # Panics
    ///
    /// Panics if either entity lacks a [`Relationship`].
    #[track_caller]
    pub fn attach_to(&mut self, parent: Entity, child: Entity) -> bool {
        self.try_attach_to(parent, child).or_fatal()
    }

    /// Makes `child` the first child of `parent`.
    ///
    /// # Errors
    ///
    /// Missing [`Relationship`] on either side, or a corrupt sibling list
    /// while detaching `child` from its old parent.
    pub fn try_attach_to(&mut self, parent: Entity, child: Entity) -> EcsResult<bool> {
        let parent_links = *self.try_get_component::<Relationship>(parent)?;
        let child_links = *self.try_get_component::<Relationship>(child)?;

        if parent == child || child_links.parent == parent {
            return Ok(false);
        }
        if self.is_descendant_of(parent, child)? {
            tracing::trace!(%parent, %child, "attach rejected: would create a cycle");
            return Ok(false);
        }

        if !child_links.parent.is_null() {
            self.try_detach(child)?;
        }

        let old_head = parent_links.first_child;
        if !old_head.is_null() {
            self.try_get_component_mut::<Relationship>(old_head)?.prev = child;
        }

        let links = self.try_get_component_mut::<Relationship>(child)?;
        links.parent = parent;
        links.next = old_head;
        links.prev = Entity::NULL;

        let links = self.try_get_component_mut::<Relationship>(parent)?;
        links.first_child = child;
        links.size += 1;

        tracing::trace!(%parent, %child, "attached");
        Ok(true)
    }

    /// Unlinks `entity` from its parent, making it a root. Its own children
    /// stay attached to it. Detaching a root is a no-op.
    ///
    /// # Panics
    ///
    /// Panics if `entity` lacks a [`Relationship`] or its sibling list is
    /// inconsistent.
    #[track_caller]
    pub fn detach(&mut self, entity: Entity) {
        self.try_detach(entity).or_fatal();
    }

    /// Unlinks `entity` from its parent, making it a root.
    ///
    /// # Errors
    ///
    /// Missing [`Relationship`], or [`EcsError::CorruptRelationship`] if
    /// the links do not form a valid chain.
    pub fn try_detach(&mut self, entity: Entity) -> EcsResult<()> {
        let links = *self.try_get_component::<Relationship>(entity)?;

        if links.parent.is_null() {
            if !links.next.is_null() || !links.prev.is_null() {
                return Err(EcsError::CorruptRelationship {
                    entity,
                    reason: "root entity has sibling links",
                });
            }
            return Ok(());
        }

        let parent_links = *self.try_get_component::<Relationship>(links.parent)?;
        if parent_links.first_child == entity {
            self.try_get_component_mut::<Relationship>(links.parent)?.first_child = links.next;
            if !links.next.is_null() {
                self.try_get_component_mut::<Relationship>(links.next)?.prev = Entity::NULL;
            }
        } else {
            if links.prev.is_null() {
                return Err(EcsError::CorruptRelationship {
                    entity,
                    reason: "non-head child has no previous sibling",
                });
            }
            self.try_get_component_mut::<Relationship>(links.prev)?.next = links.next;
            if !links.next.is_null() {
                self.try_get_component_mut::<Relationship>(links.next)?.prev = links.prev;
            }
        }

        let parent = self.try_get_component_mut::<Relationship>(links.parent)?;
        parent.size = parent.size.saturating_sub(1);

        let detached = self.try_get_component_mut::<Relationship>(entity)?;
        detached.parent = Entity::NULL;
        detached.next = Entity::NULL;
        detached.prev = Entity::NULL;

        tracing::trace!(%entity, parent = %links.parent, "detached");
        Ok(())
    }

    /// Returns the next sibling of `entity`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` lacks a [`Relationship`].
    #[track_caller]
    #[must_use]
    pub fn next(&self, entity: Entity) -> Entity {
        self.get_component::<Relationship>(entity).next
    }

    /// Returns the previous sibling of `entity`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` lacks a [`Relationship`].
    #[track_caller]
    #[must_use]
    pub fn prev(&self, entity: Entity) -> Entity {
        self.get_component::<Relationship>(entity).prev
    }

    /// Returns the parent of `entity`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` lacks a [`Relationship`].
    #[track_caller]
    #[must_use]
    pub fn parent(&self, entity: Entity) -> Entity {
        self.get_component::<Relationship>(entity).parent
    }

    /// Returns the most recently attached child of `entity`.
    ///
    /// # Panics
    ///
    /// Panics if `entity` lacks a [`Relationship`].
    #[track_caller]
    #[must_use]
    pub fn first_child(&self, entity: Entity) -> Entity {
        self.get_component::<Relationship>(entity).first_child
    }

    /// Collects the children of `parent`, newest first.
    ///
    /// # Panics
    ///
    /// Panics if `parent` or any child lacks a [`Relationship`].
    #[track_caller]
    #[must_use]
    pub fn children(&self, parent: Entity) -> Vec<Entity> {
        let links = self.get_component::<Relationship>(parent);
        let mut children = Vec::with_capacity(links.size as usize);
        let mut cursor = links.first_child;
        while !cursor.is_null() && children.len() < self.config().entity_capacity as usize {
            children.push(cursor);
            cursor = self.next(cursor);
        }
        children
    }

    /// Detaches `entity` from its parent and turns its children into roots.
    pub(super) fn try_unlink(&mut self, entity: Entity) -> EcsResult<()> {
        self.try_detach(entity)?;

        let mut cursor = self.try_get_component::<Relationship>(entity)?.first_child;
        while !cursor.is_null() {
            let child = self.try_get_component_mut::<Relationship>(cursor)?;
            let next = child.next;
            child.parent = Entity::NULL;
            child.next = Entity::NULL;
            child.prev = Entity::NULL;
            cursor = next;
        }

        let links = self.try_get_component_mut::<Relationship>(entity)?;
        links.first_child = Entity::NULL;
        links.size = 0;
        Ok(())
    }

    /// Walks up from `entity` looking for `ancestor`.
    fn is_descendant_of(&self, entity: Entity, ancestor: Entity) -> EcsResult<bool> {
        let mut cursor = self.try_get_component::<Relationship>(entity)?.parent;
        let mut steps = 0;
        while !cursor.is_null() {
            if cursor == ancestor {
                return Ok(true);
            }
            steps += 1;
            if steps > self.config().entity_capacity {
                return Err(EcsError::CorruptRelationship {
                    entity,
                    reason: "parent chain contains a cycle",
                });
            }
            cursor = self.try_get_component::<Relationship>(cursor)?.parent;
        }
        Ok(false)
    }
}
