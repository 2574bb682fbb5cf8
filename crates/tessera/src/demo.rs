//! # Demo World
//!
//! Movers drift under [`MovementSystem`], age under [`LifetimeSystem`] and
//! are counted by [`RenderCounter`]. Every mover is a child of one swarm
//! root, so expiring a mover also unlinks it from the root's child list.

use std::f32::consts::TAU;

use tessera_core::{
    Component, Coordinator, EcsResult, Entity, Relationship, Signature, System,
};

use crate::{HeadlessConfig, HeadlessError};

/// 2D position in world units.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Position {
    /// X coordinate.
    pub x: f32,
    /// Y coordinate.
    pub y: f32,
}
impl Component for Position {}

/// Velocity in world units per second.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Velocity {
    /// X velocity.
    pub dx: f32,
    /// Y velocity.
    pub dy: f32,
}
impl Component for Velocity {}

/// Seconds left before the entity is replaced.
#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct Lifetime {
    /// Remaining seconds.
    pub remaining: f32,
}
impl Component for Lifetime {}

/// Integrates [`Velocity`] into [`Position`].
#[derive(Default)]
pub struct MovementSystem;

impl System for MovementSystem {
    fn update(&mut self, coordinator: &mut Coordinator, entities: &[Entity], dt: f32) {
        for &entity in entities {
            let velocity = *coordinator.get_component::<Velocity>(entity);
            let position = coordinator.get_component_mut::<Position>(entity);
            position.x += velocity.dx * dt;
            position.y += velocity.dy * dt;
        }
    }
}

/// Replaces movers whose [`Lifetime`] ran out.
pub struct LifetimeSystem {
    root: Entity,
    next_seed: u32,
    /// Movers destroyed so far.
    pub expired: u64,
    /// Replacements spawned so far.
    pub spawned: u64,
}

impl LifetimeSystem {
    /// Creates the system. Replacements are attached to `root` and seeded
    /// from `first_seed` upwards.
    #[must_use]
    pub fn new(root: Entity, first_seed: u32) -> Self {
        Self {
            root,
            next_seed: first_seed,
            expired: 0,
            spawned: 0,
        }
    }
}

impl System for LifetimeSystem {
    fn create(&mut self, _coordinator: &mut Coordinator) {
        tracing::debug!(root = %self.root, "lifetime system started");
    }

    fn update(&mut self, coordinator: &mut Coordinator, entities: &[Entity], dt: f32) {
        for &entity in entities {
            let lifetime = coordinator.get_component_mut::<Lifetime>(entity);
            lifetime.remaining -= dt;
            if lifetime.remaining > 0.0 {
                continue;
            }

            // Spawn first so the replacement never reuses the expiring id
            // within the same frame.
            match spawn_mover(coordinator, self.root, self.next_seed) {
                Ok(_) => {
                    self.next_seed = self.next_seed.wrapping_add(1);
                    self.spawned += 1;
                }
                Err(err) => tracing::warn!(error = %err, "failed to spawn replacement"),
            }
            coordinator.destroy_entity(entity);
            self.expired += 1;
        }
    }

    fn destroy(&mut self, _coordinator: &mut Coordinator) {
        tracing::debug!(expired = self.expired, spawned = self.spawned, "lifetime system stopped");
    }
}

/// Counts positioned entities each render pass.
#[derive(Default)]
pub struct RenderCounter {
    /// Render passes run.
    pub frames: u32,
    /// Sum of entities seen over all passes.
    pub drawn: u64,
}

impl System for RenderCounter {
    fn render(&mut self, _coordinator: &mut Coordinator, entities: &[Entity], _dt: f32) {
        self.frames += 1;
        self.drawn += entities.len() as u64;
    }
}

/// Creates one mover under `root`. Values derive from `seed` only.
///
/// A mover that cannot be fully built is destroyed again, so a failure
/// never leaves a partial entity behind.
///
/// # Errors
///
/// Capacity exhaustion, unregistered demo components or a root without
/// [`Relationship`].
pub fn spawn_mover(coordinator: &mut Coordinator, root: Entity, seed: u32) -> EcsResult<Entity> {
    let entity = coordinator.try_create_entity()?;
    match build_mover(coordinator, root, entity, seed) {
        Ok(()) => Ok(entity),
        Err(err) => {
            if let Err(cleanup) = coordinator.try_destroy_entity(entity) {
                tracing::error!(%entity, error = %cleanup, "failed to discard partial mover");
            }
            Err(err)
        }
    }
}

fn build_mover(
    coordinator: &mut Coordinator,
    root: Entity,
    entity: Entity,
    seed: u32,
) -> EcsResult<()> {
    #[allow(clippy::cast_precision_loss)]
    let angle = (seed as f32 * 0.618_034).fract() * TAU;
    #[allow(clippy::cast_precision_loss)]
    let remaining = 1.0 + (seed % 7) as f32 * 0.5;

    coordinator.try_add_component(entity, Position::default())?;
    coordinator.try_add_component(
        entity,
        Velocity {
            dx: angle.cos(),
            dy: angle.sin(),
        },
    )?;
    coordinator.try_add_component(entity, Lifetime { remaining })?;
    coordinator.try_add_component(entity, Relationship::default())?;
    coordinator.try_attach_to(root, entity)?;
    Ok(())
}

/// Summary of a finished run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Frames driven.
    pub frames: u32,
    /// Entities alive at shutdown, root included.
    pub living: u32,
    /// Direct children of the swarm root at shutdown.
    pub children: usize,
    /// Movers that expired.
    pub expired: u64,
    /// Replacement movers spawned.
    pub spawned: u64,
    /// Sum of entities seen by the render counter.
    pub drawn: u64,
}

/// Builds the demo world and drives it for `config.frames` frames.
///
/// # Errors
///
/// [`HeadlessError::Config`] for an invalid config, [`HeadlessError::Ecs`]
/// if building the world fails.
pub fn run(config: &HeadlessConfig) -> Result<RunStats, HeadlessError> {
    config.validate()?;
    let mut coordinator = Coordinator::with_config(config.ecs.clone())?;

    let position = coordinator.try_register_component::<Position>()?;
    let velocity = coordinator.try_register_component::<Velocity>()?;
    let lifetime = coordinator.try_register_component::<Lifetime>()?;
    coordinator.try_register_component::<Relationship>()?;

    let root = coordinator.try_create_entity()?;
    coordinator.try_add_component(root, Relationship::default())?;

    coordinator.try_register_system(MovementSystem)?;
    coordinator
        .try_set_system_signature::<MovementSystem>(Signature::EMPTY.with(position).with(velocity))?;
    let ages = coordinator.try_register_system(LifetimeSystem::new(root, config.entity_count))?;
    coordinator.try_set_system_signature::<LifetimeSystem>(Signature::EMPTY.with(lifetime))?;
    let counter = coordinator.try_register_system(RenderCounter::default())?;
    coordinator.try_set_system_signature::<RenderCounter>(Signature::EMPTY.with(position))?;

    for seed in 0..config.entity_count {
        spawn_mover(&mut coordinator, root, seed)?;
    }
    tracing::info!(
        movers = config.entity_count,
        frames = config.frames,
        dt = config.fixed_dt,
        "world ready"
    );

    coordinator.start();
    for frame in 0..config.frames {
        coordinator.update(config.fixed_dt);
        coordinator.render(config.fixed_dt);

        if frame % 60 == 0 {
            tracing::debug!(frame, living = coordinator.living_entity_count(), "frame");
        }
    }
    coordinator.shutdown();

    let ages = ages.lock();
    let counter = counter.lock();
    let stats = RunStats {
        frames: config.frames,
        living: coordinator.living_entity_count(),
        children: coordinator.children(root).len(),
        expired: ages.expired,
        spawned: ages.spawned,
        drawn: counter.drawn,
    };
    tracing::info!(?stats, "run finished");
    Ok(stats)
}
