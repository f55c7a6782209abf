//! The farm world as seen by the placement workflow.
//!
//! `FarmState` owns the ECS world, the terrain and the per-frame collider
//! snapshot. Spawning or removing a solid object updates the snapshot in
//! place and marks obstacles dirty so the engine rebuilds the planner.

use hecs::{Entity, EntityBuilder, World};
use homestead_logic::collision::{ColliderKind, ColliderSet, ObstacleQuery};
use homestead_logic::events::InstanceId;
use homestead_logic::footprint::{FootprintEnvironment, Season};
use homestead_logic::geometry::{Aabb, CellCoord, Vec2};
use homestead_logic::items::{ItemDef, PlacementCapability};
use homestead_logic::placement::{PlacementWorld, SpawnedInstance};

use crate::components::*;
use crate::physics::{collect_colliders, collider_id, entity_collider, entity_from_id};
use crate::systems::movement_system;
use crate::terrain::Terrain;

pub struct FarmState {
    pub world: World,
    pub terrain: Terrain,
    pub season: Season,
    /// Simulation time in seconds
    pub sim_time: f64,
    colliders: ColliderSet,
    next_stable_id: u64,
    obstacles_dirty: bool,
}

impl FarmState {
    pub fn new(world: World, terrain: Terrain) -> Self {
        let colliders = collect_colliders(&world, &terrain);
        let next_stable_id = world
            .query::<&Placed>()
            .iter()
            .map(|(_, p)| p.stable_id)
            .max()
            .unwrap_or(0)
            + 1;
        Self {
            world,
            terrain,
            season: Season::Spring,
            sim_time: 0.0,
            colliders,
            next_stable_id,
            obstacles_dirty: true,
        }
    }

    pub fn colliders(&self) -> &ColliderSet {
        &self.colliders
    }

    /// Re-read every body from the world (agents move every frame)
    pub fn refresh_colliders(&mut self) {
        self.colliders = collect_colliders(&self.world, &self.terrain);
    }

    /// Move agents against the current collider snapshot
    pub fn step_movement(&mut self, delta_seconds: f32) {
        movement_system(&mut self.world, &self.colliders, self.terrain.bounds(), delta_seconds);
    }

    pub fn obstacles_dirty(&self) -> bool {
        self.obstacles_dirty
    }

    pub fn mark_obstacles_dirty(&mut self) {
        self.obstacles_dirty = true;
    }

    /// Returns whether obstacles changed since the last call
    pub fn take_obstacles_dirty(&mut self) -> bool {
        std::mem::replace(&mut self.obstacles_dirty, false)
    }

    pub fn next_stable_id(&self) -> u64 {
        self.next_stable_id
    }

    pub fn placed_count(&self) -> usize {
        self.world.query::<&Placed>().iter().count()
    }

    pub fn find_placed(&self, stable_id: u64) -> Option<Entity> {
        self.world
            .query::<&Placed>()
            .iter()
            .find(|(_, p)| p.stable_id == stable_id)
            .map(|(e, _)| e)
    }
}

impl FootprintEnvironment for FarmState {
    fn tile_size(&self) -> f32 {
        self.terrain.tile_size()
    }

    fn obstacles(&self) -> &dyn ObstacleQuery {
        &self.colliders
    }

    fn layer_at(&self, cell: CellCoord) -> Option<u8> {
        self.terrain.layer_at(cell)
    }

    fn is_water(&self, cell: CellCoord) -> bool {
        self.terrain.is_water(cell)
    }

    fn has_colliderless_occupant(&self, cell: CellCoord) -> bool {
        self.world
            .query::<(&Placed, Option<&Body>)>()
            .iter()
            .any(|(_, (placed, body))| body.is_none() && placed.covers(cell))
    }

    fn season(&self) -> Season {
        self.season
    }

    fn is_farmland(&self, cell: CellCoord) -> bool {
        self.terrain.is_farmland(cell)
    }

    fn nearest_tree_distance(&self, point: Vec2) -> Option<f32> {
        let trees = self
            .world
            .query::<(&Position, &Tree)>()
            .iter()
            .map(|(_, (pos, _))| pos.pos.distance(point))
            .collect::<Vec<_>>();
        let saplings = self
            .world
            .query::<(&Position, &Sapling)>()
            .iter()
            .map(|(_, (pos, _))| pos.pos.distance(point))
            .collect::<Vec<_>>();
        trees.into_iter().chain(saplings).reduce(f32::min)
    }
}

impl PlacementWorld for FarmState {
    fn spawn_placed(&mut self, def: &ItemDef, anchor: Vec2, footprint: Aabb) -> Option<SpawnedInstance> {
        let tile = self.terrain.tile_size();
        let cell = CellCoord::from_world(footprint.min + Vec2::new(tile / 2.0, tile / 2.0), tile);
        if !self.terrain.in_bounds(cell) {
            log::warn!("refusing to place {} outside the map", def.name);
            return None;
        }
        let stable_id = self.next_stable_id;
        self.next_stable_id += 1;

        let placed = Placed {
            stable_id,
            item_id: def.id,
            cell,
            size: def.footprint,
        };
        let is_sapling = def.capability() == PlacementCapability::Sapling;
        let mut builder = EntityBuilder::new();
        builder.add_bundle((Position::new(anchor.x, anchor.y), placed, Name::new(def.name.clone())));
        if def.has_collider {
            builder.add(
                Body::rect(footprint.width(), footprint.height(), ColliderKind::Obstacle)
                    .with_offset(def.pivot_offset),
            );
        }
        if is_sapling {
            builder.add(Sapling { stage: 0 });
        }
        let entity = self.world.spawn(builder.build());

        let mut controller = None;
        if is_sapling {
            let c = self.world.spawn((GrowthController {
                sapling: stable_id,
                planted_at: self.sim_time,
            },));
            controller = Some(collider_id(c));
        }

        if let Some(collider) = entity_collider(&self.world, entity) {
            self.colliders.insert(collider);
            self.obstacles_dirty = true;
        }
        Some(SpawnedInstance {
            instance: collider_id(entity),
            controller,
        })
    }

    fn despawn_placed(&mut self, instance: InstanceId) -> bool {
        let Some(entity) = entity_from_id(instance) else {
            return false;
        };
        let stable_id = match self.world.get::<&Placed>(entity) {
            Ok(placed) => placed.stable_id,
            Err(_) => return false,
        };
        let controllers: Vec<Entity> = self
            .world
            .query::<&GrowthController>()
            .iter()
            .filter(|(_, c)| c.sapling == stable_id)
            .map(|(e, _)| e)
            .collect();
        for c in controllers {
            let _ = self.world.despawn(c);
        }
        if self.world.despawn(entity).is_err() {
            return false;
        }
        if self.colliders.remove(instance) {
            self.obstacles_dirty = true;
        }
        true
    }

    fn sync_layer(&mut self, instance: InstanceId, layer: u8) {
        let Some(entity) = entity_from_id(instance) else {
            return;
        };
        if let Ok(mut pos) = self.world.get::<&mut Position>(entity) {
            pos.layer = layer;
        }
        if let Some(collider) = entity_collider(&self.world, entity) {
            self.colliders.remove(instance);
            self.colliders.insert(collider);
        }
    }
}
