//! Collider collection and entity lookups for the navigation layer.

use hecs::{Entity, World};
use homestead_logic::collision::{Collider, ColliderId, ColliderSet};
use homestead_logic::follower::{TargetLocator, TargetRef};
use homestead_logic::geometry::Vec2;

use crate::components::{Body, Position};
use crate::terrain::Terrain;

pub fn collider_id(entity: Entity) -> ColliderId {
    entity.to_bits().get()
}

pub fn entity_from_id(id: ColliderId) -> Option<Entity> {
    Entity::from_bits(id)
}

/// Collider for one entity, if it has a body
pub fn entity_collider(world: &World, entity: Entity) -> Option<Collider> {
    let pos = world.get::<&Position>(entity).ok()?;
    let body = world.get::<&Body>(entity).ok()?;
    Some(Collider {
        id: collider_id(entity),
        shape: body.world_shape(pos.pos),
        kind: body.kind,
        layer: pos.layer,
    })
}

/// Snapshot every entity body plus terrain water into a flat set
pub fn collect_colliders(world: &World, terrain: &Terrain) -> ColliderSet {
    let mut colliders: Vec<Collider> = world
        .query::<(&Position, &Body)>()
        .iter()
        .map(|(entity, (pos, body))| Collider {
            id: collider_id(entity),
            shape: body.world_shape(pos.pos),
            kind: body.kind,
            layer: pos.layer,
        })
        .collect();
    colliders.extend(terrain.water_colliders());
    ColliderSet::from_colliders(colliders)
}

/// Resolves follow targets against live entity positions
pub struct EntityLocator<'a> {
    pub world: &'a World,
}

impl TargetLocator for EntityLocator<'_> {
    fn locate(&self, target: TargetRef) -> Option<Vec2> {
        let entity = entity_from_id(target)?;
        let pos = self.world.get::<&Position>(entity).ok()?;
        Some(pos.pos)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use homestead_logic::collision::{ColliderKind, ObstacleQuery};
    use homestead_logic::geometry::CellCoord;

    #[test]
    fn test_collect_includes_bodies_and_water() {
        let mut world = World::new();
        let rock = world.spawn((Position::new(2.0, 2.0), Body::rect(1.0, 1.0, ColliderKind::Obstacle)));
        world.spawn((Position::new(5.0, 5.0),));
        let mut terrain = Terrain::new(8, 8, 1.0);
        terrain.fill(CellCoord::new(6, 6), CellCoord::new(6, 6), |t| t.water = true);

        let set = collect_colliders(&world, &terrain);
        assert_eq!(set.len(), 2);
        let hits = set.overlap_circle(Vec2::new(2.0, 2.0), 0.1);
        assert_eq!(hits.len(), 1);
        assert_eq!(entity_from_id(hits[0].id), Some(rock));
    }

    #[test]
    fn test_locator_tracks_entity() {
        let mut world = World::new();
        let cow = world.spawn((Position::new(1.0, 1.0),));
        let id = collider_id(cow);
        {
            let locator = EntityLocator { world: &world };
            assert_eq!(locator.locate(id), Some(Vec2::new(1.0, 1.0)));
        }
        world.despawn(cow).unwrap();
        let locator = EntityLocator { world: &world };
        assert_eq!(locator.locate(id), None);
    }
}
