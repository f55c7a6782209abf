//! Movement system - applies `MoveInput` to agents with wall sliding
//!
//! Algorithm: "clamp then slide"
//! 1. Compute the target position from direction × speed × dt
//! 2. Clamp it to the map bounds (inset by the agent radius)
//! 3. If the agent's circle is free there, move
//! 4. Otherwise try the x-only move, then the y-only move (slide along the wall)
//! 5. Otherwise stay put
//!
//! A position is free when no blocking collider on the agent's layer
//! (other than the agent itself) overlaps the agent circle. Colliders the
//! agent already overlaps when the step starts are ignored so it can get out.

use hecs::World;
use homestead_logic::collision::{ColliderId, ObstacleFilter, ObstacleQuery};
use homestead_logic::geometry::{Aabb, Vec2};

use crate::components::{Agent, Body, Facing, MoveInput, Position};
use crate::physics::collider_id;

/// Move every agent according to its `MoveInput`
pub fn movement_system(world: &mut World, obstacles: &dyn ObstacleQuery, bounds: Aabb, delta_seconds: f32) {
    let mut updates: Vec<(hecs::Entity, Vec2, Option<Vec2>)> = Vec::new();

    for (entity, (pos, agent, input, body)) in world
        .query::<(&Position, &Agent, &MoveInput, Option<&Body>)>()
        .iter()
    {
        let offset = body.map(|b| b.offset).unwrap_or(Vec2::ZERO);
        let facing = input
            .facing
            .or_else(|| (!input.direction.is_zero()).then_some(input.direction));
        if input.direction.is_zero() {
            if facing.is_some() {
                updates.push((entity, pos.pos, facing));
            }
            continue;
        }
        let filter = ObstacleFilter::new(Some(collider_id(entity)), Some(pos.layer));
        let delta = input.direction.normalize() * (agent.speed(input.run) * delta_seconds);
        let center = compute_move(pos.pos + offset, delta, agent.radius, bounds, obstacles, &filter);
        updates.push((entity, center - offset, facing));
    }

    for (entity, new_pos, facing) in updates {
        if let Ok(mut pos) = world.get::<&mut Position>(entity) {
            pos.pos = new_pos;
        }
        if let Some(dir) = facing {
            if let Ok(mut f) = world.get::<&mut Facing>(entity) {
                f.0 = dir;
            }
        }
    }
}

/// Resolve one step for a circle of `radius` centered at `start`.
pub fn compute_move(
    start: Vec2,
    delta: Vec2,
    radius: f32,
    bounds: Aabb,
    obstacles: &dyn ObstacleQuery,
    filter: &ObstacleFilter,
) -> Vec2 {
    let inner = bounds.expand(-radius);
    let clamp = |p: Vec2| inner.closest_point(p);
    let blockers = |p: Vec2| -> Vec<ColliderId> {
        obstacles
            .overlap_circle(p, radius)
            .iter()
            .filter(|c| filter.blocks(c))
            .map(|c| c.id)
            .collect()
    };
    // Something spawned on top of the agent stays passable until it walks out
    let embedded = blockers(start);
    let is_free = |p: Vec2| blockers(p).iter().all(|id| embedded.contains(id));

    let target = clamp(start + delta);
    if is_free(target) {
        return target;
    }

    let x_only = clamp(Vec2::new(target.x, start.y));
    if x_only != start && is_free(x_only) {
        return x_only;
    }

    let y_only = clamp(Vec2::new(start.x, target.y));
    if y_only != start && is_free(y_only) {
        return y_only;
    }

    start
}

#[cfg(test)]
mod tests {
    use super::*;
    use homestead_logic::collision::{Collider, ColliderKind, ColliderSet, Shape};

    fn bounds() -> Aabb {
        Aabb::new(Vec2::ZERO, Vec2::new(20.0, 20.0))
    }

    fn wall_at_x(x: f32) -> ColliderSet {
        ColliderSet::from_colliders(vec![Collider {
            id: 1,
            shape: Shape::Box(Aabb::new(Vec2::new(x, 0.0), Vec2::new(x + 1.0, 20.0))),
            kind: ColliderKind::Obstacle,
            layer: 0,
        }])
    }

    #[test]
    fn test_free_movement() {
        let obstacles = ColliderSet::new();
        let p = compute_move(
            Vec2::new(5.0, 5.0),
            Vec2::new(1.0, 0.0),
            0.3,
            bounds(),
            &obstacles,
            &ObstacleFilter::default(),
        );
        assert_eq!(p, Vec2::new(6.0, 5.0));
    }

    #[test]
    fn test_clamped_to_map_bounds() {
        let obstacles = ColliderSet::new();
        let p = compute_move(
            Vec2::new(19.5, 5.0),
            Vec2::new(2.0, 0.0),
            0.3,
            bounds(),
            &obstacles,
            &ObstacleFilter::default(),
        );
        assert!((p.x - 19.7).abs() < 1e-4, "got {:?}", p);
    }

    #[test]
    fn test_slide_along_wall() {
        let obstacles = wall_at_x(10.0);
        let start = Vec2::new(9.6, 5.0);
        let p = compute_move(
            start,
            Vec2::new(0.3, 0.3),
            0.3,
            bounds(),
            &obstacles,
            &ObstacleFilter::default(),
        );
        assert_eq!(p.x, start.x, "x blocked by wall");
        assert!((p.y - 5.3).abs() < 1e-4, "y slides, got {:?}", p);
    }

    #[test]
    fn test_blocked_head_on_stays() {
        let obstacles = wall_at_x(10.0);
        let start = Vec2::new(9.6, 5.0);
        let p = compute_move(
            start,
            Vec2::new(0.3, 0.0),
            0.3,
            bounds(),
            &obstacles,
            &ObstacleFilter::default(),
        );
        assert_eq!(p, start);
    }

    #[test]
    fn test_embedded_agent_can_walk_out() {
        let obstacles = wall_at_x(10.0);
        let start = Vec2::new(10.1, 5.0);
        let p = compute_move(
            start,
            Vec2::new(-0.3, 0.0),
            0.3,
            bounds(),
            &obstacles,
            &ObstacleFilter::default(),
        );
        assert!((p.x - 9.8).abs() < 1e-4, "got {:?}", p);
    }

    #[test]
    fn test_system_moves_agent_and_sets_facing() {
        let mut world = World::new();
        let e = world.spawn((
            Position::new(2.0, 2.0),
            Agent::default(),
            MoveInput {
                direction: Vec2::RIGHT,
                run: false,
                facing: None,
            },
            Facing::default(),
            Body::circle(0.3, ColliderKind::Agent),
        ));
        let obstacles = ColliderSet::new();
        movement_system(&mut world, &obstacles, bounds(), 0.5);
        let pos = world.get::<&Position>(e).unwrap().pos;
        assert!((pos.x - 3.5).abs() < 1e-4);
        assert_eq!(world.get::<&Facing>(e).unwrap().0, Vec2::RIGHT);
    }
}
