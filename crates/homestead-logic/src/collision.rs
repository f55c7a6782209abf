//! Collision shapes and the obstacle-query contract.
//!
//! The navigation and placement code never owns physics. It asks an
//! [`ObstacleQuery`] for colliders overlapping a circle or a box and filters
//! the results by kind and layer. [`ColliderSet`] is a flat in-memory
//! implementation used by the engine and by tests.

use serde::{Deserialize, Serialize};

use crate::geometry::{Aabb, Vec2};

/// Stable identifier of a collider (usually the owning entity's bits).
pub type ColliderId = u64;

/// Tag attached to every collider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ColliderKind {
    /// Rocks, fences, placed furniture, tree trunks.
    Obstacle,
    /// Pond or river region.
    Water,
    /// Dropped items the agent walks over to pick up.
    Collectible,
    /// A moving agent's own body.
    Agent,
    /// Non-physical sensor volume.
    Trigger,
}

impl ColliderKind {
    /// Whether agents must path around this kind.
    pub fn blocks_movement(self) -> bool {
        matches!(self, ColliderKind::Obstacle | ColliderKind::Water)
    }
}

/// Collider geometry in world space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Box(Aabb),
    Circle { center: Vec2, radius: f32 },
}

impl Shape {
    pub fn center(&self) -> Vec2 {
        match self {
            Shape::Box(b) => b.center(),
            Shape::Circle { center, .. } => *center,
        }
    }

    pub fn bounds(&self) -> Aabb {
        match self {
            Shape::Box(b) => *b,
            Shape::Circle { center, radius } => Aabb::from_center_size(*center, radius * 2.0, radius * 2.0),
        }
    }

    /// Closest point on (or inside) the shape to `point`.
    pub fn closest_point(&self, point: Vec2) -> Vec2 {
        match self {
            Shape::Box(b) => b.closest_point(point),
            Shape::Circle { center, radius } => {
                let offset = point - *center;
                if offset.length() <= *radius {
                    point
                } else {
                    *center + offset.normalize() * *radius
                }
            }
        }
    }

    pub fn contains(&self, point: Vec2) -> bool {
        match self {
            Shape::Box(b) => b.contains(point),
            Shape::Circle { center, radius } => center.distance(point) <= *radius,
        }
    }

    pub fn overlaps_circle(&self, center: Vec2, radius: f32) -> bool {
        self.closest_point(center).distance(center) < radius
    }

    pub fn overlaps_box(&self, area: &Aabb) -> bool {
        match self {
            Shape::Box(b) => b.intersects(area),
            Shape::Circle { center, radius } => area.distance_to(*center) < *radius,
        }
    }
}

/// A collider as returned by obstacle queries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Collider {
    pub id: ColliderId,
    pub shape: Shape,
    pub kind: ColliderKind,
    /// Floor/elevation layer the collider lives on.
    pub layer: u8,
}

/// Physics collaborator: overlap queries annotated with tag/layer metadata.
pub trait ObstacleQuery {
    fn overlap_circle(&self, center: Vec2, radius: f32) -> Vec<Collider>;
    fn overlap_box(&self, area: Aabb) -> Vec<Collider>;
}

/// Which query hits count as obstructions for a moving agent.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct ObstacleFilter {
    /// The agent's own collider.
    pub exclude: Option<ColliderId>,
    /// Only colliders on this layer count; `None` matches every layer.
    pub layer: Option<u8>,
}

impl ObstacleFilter {
    pub fn new(exclude: Option<ColliderId>, layer: Option<u8>) -> Self {
        Self { exclude, layer }
    }

    pub fn blocks(&self, collider: &Collider) -> bool {
        if !collider.kind.blocks_movement() {
            return false;
        }
        if self.exclude == Some(collider.id) {
            return false;
        }
        match self.layer {
            Some(layer) => collider.layer == layer,
            None => true,
        }
    }
}

/// Flat list of colliders, rebuilt by the engine each frame.
#[derive(Debug, Clone, Default)]
pub struct ColliderSet {
    colliders: Vec<Collider>,
}

impl ColliderSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_colliders(colliders: Vec<Collider>) -> Self {
        Self { colliders }
    }

    pub fn insert(&mut self, collider: Collider) {
        self.colliders.push(collider);
    }

    /// Remove every collider with `id`. Returns true if any was removed.
    pub fn remove(&mut self, id: ColliderId) -> bool {
        let before = self.colliders.len();
        self.colliders.retain(|c| c.id != id);
        self.colliders.len() != before
    }

    pub fn clear(&mut self) {
        self.colliders.clear();
    }

    pub fn len(&self) -> usize {
        self.colliders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.colliders.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &Collider> {
        self.colliders.iter()
    }

    /// Colliders that block movement under `filter`.
    pub fn blocking<'a>(&'a self, filter: &'a ObstacleFilter) -> impl Iterator<Item = &'a Collider> {
        self.colliders.iter().filter(move |c| filter.blocks(c))
    }
}

impl ObstacleQuery for ColliderSet {
    fn overlap_circle(&self, center: Vec2, radius: f32) -> Vec<Collider> {
        self.colliders
            .iter()
            .filter(|c| c.shape.overlaps_circle(center, radius))
            .copied()
            .collect()
    }

    fn overlap_box(&self, area: Aabb) -> Vec<Collider> {
        self.colliders
            .iter()
            .filter(|c| c.shape.overlaps_box(&area))
            .copied()
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rock(id: ColliderId, x: f32, y: f32) -> Collider {
        Collider {
            id,
            shape: Shape::Box(Aabb::from_center_size(Vec2::new(x, y), 1.0, 1.0)),
            kind: ColliderKind::Obstacle,
            layer: 0,
        }
    }

    #[test]
    fn circle_closest_point_outside_and_inside() {
        let s = Shape::Circle {
            center: Vec2::ZERO,
            radius: 1.0,
        };
        let p = s.closest_point(Vec2::new(3.0, 0.0));
        assert!((p.x - 1.0).abs() < 1e-5);
        assert_eq!(s.closest_point(Vec2::new(0.5, 0.0)), Vec2::new(0.5, 0.0));
    }

    #[test]
    fn overlap_queries_find_only_nearby() {
        let mut set = ColliderSet::new();
        set.insert(rock(1, 0.0, 0.0));
        set.insert(rock(2, 10.0, 0.0));

        let hits = set.overlap_circle(Vec2::new(1.0, 0.0), 0.6);
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 1);

        let hits = set.overlap_box(Aabb::new(Vec2::new(9.0, -1.0), Vec2::new(11.0, 1.0)));
        assert_eq!(hits.len(), 1);
        assert_eq!(hits[0].id, 2);
    }

    #[test]
    fn filter_excludes_self_collectibles_and_other_layers() {
        let filter = ObstacleFilter::new(Some(7), Some(0));
        let mut own = rock(7, 0.0, 0.0);
        own.kind = ColliderKind::Agent;
        assert!(!filter.blocks(&own));

        let mut coin = rock(3, 0.0, 0.0);
        coin.kind = ColliderKind::Collectible;
        assert!(!filter.blocks(&coin));

        let mut upstairs = rock(4, 0.0, 0.0);
        upstairs.layer = 1;
        assert!(!filter.blocks(&upstairs));

        assert!(filter.blocks(&rock(5, 0.0, 0.0)));
        let mut pond = rock(6, 0.0, 0.0);
        pond.kind = ColliderKind::Water;
        assert!(filter.blocks(&pond));
    }

    #[test]
    fn remove_by_id() {
        let mut set = ColliderSet::from_colliders(vec![rock(1, 0.0, 0.0), rock(2, 3.0, 0.0)]);
        assert!(set.remove(1));
        assert!(!set.remove(1));
        assert_eq!(set.len(), 1);
    }
}
