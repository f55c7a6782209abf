//! Common components used across multiple entity types.

use homestead_logic::collision::{ColliderKind, Shape};
use homestead_logic::geometry::{Aabb, Vec2};
use serde::{Deserialize, Serialize};

/// Spatial position component - the entity's origin (feet/pivot) on the farm
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Position {
    pub pos: Vec2,
    /// Floor/elevation layer
    pub layer: u8,
}

impl Position {
    pub fn new(x: f32, y: f32) -> Self {
        Self {
            pos: Vec2::new(x, y),
            layer: 0,
        }
    }

    pub fn on_layer(mut self, layer: u8) -> Self {
        self.layer = layer;
        self
    }
}

/// Collision shape relative to the entity origin
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum BodyShape {
    Circle { radius: f32 },
    Box { width: f32, height: f32 },
}

/// Collision body component
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Body {
    pub shape: BodyShape,
    /// Offset from the entity origin to the shape center
    pub offset: Vec2,
    pub kind: ColliderKind,
}

impl Body {
    pub fn circle(radius: f32, kind: ColliderKind) -> Self {
        Self {
            shape: BodyShape::Circle { radius },
            offset: Vec2::ZERO,
            kind,
        }
    }

    pub fn rect(width: f32, height: f32, kind: ColliderKind) -> Self {
        Self {
            shape: BodyShape::Box { width, height },
            offset: Vec2::ZERO,
            kind,
        }
    }

    pub fn with_offset(mut self, offset: Vec2) -> Self {
        self.offset = offset;
        self
    }

    /// Shape center for an entity whose origin is at `origin`
    pub fn center(&self, origin: Vec2) -> Vec2 {
        origin + self.offset
    }

    pub fn world_shape(&self, origin: Vec2) -> Shape {
        let center = self.center(origin);
        match self.shape {
            BodyShape::Circle { radius } => Shape::Circle { center, radius },
            BodyShape::Box { width, height } => {
                Shape::Box(Aabb::from_center_size(center, width, height))
            }
        }
    }
}

/// Name component for entities shown to the player
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Name(pub String);

impl Name {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}
