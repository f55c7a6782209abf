//! Homestead Core - Farm World Engine
//!
//! An ECS-based farm where a player agent walks around obstacles and puts
//! items down through the placement workflow from `homestead-logic`.
//!
//! # Architecture
//!
//! The world uses an Entity Component System (ECS) architecture via `hecs`:
//! - **Entities**: The player, rocks, trees, placed objects, dropped items
//! - **Components**: Pure data attached to entities (Position, Body, Placed, etc.)
//! - **Systems**: Logic that queries and updates components
//!
//! `FarmState` adapts the world to the logic crate's collaborator traits
//! (obstacle queries, footprint environment, placement world) and
//! `FarmEngine` ticks everything in a fixed order once per frame.
//!
//! # Example
//!
//! ```rust,no_run
//! use homestead_core::prelude::*;
//! use homestead_core::generation::FarmConfig;
//!
//! let catalog = load_catalog(r#"[{"id": 1, "name": "Chest", "kind": "Container"}]"#).unwrap();
//! let mut engine = FarmEngine::generate(&FarmConfig::default(), 42, catalog, EngineConfig::default());
//!
//! engine.walk_to(Vec2::new(10.0, 10.0), false);
//! loop {
//!     engine.update(1.0 / 60.0); // 60 FPS
//!     for event in engine.drain_events() {
//!         println!("{:?}", event);
//!     }
//! }
//! ```

pub mod catalog;
pub mod components;
pub mod engine;
pub mod farm;
pub mod generation;
pub mod persistence;
pub mod physics;
pub mod systems;
pub mod terrain;

/// Commonly used types for convenient importing
pub mod prelude {
    pub use crate::catalog::load_catalog;
    pub use crate::components::*;
    pub use crate::engine::{EngineConfig, FarmEngine};
    pub use crate::farm::FarmState;
    pub use crate::terrain::Terrain;
    pub use homestead_logic::events::{GameEvent, NavEvent, PlacementEvent};
    pub use homestead_logic::geometry::Vec2;
}
