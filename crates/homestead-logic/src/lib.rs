//! Pure navigation and placement logic for Homestead.
//!
//! Nothing in this crate knows about an ECS, a renderer or a physics
//! engine. Collaborators (obstacle queries, inventory, the placement world,
//! the movement executor) are traits, and components publish events into
//! outboxes that the caller drains. That keeps every module unit-testable
//! and lets the engine crate decide scheduling.
//!
//! # Module Overview
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`collision`] | Collider shapes, kinds, layers and the obstacle-query trait |
//! | [`events`] | Navigation and placement events, cancel/interrupt reasons |
//! | [`feedback`] | Timed flash/shake effects advanced per tick |
//! | [`follower`] | Path following, visibility shortcutting, steering, stuck recovery |
//! | [`footprint`] | Footprint cell validation and item placement rules |
//! | [`geometry`] | `Vec2`, `Aabb`, tile `CellCoord` |
//! | [`inventory`] | Inventory trait, change log, slot backpack |
//! | [`items`] | Item definitions, placement capability, catalog |
//! | [`placement`] | Preview/lock/navigate/commit state machine with undo |
//! | [`planner`] | Planner trait and the 8-connected A* grid planner |

pub mod collision;
pub mod events;
pub mod feedback;
pub mod follower;
pub mod footprint;
pub mod geometry;
pub mod inventory;
pub mod items;
pub mod placement;
pub mod planner;
