//! Component definitions for the ECS farm world.
//!
//! Components are pure data structs attached to entities.
//! They have no behavior - that lives in systems.

mod common;
mod farm;

pub use common::*;
pub use farm::*;
