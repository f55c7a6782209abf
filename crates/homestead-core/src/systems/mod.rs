//! Systems - logic that operates on components

mod movement;

pub use movement::*;
