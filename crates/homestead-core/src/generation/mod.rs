//! Generation - procedural creation of farms

mod farm;

pub use farm::*;
