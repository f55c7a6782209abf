//! Farm-specific components: agents, placed objects, natural obstacles.

use homestead_logic::follower::MovementExecutor;
use homestead_logic::footprint::FootprintSize;
use homestead_logic::geometry::{CellCoord, Vec2};
use homestead_logic::items::ItemId;
use serde::{Deserialize, Serialize};

/// Marker for the player-controlled agent
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct Player;

/// A walking agent
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct Agent {
    /// Units per second while walking
    pub walk_speed: f32,
    /// Units per second while running
    pub run_speed: f32,
    /// Physical radius used by collision and planning
    pub radius: f32,
}

impl Default for Agent {
    fn default() -> Self {
        Self {
            walk_speed: 3.0,
            run_speed: 5.0,
            radius: 0.3,
        }
    }
}

impl Agent {
    pub fn speed(&self, run: bool) -> f32 {
        if run {
            self.run_speed
        } else {
            self.walk_speed
        }
    }
}

/// Movement request written once per tick by whoever owns the agent
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct MoveInput {
    pub direction: Vec2,
    pub run: bool,
    pub facing: Option<Vec2>,
}

impl MovementExecutor for MoveInput {
    fn set_movement_input(&mut self, direction: Vec2, run: bool, facing: Option<Vec2>) {
        self.direction = direction;
        self.run = run;
        self.facing = facing;
    }
}

/// Direction the sprite faces
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Facing(pub Vec2);

impl Default for Facing {
    fn default() -> Self {
        Self(Vec2::new(0.0, -1.0))
    }
}

/// An object put down through the placement workflow
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Placed {
    /// Survives save/load, unlike entity handles
    pub stable_id: u64,
    pub item_id: ItemId,
    /// Bottom-left footprint cell
    pub cell: CellCoord,
    pub size: FootprintSize,
}

impl Placed {
    pub fn covers(&self, cell: CellCoord) -> bool {
        cell.x >= self.cell.x
            && cell.y >= self.cell.y
            && cell.x < self.cell.x + self.size.width as i32
            && cell.y < self.cell.y + self.size.height as i32
    }
}

/// Planted sapling; growth is driven by its controller entity
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Sapling {
    pub stage: u8,
}

/// Growth bookkeeping for one sapling
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct GrowthController {
    /// `Placed::stable_id` of the sapling
    pub sapling: u64,
    /// Simulation time (seconds) at planting
    pub planted_at: f64,
}

/// Grown tree
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Tree;

/// Rock or stump from farm generation
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Rock;

/// Item lying on the ground, picked up by walking over it
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub struct Collectible {
    pub item_id: ItemId,
    pub quality: u8,
    pub count: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_placed_covers_footprint() {
        let placed = Placed {
            stable_id: 1,
            item_id: 3,
            cell: CellCoord::new(2, 2),
            size: FootprintSize::new(2, 1),
        };
        assert!(placed.covers(CellCoord::new(2, 2)));
        assert!(placed.covers(CellCoord::new(3, 2)));
        assert!(!placed.covers(CellCoord::new(4, 2)));
        assert!(!placed.covers(CellCoord::new(2, 3)));
    }

    #[test]
    fn test_move_input_executor() {
        let mut input = MoveInput::default();
        input.set_movement_input(Vec2::RIGHT, true, Some(Vec2::RIGHT));
        assert_eq!(input.direction, Vec2::RIGHT);
        assert!(input.run);
        assert_eq!(Agent::default().speed(true), 5.0);
    }
}
