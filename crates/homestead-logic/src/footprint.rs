//! Footprint validation: which cells an item would occupy and whether
//! each of them can take it.
//!
//! Validity is purely local: a cell fails on layer mismatch first, then on
//! obstacle presence. Whether the agent can actually reach the footprint is
//! the navigation layer's concern and never affects the report.

use serde::{Deserialize, Serialize};

use crate::collision::{ColliderKind, ObstacleQuery};
use crate::geometry::{Aabb, CellCoord, Vec2};

/// Shrink applied to cell bounds before overlap queries so neighbours that
/// merely touch an edge do not count.
const CELL_QUERY_INSET: f32 = 0.01;

/// Why a cell (or a whole placement) is refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum InvalidReason {
    None,
    LayerMismatch,
    ObstaclePresent,
    WrongSeason,
    OnFarmland,
    TooCloseToTree,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Season {
    Spring,
    Summer,
    Fall,
    Winter,
}

impl Season {
    pub const ALL: [Season; 4] = [Season::Spring, Season::Summer, Season::Fall, Season::Winter];

    pub fn next(self) -> Season {
        match self {
            Season::Spring => Season::Summer,
            Season::Summer => Season::Fall,
            Season::Fall => Season::Winter,
            Season::Winter => Season::Spring,
        }
    }
}

/// Per-cell verdict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CellState {
    pub cell: CellCoord,
    pub valid: bool,
    pub reason: InvalidReason,
}

impl CellState {
    pub fn ok(cell: CellCoord) -> Self {
        Self {
            cell,
            valid: true,
            reason: InvalidReason::None,
        }
    }

    pub fn invalid(cell: CellCoord, reason: InvalidReason) -> Self {
        Self {
            cell,
            valid: false,
            reason,
        }
    }
}

/// Footprint size in cells.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FootprintSize {
    pub width: u32,
    pub height: u32,
}

impl FootprintSize {
    pub const SINGLE: Self = Self {
        width: 1,
        height: 1,
    };

    pub fn new(width: u32, height: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    /// Cells covered when `anchor` is the bottom-left cell, row by row.
    pub fn cells(&self, anchor: CellCoord) -> Vec<CellCoord> {
        let mut cells = Vec::with_capacity((self.width * self.height) as usize);
        for dy in 0..self.height as i32 {
            for dx in 0..self.width as i32 {
                cells.push(anchor.offset(dx, dy));
            }
        }
        cells
    }

    /// World-space bounds of the footprint.
    pub fn bounds(&self, anchor: CellCoord, tile_size: f32) -> Aabb {
        let min = anchor.min_corner(tile_size);
        Aabb::new(
            min,
            min + Vec2::new(
                self.width as f32 * tile_size,
                self.height as f32 * tile_size,
            ),
        )
    }
}

impl Default for FootprintSize {
    fn default() -> Self {
        Self::SINGLE
    }
}

/// Result of validating one footprint.
#[derive(Debug, Clone, PartialEq)]
pub struct FootprintReport {
    pub anchor: CellCoord,
    pub size: FootprintSize,
    pub cells: Vec<CellState>,
}

impl FootprintReport {
    pub fn is_placeable(&self) -> bool {
        self.cells.iter().all(|c| c.valid)
    }

    pub fn invalid_cells(&self) -> Vec<CellState> {
        self.cells.iter().filter(|c| !c.valid).copied().collect()
    }

    pub fn state_of(&self, cell: CellCoord) -> Option<&CellState> {
        self.cells.iter().find(|c| c.cell == cell)
    }
}

/// What the validator needs to know about the world.
pub trait FootprintEnvironment {
    /// Side length of a placement tile.
    fn tile_size(&self) -> f32;

    fn obstacles(&self) -> &dyn ObstacleQuery;

    /// Floor/elevation layer of the terrain at `cell`; `None` off the map.
    fn layer_at(&self, cell: CellCoord) -> Option<u8>;

    fn is_water(&self, cell: CellCoord) -> bool;

    /// A live instance without a collider (young sapling, open crate)
    /// already sits in `cell`.
    fn has_colliderless_occupant(&self, cell: CellCoord) -> bool;

    fn season(&self) -> Season;

    fn is_farmland(&self, cell: CellCoord) -> bool;

    /// Distance from `point` to the nearest tree or sapling, if any exist.
    fn nearest_tree_distance(&self, point: Vec2) -> Option<f32>;
}

/// Classify one cell for an agent standing on `agent_layer`.
pub fn check_cell<E: FootprintEnvironment + ?Sized>(
    env: &E,
    agent_layer: u8,
    cell: CellCoord,
) -> CellState {
    if env.layer_at(cell) != Some(agent_layer) {
        return CellState::invalid(cell, InvalidReason::LayerMismatch);
    }
    if cell_obstructed(env, cell) {
        return CellState::invalid(cell, InvalidReason::ObstaclePresent);
    }
    CellState::ok(cell)
}

fn cell_obstructed<E: FootprintEnvironment + ?Sized>(env: &E, cell: CellCoord) -> bool {
    if env.is_water(cell) {
        return true;
    }
    let area = cell.bounds(env.tile_size()).expand(-CELL_QUERY_INSET);
    let hit = env
        .obstacles()
        .overlap_box(area)
        .iter()
        .any(|c| matches!(c.kind, ColliderKind::Obstacle | ColliderKind::Water));
    hit || env.has_colliderless_occupant(cell)
}

/// Validate every cell of a footprint anchored (bottom-left) at `anchor`.
pub fn validate_footprint<E: FootprintEnvironment + ?Sized>(
    env: &E,
    agent_layer: u8,
    anchor: CellCoord,
    size: FootprintSize,
) -> FootprintReport {
    let cells = size
        .cells(anchor)
        .into_iter()
        .map(|cell| check_cell(env, agent_layer, cell))
        .collect();
    FootprintReport {
        anchor,
        size,
        cells,
    }
}

/// Sapling constraints: allowed seasons, spacing from other trees, and
/// whether tilled soil is off limits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SaplingRule {
    pub seasons: Vec<Season>,
    pub min_tree_distance: f32,
    #[serde(default = "default_true")]
    pub forbid_farmland: bool,
}

fn default_true() -> bool {
    true
}

impl Default for SaplingRule {
    fn default() -> Self {
        Self {
            seasons: vec![Season::Spring, Season::Summer, Season::Fall],
            min_tree_distance: 2.0,
            forbid_farmland: true,
        }
    }
}

/// Item-specific checks on top of footprint validity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlacementRule {
    Sapling(SaplingRule),
}

impl PlacementRule {
    /// Check the rule for a footprint whose cells are `cells` and whose
    /// center is `center`.
    pub fn check<E: FootprintEnvironment + ?Sized>(
        &self,
        env: &E,
        center: Vec2,
        cells: &[CellCoord],
    ) -> Result<(), InvalidReason> {
        match self {
            PlacementRule::Sapling(rule) => {
                if !rule.seasons.contains(&env.season()) {
                    return Err(InvalidReason::WrongSeason);
                }
                if rule.forbid_farmland && cells.iter().any(|c| env.is_farmland(*c)) {
                    return Err(InvalidReason::OnFarmland);
                }
                if let Some(distance) = env.nearest_tree_distance(center) {
                    if distance < rule.min_tree_distance {
                        return Err(InvalidReason::TooCloseToTree);
                    }
                }
                Ok(())
            }
        }
    }
}
