//! Tile terrain: floor layer, water and tilled soil per cell.

use homestead_logic::collision::{Collider, ColliderKind, Shape};
use homestead_logic::geometry::{Aabb, CellCoord, Vec2};
use serde::{Deserialize, Serialize};

/// Collider ids at and above this value belong to terrain, not entities.
pub const TERRAIN_COLLIDER_BASE: u64 = 1 << 48;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq)]
pub struct Tile {
    pub layer: u8,
    pub water: bool,
    pub farmland: bool,
}

/// Rectangular tile map anchored at the world origin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Terrain {
    width: u32,
    height: u32,
    tile_size: f32,
    tiles: Vec<Tile>,
}

impl Terrain {
    pub fn new(width: u32, height: u32, tile_size: f32) -> Self {
        Self {
            width,
            height,
            tile_size,
            tiles: vec![Tile::default(); (width * height) as usize],
        }
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn tile_size(&self) -> f32 {
        self.tile_size
    }

    /// World-space extent of the map
    pub fn bounds(&self) -> Aabb {
        Aabb::new(
            Vec2::ZERO,
            Vec2::new(
                self.width as f32 * self.tile_size,
                self.height as f32 * self.tile_size,
            ),
        )
    }

    pub fn cell_at(&self, point: Vec2) -> CellCoord {
        CellCoord::from_world(point, self.tile_size)
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        if cell.x < 0 || cell.y < 0 || cell.x >= self.width as i32 || cell.y >= self.height as i32 {
            return None;
        }
        Some(cell.y as usize * self.width as usize + cell.x as usize)
    }

    pub fn tile(&self, cell: CellCoord) -> Option<&Tile> {
        self.index(cell).map(|i| &self.tiles[i])
    }

    pub fn tile_mut(&mut self, cell: CellCoord) -> Option<&mut Tile> {
        match self.index(cell) {
            Some(i) => Some(&mut self.tiles[i]),
            None => None,
        }
    }

    pub fn in_bounds(&self, cell: CellCoord) -> bool {
        self.index(cell).is_some()
    }

    pub fn layer_at(&self, cell: CellCoord) -> Option<u8> {
        self.tile(cell).map(|t| t.layer)
    }

    pub fn is_water(&self, cell: CellCoord) -> bool {
        self.tile(cell).map(|t| t.water).unwrap_or(false)
    }

    pub fn is_farmland(&self, cell: CellCoord) -> bool {
        self.tile(cell).map(|t| t.farmland).unwrap_or(false)
    }

    /// Fill a rectangle of cells, clipped to the map
    pub fn fill(&mut self, min: CellCoord, max: CellCoord, mut apply: impl FnMut(&mut Tile)) {
        for y in min.y..=max.y {
            for x in min.x..=max.x {
                if let Some(tile) = self.tile_mut(CellCoord::new(x, y)) {
                    apply(tile);
                }
            }
        }
    }

    pub fn water_cell_count(&self) -> usize {
        self.tiles.iter().filter(|t| t.water).count()
    }

    /// One water collider per water cell, for planners and overlap queries
    pub fn water_colliders(&self) -> Vec<Collider> {
        let mut colliders = Vec::new();
        for y in 0..self.height as i32 {
            for x in 0..self.width as i32 {
                let cell = CellCoord::new(x, y);
                let Some(i) = self.index(cell) else {
                    continue;
                };
                let tile = &self.tiles[i];
                if tile.water {
                    colliders.push(Collider {
                        id: TERRAIN_COLLIDER_BASE + i as u64,
                        shape: Shape::Box(cell.bounds(self.tile_size)),
                        kind: ColliderKind::Water,
                        layer: tile.layer,
                    });
                }
            }
        }
        colliders
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_out_of_bounds_is_none() {
        let t = Terrain::new(4, 3, 1.0);
        assert!(t.tile(CellCoord::new(-1, 0)).is_none());
        assert!(t.tile(CellCoord::new(4, 0)).is_none());
        assert_eq!(t.layer_at(CellCoord::new(3, 2)), Some(0));
        assert!(!t.is_water(CellCoord::new(10, 10)));
    }

    #[test]
    fn test_fill_and_water_colliders() {
        let mut t = Terrain::new(6, 6, 0.5);
        t.fill(CellCoord::new(1, 1), CellCoord::new(2, 2), |tile| tile.water = true);
        assert_eq!(t.water_cell_count(), 4);
        let colliders = t.water_colliders();
        assert_eq!(colliders.len(), 4);
        assert!(colliders.iter().all(|c| c.kind == ColliderKind::Water));
        assert!(colliders.iter().all(|c| c.id >= TERRAIN_COLLIDER_BASE));
        assert_eq!(t.bounds().max, Vec2::new(3.0, 3.0));
    }
}
