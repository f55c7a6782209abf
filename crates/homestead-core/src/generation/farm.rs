//! Farm generation - terrain features, natural obstacles and the player

use std::collections::HashSet;

use hecs::{Entity, World};
use homestead_logic::collision::ColliderKind;
use homestead_logic::geometry::{CellCoord, Vec2};
use homestead_logic::items::ItemId;
use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::components::*;
use crate::terrain::Terrain;

/// Configuration for farm generation
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FarmConfig {
    /// Map width in tiles
    pub width: u32,
    /// Map height in tiles
    pub height: u32,
    /// World units per tile
    pub tile_size: f32,
    pub rocks: u32,
    pub trees: u32,
    /// Dropped items scattered on the ground
    pub collectibles: u32,
    /// Item id used for scattered collectibles
    pub collectible_item: ItemId,
    /// Side of the square pond in tiles (0 = no pond)
    pub pond_size: u32,
    /// Side of the tilled square in tiles (0 = none)
    pub farmland_size: u32,
    /// Width of the raised ledge along the top edge (layer 1), 0 = flat map
    pub ledge_rows: u32,
    /// No rocks or trees within this many tiles of the player spawn
    pub spawn_clearance: u32,
}

impl Default for FarmConfig {
    fn default() -> Self {
        Self {
            width: 48,
            height: 32,
            tile_size: 1.0,
            rocks: 40,
            trees: 25,
            collectibles: 10,
            collectible_item: 1,
            pond_size: 5,
            farmland_size: 6,
            ledge_rows: 3,
            spawn_clearance: 3,
        }
    }
}

/// What generation produced, besides the entities themselves
#[derive(Debug, Clone)]
pub struct FarmLayout {
    pub terrain: Terrain,
    pub player: Entity,
    pub spawn: Vec2,
    pub rocks: Vec<Entity>,
    pub trees: Vec<Entity>,
    pub collectibles: Vec<Entity>,
}

/// Generate terrain and populate the world
pub fn generate_farm(world: &mut World, config: &FarmConfig, rng: &mut impl Rng) -> FarmLayout {
    let width = config.width.max(4);
    let height = config.height.max(4);
    let tile = config.tile_size;
    let mut terrain = Terrain::new(width, height, tile);

    // Ledge along the top edge
    if config.ledge_rows > 0 {
        let rows = config.ledge_rows.min(height / 4) as i32;
        terrain.fill(
            CellCoord::new(0, height as i32 - rows),
            CellCoord::new(width as i32 - 1, height as i32 - 1),
            |t| t.layer = 1,
        );
    }

    let spawn_cell = CellCoord::new(width as i32 / 2, height as i32 / 2);
    let spawn = spawn_cell.center(tile);
    let clearance = config.spawn_clearance as i32;
    let near_spawn =
        |c: CellCoord| (c.x - spawn_cell.x).abs() <= clearance && (c.y - spawn_cell.y).abs() <= clearance;

    // Pond in the lower-left quadrant, farmland in the lower-right
    if config.pond_size > 0 {
        let size = config.pond_size as i32;
        let x = rng.gen_range(1..(width as i32 / 2 - size).max(2));
        let y = rng.gen_range(1..(height as i32 / 2 - size).max(2));
        terrain.fill(CellCoord::new(x, y), CellCoord::new(x + size - 1, y + size - 1), |t| {
            t.water = true
        });
    }
    if config.farmland_size > 0 {
        let size = config.farmland_size as i32;
        let lo = width as i32 / 2 + clearance + 1;
        let hi = (width as i32 - size - 1).max(lo + 1);
        let x = rng.gen_range(lo..hi);
        let y = rng.gen_range(1..(height as i32 / 2 - size).max(2));
        terrain.fill(CellCoord::new(x, y), CellCoord::new(x + size - 1, y + size - 1), |t| {
            t.farmland = true
        });
    }

    let mut occupied: HashSet<CellCoord> = HashSet::new();
    // Natural features stay on the ground layer, off water and tilled soil
    let mut pick_cell = |rng: &mut dyn rand::RngCore, terrain: &Terrain, keep_clear: bool| -> Option<CellCoord> {
        for _ in 0..64 {
            let c = CellCoord::new(
                rng.gen_range(0..width as i32),
                rng.gen_range(0..height as i32),
            );
            let Some(t) = terrain.tile(c) else {
                continue;
            };
            if t.layer != 0 || t.water || t.farmland || occupied.contains(&c) {
                continue;
            }
            if keep_clear && near_spawn(c) {
                continue;
            }
            occupied.insert(c);
            return Some(c);
        }
        None
    };

    let mut rocks = Vec::new();
    for _ in 0..config.rocks {
        let Some(cell) = pick_cell(&mut *rng, &terrain, true) else {
            break;
        };
        let center = cell.center(tile);
        rocks.push(world.spawn((
            Position::new(center.x, center.y),
            Body::rect(tile, tile, ColliderKind::Obstacle),
            Rock,
            Name::new("Rock"),
        )));
    }

    let mut trees = Vec::new();
    for _ in 0..config.trees {
        let Some(cell) = pick_cell(&mut *rng, &terrain, true) else {
            break;
        };
        let center = cell.center(tile);
        trees.push(world.spawn((
            Position::new(center.x, center.y),
            Body::circle(tile * 0.35, ColliderKind::Obstacle),
            Tree,
            Name::new("Tree"),
        )));
    }

    let mut collectibles = Vec::new();
    for _ in 0..config.collectibles {
        let Some(cell) = pick_cell(&mut *rng, &terrain, false) else {
            break;
        };
        let center = cell.center(tile);
        collectibles.push(world.spawn((
            Position::new(center.x, center.y),
            Body::circle(tile * 0.2, ColliderKind::Collectible),
            Collectible {
                item_id: config.collectible_item,
                quality: 0,
                count: 1,
            },
        )));
    }

    let player = spawn_player(world, spawn);

    log::info!(
        "generated {}x{} farm: {} rocks, {} trees, {} collectibles, {} water tiles",
        width,
        height,
        rocks.len(),
        trees.len(),
        collectibles.len(),
        terrain.water_cell_count()
    );

    FarmLayout {
        terrain,
        player,
        spawn,
        rocks,
        trees,
        collectibles,
    }
}

/// Spawn the player agent at `at` on layer 0
pub fn spawn_player(world: &mut World, at: Vec2) -> Entity {
    let agent = Agent::default();
    world.spawn((
        Position::new(at.x, at.y),
        Body::circle(agent.radius, ColliderKind::Agent),
        agent,
        MoveInput::default(),
        Facing::default(),
        Player,
        Name::new("Farmer"),
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn generate(seed: u64) -> (World, FarmLayout) {
        let mut world = World::new();
        let mut rng = StdRng::seed_from_u64(seed);
        let layout = generate_farm(&mut world, &FarmConfig::default(), &mut rng);
        (world, layout)
    }

    #[test]
    fn test_generation_counts() {
        let (world, layout) = generate(7);
        assert_eq!(world.query::<&Player>().iter().count(), 1);
        assert!(layout.rocks.len() > 30);
        assert!(layout.trees.len() > 15);
        assert_eq!(layout.terrain.water_cell_count(), 25);
    }

    #[test]
    fn test_spawn_is_clear() {
        let (world, layout) = generate(11);
        for (_, (pos, _)) in world.query::<(&Position, &Rock)>().iter() {
            assert!(pos.pos.distance(layout.spawn) > 3.0, "rock too close to spawn");
        }
        for (_, (pos, _)) in world.query::<(&Position, &Tree)>().iter() {
            assert!(pos.pos.distance(layout.spawn) > 3.0, "tree too close to spawn");
        }
        let spawn_cell = layout.terrain.cell_at(layout.spawn);
        assert!(!layout.terrain.is_water(spawn_cell));
    }

    #[test]
    fn test_same_seed_same_farm() {
        let (a, _) = generate(99);
        let (b, _) = generate(99);
        let rocks = |w: &World| {
            let mut v: Vec<(i32, i32)> = w
                .query::<(&Position, &Rock)>()
                .iter()
                .map(|(_, (p, _))| (p.pos.x as i32, p.pos.y as i32))
                .collect();
            v.sort();
            v
        };
        assert_eq!(rocks(&a), rocks(&b));
    }

    #[test]
    fn test_ledge_is_raised() {
        let (_, layout) = generate(3);
        let top = CellCoord::new(0, layout.terrain.height() as i32 - 1);
        assert_eq!(layout.terrain.layer_at(top), Some(1));
        assert_eq!(layout.terrain.layer_at(CellCoord::new(0, 0)), Some(0));
    }
}
