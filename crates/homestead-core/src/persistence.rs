//! Save/Load functionality for persisting the farm
//!
//! Uses bincode for the full save (terrain, backpack, every entity).
//! Components are serialized individually then reconstructed on load, so
//! entity handles change across a reload. Placed objects keep their
//! `stable_id`, which is also the key of the JSON export.

use std::collections::BTreeMap;
use std::io::{Read, Write};

use hecs::{EntityBuilder, World};
use homestead_logic::footprint::{FootprintSize, Season};
use homestead_logic::geometry::{CellCoord, Vec2};
use homestead_logic::inventory::Backpack;
use homestead_logic::items::ItemId;
use serde::{Deserialize, Serialize};

use crate::components::*;
use crate::farm::FarmState;
use crate::terrain::Terrain;

/// Version number for save file format (increment when format changes)
const SAVE_VERSION: u32 = 1;

/// Serializable snapshot of the farm
#[derive(Serialize, Deserialize)]
pub struct SaveData {
    /// Save format version
    pub version: u32,
    /// Simulation time in seconds
    pub sim_time: f64,
    pub season: Season,
    pub terrain: Terrain,
    pub backpack: Backpack,
    /// All entities with their components
    pub entities: Vec<SerializableEntity>,
}

/// All possible components for an entity, serialized as optionals
#[derive(Serialize, Deserialize, Default)]
pub struct SerializableEntity {
    // Core
    pub position: Option<Position>,
    pub body: Option<Body>,
    pub name: Option<Name>,

    // Agents
    pub player: Option<Player>,
    pub agent: Option<Agent>,
    pub facing: Option<Facing>,

    // Placed objects
    pub placed: Option<Placed>,
    pub sapling: Option<Sapling>,
    pub growth_controller: Option<GrowthController>,

    // Natural features
    pub tree: Option<Tree>,
    pub rock: Option<Rock>,
    pub collectible: Option<Collectible>,
}

/// Extract all entities from a world into serializable form
fn serialize_entities(world: &World) -> Vec<SerializableEntity> {
    let mut entities = Vec::new();

    for entity_ref in world.iter() {
        let mut se = SerializableEntity::default();

        if let Some(c) = entity_ref.get::<&Position>() {
            se.position = Some(*c);
        }
        if let Some(c) = entity_ref.get::<&Body>() {
            se.body = Some(*c);
        }
        if let Some(c) = entity_ref.get::<&Name>() {
            se.name = Some((*c).clone());
        }
        if let Some(c) = entity_ref.get::<&Player>() {
            se.player = Some(*c);
        }
        if let Some(c) = entity_ref.get::<&Agent>() {
            se.agent = Some(*c);
        }
        if let Some(c) = entity_ref.get::<&Facing>() {
            se.facing = Some(*c);
        }
        if let Some(c) = entity_ref.get::<&Placed>() {
            se.placed = Some(*c);
        }
        if let Some(c) = entity_ref.get::<&Sapling>() {
            se.sapling = Some(*c);
        }
        if let Some(c) = entity_ref.get::<&GrowthController>() {
            se.growth_controller = Some(*c);
        }
        if let Some(c) = entity_ref.get::<&Tree>() {
            se.tree = Some(*c);
        }
        if let Some(c) = entity_ref.get::<&Rock>() {
            se.rock = Some(*c);
        }
        if let Some(c) = entity_ref.get::<&Collectible>() {
            se.collectible = Some(*c);
        }

        entities.push(se);
    }

    entities
}

/// Spawn an entity with all its components
fn spawn_entity(world: &mut World, se: SerializableEntity) {
    let mut builder = EntityBuilder::new();

    if let Some(c) = se.position {
        builder.add(c);
    }
    if let Some(c) = se.body {
        builder.add(c);
    }
    if let Some(c) = se.name {
        builder.add(c);
    }
    if let Some(c) = se.player {
        builder.add(c);
    }
    if let Some(c) = se.agent {
        // Movement input is transient; agents come back standing still
        builder.add_bundle((c, MoveInput::default()));
    }
    if let Some(c) = se.facing {
        builder.add(c);
    }
    if let Some(c) = se.placed {
        builder.add(c);
    }
    if let Some(c) = se.sapling {
        builder.add(c);
    }
    if let Some(c) = se.growth_controller {
        builder.add(c);
    }
    if let Some(c) = se.tree {
        builder.add(c);
    }
    if let Some(c) = se.rock {
        builder.add(c);
    }
    if let Some(c) = se.collectible {
        builder.add(c);
    }

    world.spawn(builder.build());
}

/// Save the farm and backpack to a writer
pub fn save_farm<W: Write>(writer: W, farm: &FarmState, backpack: &Backpack) -> Result<(), SaveError> {
    let save_data = SaveData {
        version: SAVE_VERSION,
        sim_time: farm.sim_time,
        season: farm.season,
        terrain: farm.terrain.clone(),
        backpack: backpack.clone(),
        entities: serialize_entities(&farm.world),
    };

    bincode::serialize_into(writer, &save_data)?;
    Ok(())
}

/// Result of loading a farm
pub struct LoadedFarm {
    pub farm: FarmState,
    pub backpack: Backpack,
}

/// Load a farm from a reader
pub fn load_farm<R: Read>(reader: R) -> Result<LoadedFarm, SaveError> {
    let save_data: SaveData = bincode::deserialize_from(reader)?;

    if save_data.version != SAVE_VERSION {
        return Err(SaveError::VersionMismatch {
            expected: SAVE_VERSION,
            found: save_data.version,
        });
    }

    let mut world = World::new();
    for se in save_data.entities {
        spawn_entity(&mut world, se);
    }

    let mut farm = FarmState::new(world, save_data.terrain);
    farm.sim_time = save_data.sim_time;
    farm.season = save_data.season;

    Ok(LoadedFarm {
        farm,
        backpack: save_data.backpack,
    })
}

/// One placed object in the JSON export
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlacedRecord {
    pub item_id: ItemId,
    pub cell: CellCoord,
    pub size: FootprintSize,
    pub position: Vec2,
    pub layer: u8,
    #[serde(default)]
    pub sapling_stage: Option<u8>,
}

/// Placed objects keyed by stable id, ordered for diffable output
pub fn placed_records(world: &World) -> BTreeMap<u64, PlacedRecord> {
    world
        .query::<(&Placed, &Position, Option<&Sapling>)>()
        .iter()
        .map(|(_, (placed, pos, sapling))| {
            (
                placed.stable_id,
                PlacedRecord {
                    item_id: placed.item_id,
                    cell: placed.cell,
                    size: placed.size,
                    position: pos.pos,
                    layer: pos.layer,
                    sapling_stage: sapling.map(|s| s.stage),
                },
            )
        })
        .collect()
}

/// Export placed objects as pretty JSON
pub fn export_placed_json(world: &World) -> Result<String, SaveError> {
    Ok(serde_json::to_string_pretty(&placed_records(world))?)
}

/// Parse a JSON export back into records
pub fn parse_placed_json(json: &str) -> Result<BTreeMap<u64, PlacedRecord>, SaveError> {
    Ok(serde_json::from_str(json)?)
}

/// Errors that can occur during save/load
#[derive(Debug)]
pub enum SaveError {
    Io(std::io::Error),
    Bincode(Box<bincode::ErrorKind>),
    Json(serde_json::Error),
    VersionMismatch { expected: u32, found: u32 },
}

impl From<std::io::Error> for SaveError {
    fn from(e: std::io::Error) -> Self {
        SaveError::Io(e)
    }
}

impl From<Box<bincode::ErrorKind>> for SaveError {
    fn from(e: Box<bincode::ErrorKind>) -> Self {
        SaveError::Bincode(e)
    }
}

impl From<serde_json::Error> for SaveError {
    fn from(e: serde_json::Error) -> Self {
        SaveError::Json(e)
    }
}

impl std::fmt::Display for SaveError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveError::Io(e) => write!(f, "IO error: {}", e),
            SaveError::Bincode(e) => write!(f, "Serialization error: {}", e),
            SaveError::Json(e) => write!(f, "JSON error: {}", e),
            SaveError::VersionMismatch { expected, found } => {
                write!(
                    f,
                    "Save version mismatch: expected {}, found {}",
                    expected, found
                )
            }
        }
    }
}

impl std::error::Error for SaveError {}

#[cfg(test)]
mod tests {
    use super::*;
    use homestead_logic::collision::ColliderKind;
    use homestead_logic::inventory::Inventory;

    fn sample_farm() -> (FarmState, Backpack) {
        let mut world = World::new();
        world.spawn((
            Position::new(2.5, 2.5),
            Body::rect(1.0, 1.0, ColliderKind::Obstacle),
            Placed {
                stable_id: 7,
                item_id: 3,
                cell: CellCoord::new(2, 2),
                size: FootprintSize::SINGLE,
            },
            Name::new("Chest"),
        ));
        world.spawn((Position::new(5.0, 5.0), Agent::default(), Player, Facing::default()));
        let mut farm = FarmState::new(world, Terrain::new(8, 8, 1.0));
        farm.sim_time = 42.5;
        farm.season = Season::Fall;
        let mut backpack = Backpack::new(4, 99);
        backpack.add_item(3, 0, 5);
        (farm, backpack)
    }

    #[test]
    fn test_save_load_roundtrip() {
        let (farm, backpack) = sample_farm();

        let mut save_buffer = Vec::new();
        save_farm(&mut save_buffer, &farm, &backpack).expect("Save failed");

        let loaded = load_farm(&save_buffer[..]).expect("Load failed");
        assert!((loaded.farm.sim_time - 42.5).abs() < 1e-9);
        assert_eq!(loaded.farm.season, Season::Fall);
        assert_eq!(loaded.farm.placed_count(), 1);
        assert!(loaded.farm.find_placed(7).is_some());
        assert_eq!(loaded.farm.next_stable_id(), 8);
        assert_eq!(loaded.backpack.count_of(3, 0), 5);
        // Solid placed object comes back as a collider
        assert_eq!(loaded.farm.colliders().len(), 1);
        assert_eq!(loaded.farm.world.query::<(&Player, &MoveInput)>().iter().count(), 1);
    }

    #[test]
    fn test_version_mismatch() {
        let data = SaveData {
            version: SAVE_VERSION + 1,
            sim_time: 0.0,
            season: Season::Spring,
            terrain: Terrain::new(2, 2, 1.0),
            backpack: Backpack::new(1, 99),
            entities: Vec::new(),
        };
        let bytes = bincode::serialize(&data).unwrap();
        match load_farm(&bytes[..]) {
            Err(SaveError::VersionMismatch { expected, found }) => {
                assert_eq!(expected, SAVE_VERSION);
                assert_eq!(found, SAVE_VERSION + 1);
            }
            _ => panic!("expected version mismatch"),
        }
    }

    #[test]
    fn test_json_export_keyed_by_stable_id() {
        let (farm, _) = sample_farm();
        let json = export_placed_json(&farm.world).unwrap();
        let records = parse_placed_json(&json).unwrap();
        assert_eq!(records.len(), 1);
        let rec = &records[&7];
        assert_eq!(rec.item_id, 3);
        assert_eq!(rec.cell, CellCoord::new(2, 2));
        assert_eq!(rec.sapling_stage, None);
    }
}
