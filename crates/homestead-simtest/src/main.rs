//! Homestead Headless Simulation Harness
//!
//! Generates farms and drives the engine through navigation and placement
//! runs without any rendering or input layer.
//!
//! Usage:
//!   cargo run -p homestead-simtest
//!   cargo run -p homestead-simtest -- --verbose

use homestead_core::catalog::load_catalog;
use homestead_core::components::{Rock, Tree};
use homestead_core::engine::{EngineConfig, FarmEngine};
use homestead_core::generation::FarmConfig;
use homestead_core::persistence::{export_placed_json, parse_placed_json};
use homestead_core::physics::collider_id;
use homestead_logic::collision::{ObstacleFilter, ObstacleQuery};
use homestead_logic::events::{GameEvent, NavEvent, PlacementEvent};
use homestead_logic::footprint::{validate_footprint, InvalidReason, PlacementRule, Season};
use homestead_logic::geometry::{CellCoord, Vec2};
use homestead_logic::inventory::{Backpack, Inventory};
use homestead_logic::items::{ItemCatalog, ItemId, PlacementCapability};
use homestead_logic::placement::{PlacementError, PlacementState};
use homestead_logic::planner::PathPlanner;

// ── Item data (same JSON the game loads) ────────────────────────────────
const ITEMS_JSON: &str = include_str!("../../../data/items.json");

const DT: f32 = 1.0 / 30.0;
const SEEDS: [u64; 4] = [1, 7, 42, 1337];

// ── Test harness ────────────────────────────────────────────────────────

struct TestResult {
    name: String,
    passed: bool,
    detail: String,
}

fn main() {
    let verbose = std::env::args().any(|a| a == "--verbose");
    println!("=== Homestead Simulation Harness ===\n");

    let mut results = Vec::new();

    // 1. Item catalog validation
    let catalog = match load_catalog(ITEMS_JSON) {
        Ok(c) => c,
        Err(e) => {
            println!("  ✗ catalog_parse: JSON parse error: {}", e);
            std::process::exit(1);
        }
    };
    results.extend(validate_catalog(&catalog, verbose));

    // 2. Farm generation sweep
    results.extend(validate_generation(&catalog, verbose));

    // 3. Grid planning on generated farms
    results.extend(validate_pathfinding(&catalog, verbose));

    // 4. Walking the player around
    results.extend(validate_navigation(&catalog, verbose));

    // 5. Placement workflow
    results.extend(validate_placement(&catalog, verbose));

    // 6. Undo and save/load
    results.extend(validate_persistence(&catalog, verbose));

    // ── Summary ──
    println!();
    let passed = results.iter().filter(|r| r.passed).count();
    let failed = results.iter().filter(|r| !r.passed).count();
    let total = results.len();

    for r in &results {
        let icon = if r.passed { "✓" } else { "✗" };
        if !r.passed || verbose {
            println!("  {} {}: {}", icon, r.name, r.detail);
        }
    }

    println!(
        "\n=== RESULT: {}/{} passed, {} failed ===",
        passed, total, failed
    );

    if failed > 0 {
        std::process::exit(1);
    }
}

// ── Helpers ─────────────────────────────────────────────────────────────

fn new_engine(catalog: &ItemCatalog, seed: u64) -> FarmEngine {
    FarmEngine::generate(&FarmConfig::default(), seed, catalog.clone(), EngineConfig::default())
}

/// Put `count` of `item` in the backpack and select its slot.
fn hold(engine: &mut FarmEngine, item: ItemId, count: u32) -> bool {
    engine.backpack.add_item(item, 0, count);
    let slot = (0..engine.backpack.slot_count())
        .find(|&i| engine.backpack.slot(i).map(|s| s.item_id) == Some(item));
    match slot {
        Some(i) => engine.select_hotbar(Some(i)),
        None => false,
    }
}

/// Step until the follower goes idle or `max_seconds` pass. Returns the
/// events and whether the player ever overlapped a blocking collider.
fn run_until_idle(engine: &mut FarmEngine, max_seconds: f32) -> (Vec<GameEvent>, bool) {
    let mut events = Vec::new();
    let mut overlapped = false;
    for _ in 0..(max_seconds / DT) as usize {
        engine.update(DT);
        events.extend(engine.drain_events());
        overlapped |= player_overlaps(engine);
        if !engine.follower().is_following() {
            break;
        }
    }
    (events, overlapped)
}

fn player_overlaps(engine: &FarmEngine) -> bool {
    let (Some(player), Some(pos)) = (engine.player(), engine.player_position()) else {
        return false;
    };
    let filter = ObstacleFilter::new(Some(collider_id(player)), Some(0));
    let radius = engine.config().follower.agent_radius - 1e-3;
    engine
        .farm
        .colliders()
        .overlap_circle(pos, radius)
        .iter()
        .any(|c| filter.blocks(c))
}

fn reached(events: &[GameEvent]) -> bool {
    events
        .iter()
        .any(|e| matches!(e, GameEvent::Navigation(NavEvent::ReachedTarget { .. })))
}

fn placed(events: &[GameEvent]) -> usize {
    events
        .iter()
        .filter(|e| matches!(e, GameEvent::Placement(PlacementEvent::ItemPlaced { .. })))
        .count()
}

fn first_of(catalog: &ItemCatalog, capability: PlacementCapability) -> Option<ItemId> {
    let mut ids: Vec<ItemId> = catalog
        .iter()
        .filter(|d| d.capability() == capability)
        .map(|d| d.id)
        .collect();
    ids.sort();
    ids.first().copied()
}

// ── 1. Item Catalog ─────────────────────────────────────────────────────

fn validate_catalog(catalog: &ItemCatalog, verbose: bool) -> Vec<TestResult> {
    println!("--- Item Catalog ---");
    let mut results = Vec::new();

    results.push(TestResult {
        name: "catalog_not_empty".into(),
        passed: catalog.len() >= 10,
        detail: format!("{} item definitions loaded", catalog.len()),
    });

    // The catalog keeps the last definition per id, so duplicates shrink it
    let raw: Vec<serde_json::Value> = serde_json::from_str(ITEMS_JSON).unwrap_or_default();
    results.push(TestResult {
        name: "catalog_unique_ids".into(),
        passed: raw.len() == catalog.len(),
        detail: format!("{} entries in JSON, {} distinct ids", raw.len(), catalog.len()),
    });

    let placeable = catalog.iter().filter(|d| d.capability().can_place()).count();
    results.push(TestResult {
        name: "catalog_has_placeables".into(),
        passed: placeable > 0 && placeable < catalog.len(),
        detail: format!("{} of {} items can be placed", placeable, catalog.len()),
    });

    let bad_footprint: Vec<_> = catalog
        .iter()
        .filter(|d| d.footprint.width == 0 || d.footprint.height == 0 || d.footprint.width > 4)
        .map(|d| d.name.clone())
        .collect();
    results.push(TestResult {
        name: "catalog_footprints_sane".into(),
        passed: bad_footprint.is_empty(),
        detail: if bad_footprint.is_empty() {
            "all footprints between 1x1 and 4xN".into()
        } else {
            format!("bad footprints: {:?}", bad_footprint)
        },
    });

    // Saplings need a rule and must not block their own cell
    let bad_saplings: Vec<_> = catalog
        .iter()
        .filter(|d| d.capability() == PlacementCapability::Sapling)
        .filter(|d| !matches!(d.rule, Some(PlacementRule::Sapling(_))) || d.has_collider)
        .map(|d| d.name.clone())
        .collect();
    results.push(TestResult {
        name: "catalog_saplings_have_rules".into(),
        passed: bad_saplings.is_empty(),
        detail: if bad_saplings.is_empty() {
            "every sapling carries a sapling rule and no collider".into()
        } else {
            format!("saplings missing rule or with collider: {:?}", bad_saplings)
        },
    });

    // Single-stack items (tools) must land in separate slots
    let mut bag = Backpack::new(4, 99);
    bag.set_item_limits(catalog);
    let single: Vec<_> = catalog.iter().filter(|d| d.max_stack == 1).collect();
    let split = single.iter().all(|d| {
        let mut trial = bag.clone();
        trial.add_item(d.id, 0, 2) == 0 && trial.slot(1).map(|s| s.count) == Some(1)
    });
    results.push(TestResult {
        name: "catalog_stack_limits_applied".into(),
        passed: !single.is_empty() && split,
        detail: format!("{} single-stack items, none stack past 1", single.len()),
    });

    if verbose {
        for def in catalog.iter() {
            println!(
                "    {:>3} {:<16} {:?} {}x{}",
                def.id, def.name, def.kind, def.footprint.width, def.footprint.height
            );
        }
    }

    results
}

// ── 2. Farm Generation ──────────────────────────────────────────────────

fn validate_generation(catalog: &ItemCatalog, verbose: bool) -> Vec<TestResult> {
    println!("--- Farm Generation ---");
    let mut results = Vec::new();

    for seed in SEEDS {
        let mut engine = new_engine(catalog, seed);
        engine.update(DT);
        let rocks = engine.farm.world.query::<&Rock>().iter().count();
        let trees = engine.farm.world.query::<&Tree>().iter().count();
        let spawn = engine.player_position();
        let spawn_walkable = spawn.map_or(false, |p| engine.planner().is_walkable(p));

        results.push(TestResult {
            name: format!("generation_seed_{}", seed),
            passed: rocks > 0 && trees > 0 && spawn_walkable,
            detail: format!(
                "{} rocks, {} trees, {} walkable cells, spawn walkable: {}",
                rocks,
                trees,
                engine.planner().walkable_count(),
                spawn_walkable
            ),
        });
        if verbose {
            println!("    seed {} spawn {:?}", seed, spawn);
        }
    }

    let a = new_engine(catalog, 99);
    let b = new_engine(catalog, 99);
    let positions = |e: &FarmEngine| {
        let mut v: Vec<(i32, i32)> = e
            .farm
            .world
            .query::<(&homestead_core::components::Position, &Rock)>()
            .iter()
            .map(|(_, (p, _))| (p.pos.x as i32, p.pos.y as i32))
            .collect();
        v.sort();
        v
    };
    results.push(TestResult {
        name: "generation_deterministic".into(),
        passed: positions(&a) == positions(&b),
        detail: "same seed → same rocks".into(),
    });

    results
}

// ── 3. Pathfinding ──────────────────────────────────────────────────────

fn validate_pathfinding(catalog: &ItemCatalog, _verbose: bool) -> Vec<TestResult> {
    println!("--- Pathfinding ---");
    let mut results = Vec::new();

    let mut engine = new_engine(catalog, 42);
    engine.update(DT);
    let planner = engine.planner();
    let Some(start) = engine.player_position() else {
        results.push(TestResult {
            name: "pathfind_player".into(),
            passed: false,
            detail: "no player spawned".into(),
        });
        return results;
    };

    let grid = planner.config().clone();
    let mut attempts = 0;
    let mut found = 0;
    let mut bad_waypoints = 0;
    for y in (0..grid.height).step_by(7) {
        for x in (0..grid.width).step_by(9) {
            if !planner.is_cell_walkable(x, y) {
                continue;
            }
            attempts += 1;
            let goal = planner.cell_center(x, y);
            if let Some(path) = planner.try_find_path(start, goal) {
                found += 1;
                bad_waypoints += path.iter().filter(|p| !planner.is_walkable(**p)).count();
            }
        }
    }
    results.push(TestResult {
        name: "pathfind_sweep".into(),
        passed: attempts > 0 && found * 10 >= attempts * 8,
        detail: format!("{}/{} walkable goals reachable from spawn", found, attempts),
    });
    results.push(TestResult {
        name: "pathfind_waypoints_walkable".into(),
        passed: bad_waypoints == 0,
        detail: format!("{} waypoints on blocked cells", bad_waypoints),
    });

    let outside = planner.try_find_path(start, Vec2::new(-10.0, -10.0));
    results.push(TestResult {
        name: "pathfind_outside_grid".into(),
        passed: outside.is_none(),
        detail: "goal outside the grid → None".into(),
    });

    let rock = engine
        .farm
        .world
        .query::<(&homestead_core::components::Position, &Rock)>()
        .iter()
        .map(|(_, (p, _))| p.pos)
        .next();
    let substitute = rock.and_then(|r| planner.try_find_nearest_walkable(r));
    results.push(TestResult {
        name: "pathfind_nearest_walkable".into(),
        passed: matches!((rock, substitute), (Some(r), Some(s)) if !planner.is_walkable(r) && planner.is_walkable(s)),
        detail: format!("rock at {:?} → {:?}", rock, substitute),
    });

    results
}

// ── 4. Navigation ───────────────────────────────────────────────────────

fn validate_navigation(catalog: &ItemCatalog, verbose: bool) -> Vec<TestResult> {
    println!("--- Navigation ---");
    let mut results = Vec::new();

    for seed in SEEDS {
        let mut engine = new_engine(catalog, seed);
        engine.update(DT);
        let targets = [
            Vec2::new(5.5, 5.5),
            Vec2::new(40.5, 6.5),
            Vec2::new(10.5, 24.5),
            Vec2::new(30.5, 20.5),
            Vec2::new(24.5, 16.5),
        ];
        let mut arrived = 0;
        let mut overlaps = 0;
        for target in targets {
            engine.walk_to(target, false);
            let (events, overlapped) = run_until_idle(&mut engine, 40.0);
            if reached(&events) {
                arrived += 1;
            }
            if overlapped {
                overlaps += 1;
            }
            if verbose {
                println!(
                    "    seed {} → {:?}: ended at {:?}, reached {}",
                    seed,
                    target,
                    engine.player_position(),
                    reached(&events)
                );
            }
        }
        results.push(TestResult {
            name: format!("navigation_seed_{}", seed),
            passed: arrived >= targets.len() - 1 && overlaps == 0,
            detail: format!(
                "{}/{} walks arrived, {} with collider overlap",
                arrived,
                targets.len(),
                overlaps
            ),
        });
    }

    // Direct input interrupts a walk
    let mut engine = new_engine(catalog, 1);
    engine.update(DT);
    engine.walk_to(Vec2::new(5.5, 5.5), false);
    engine.update(DT);
    engine.set_direct_input(Vec2::RIGHT, false);
    results.push(TestResult {
        name: "navigation_direct_input_cancels".into(),
        passed: !engine.follower().is_following(),
        detail: "keyboard input cancels the click-to-walk".into(),
    });

    results
}

// ── 5. Placement ────────────────────────────────────────────────────────

fn validate_placement(catalog: &ItemCatalog, _verbose: bool) -> Vec<TestResult> {
    println!("--- Placement ---");
    let mut results = Vec::new();

    let Some(object) = first_of(catalog, PlacementCapability::Object)
        .or_else(|| first_of(catalog, PlacementCapability::Container))
    else {
        results.push(TestResult {
            name: "placement_object_available".into(),
            passed: false,
            detail: "catalog has no placeable object".into(),
        });
        return results;
    };

    // Within reach
    let mut engine = new_engine(catalog, 42);
    engine.update(DT);
    hold(&mut engine, object, 5);
    let Some(spawn) = engine.player_position() else {
        return results;
    };
    let entered = engine.enter_placement().is_ok();
    let near = engine.click(spawn + Vec2::new(1.0, 0.0));
    results.push(TestResult {
        name: "placement_within_reach".into(),
        passed: entered && near.is_ok() && engine.farm.placed_count() == 1,
        detail: format!("click next to player → {:?}, {} placed", near, engine.farm.placed_count()),
    });

    // Far away: first valid cell 6+ tiles to the left or right
    let size = catalog.get(object).map(|d| d.footprint).unwrap_or_default();
    let spawn_cell = CellCoord::from_world(spawn, 1.0);
    let far_cell = (6..12)
        .flat_map(|d| [spawn_cell.offset(-d, 0), spawn_cell.offset(d, 0)])
        .find(|&c| validate_footprint(&engine.farm, 0, c, size).is_placeable());
    if let Some(cell) = far_cell {
        let before = engine.backpack.count_of(object, 0);
        let clicked = engine.click(cell.center(1.0));
        let navigating = engine.placement().state() == PlacementState::Navigating;
        let (events, overlapped) = run_until_idle(&mut engine, 30.0);
        let after = engine.backpack.count_of(object, 0);
        results.push(TestResult {
            name: "placement_walk_then_commit".into(),
            passed: clicked.is_ok()
                && navigating
                && reached(&events)
                && placed(&events) == 1
                && after + 1 == before
                && !overlapped,
            detail: format!(
                "cell {:?}: navigating {}, placed {}, backpack {} → {}",
                cell,
                navigating,
                placed(&events),
                before,
                after
            ),
        });
    }

    // Rocks reject placement and leave the backpack alone
    let rock_cell = engine
        .farm
        .world
        .query::<(&homestead_core::components::Position, &Rock)>()
        .iter()
        .map(|(_, (p, _))| CellCoord::from_world(p.pos, 1.0))
        .next();
    if let Some(cell) = rock_cell {
        let before = engine.backpack.count_of(object, 0);
        let result = engine.click(cell.center(1.0));
        results.push(TestResult {
            name: "placement_rejects_rock".into(),
            passed: matches!(result, Err(PlacementError::FootprintInvalid(_)))
                && engine.backpack.count_of(object, 0) == before,
            detail: format!("click on rock {:?} → {:?}", cell, result.map_err(|e| e.to_string())),
        });
    }

    // Saplings respect seasons
    if let Some(sapling) = first_of(catalog, PlacementCapability::Sapling) {
        let mut engine = new_engine(catalog, 42);
        engine.update(DT);
        engine.set_season(Season::Winter);
        hold(&mut engine, sapling, 1);
        let _ = engine.enter_placement();
        let winter = engine.click(spawn + Vec2::new(1.0, 0.0));
        engine.set_season(Season::Spring);
        let spring = engine.click(spawn + Vec2::new(1.0, 0.0));
        results.push(TestResult {
            name: "placement_sapling_seasons".into(),
            passed: winter == Err(PlacementError::RuleFailed(InvalidReason::WrongSeason))
                && spring.is_ok(),
            detail: format!("winter → {:?}, spring → {:?}", winter, spring),
        });
    }

    results
}

// ── 6. Undo & Persistence ───────────────────────────────────────────────

fn validate_persistence(catalog: &ItemCatalog, _verbose: bool) -> Vec<TestResult> {
    println!("--- Undo & Persistence ---");
    let mut results = Vec::new();

    let Some(object) = first_of(catalog, PlacementCapability::Object) else {
        return results;
    };
    let mut engine = new_engine(catalog, 7);
    engine.update(DT);
    hold(&mut engine, object, 3);
    let Some(spawn) = engine.player_position() else {
        return results;
    };
    let _ = engine.enter_placement();
    let first = engine.click(spawn + Vec2::new(1.0, 0.0));
    let second = engine.click(spawn + Vec2::new(-1.0, 0.0));
    let undone = engine.undo();
    results.push(TestResult {
        name: "undo_returns_item".into(),
        passed: first.is_ok()
            && second.is_ok()
            && undone.is_ok()
            && engine.farm.placed_count() == 1
            && engine.backpack.count_of(object, 0) == 2,
        detail: format!(
            "{} placed, {} in backpack after undo",
            engine.farm.placed_count(),
            engine.backpack.count_of(object, 0)
        ),
    });

    let mut bytes = Vec::new();
    let saved = engine.save(&mut bytes);
    let mut restored = new_engine(catalog, 1);
    let loaded = restored.load(bytes.as_slice());
    results.push(TestResult {
        name: "save_load_roundtrip".into(),
        passed: saved.is_ok()
            && loaded.is_ok()
            && restored.farm.placed_count() == engine.farm.placed_count()
            && restored.backpack.count_of(object, 0) == 2
            && restored.player_position() == engine.player_position(),
        detail: format!("{} bytes, {} placed after load", bytes.len(), restored.farm.placed_count()),
    });

    let json = export_placed_json(&restored.farm.world);
    let parsed = json.as_ref().ok().and_then(|j| parse_placed_json(j).ok());
    results.push(TestResult {
        name: "placed_json_export".into(),
        passed: parsed.as_ref().map(|p| p.len()) == Some(1),
        detail: format!("{:?} records", parsed.map(|p| p.len())),
    });

    results
}
