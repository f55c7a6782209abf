//! Farm engine - main entry point for running the farm
//!
//! `FarmEngine::update` is the scheduler. Each frame it runs, in order:
//! 1. Collider refresh (and planner rebuild when obstacles changed)
//! 2. Pending inventory notifications → placement
//! 3. Path follower tick → player `MoveInput`
//! 4. Movement system
//! 5. Navigation events → placement (may commit)
//! 6. Inventory notifications raised by the commit → placement
//! 7. Feedback effects
//!
//! Events from every component are collected in that order and handed
//! out by [`FarmEngine::drain_events`].

use hecs::{Entity, World};
use homestead_logic::collision::ObstacleFilter;
use homestead_logic::events::{GameEvent, InstanceId};
use homestead_logic::follower::{AgentBody, FollowerConfig, MovementCommand, NavWorld, PathFollower};
use homestead_logic::footprint::Season;
use homestead_logic::geometry::Vec2;
use homestead_logic::inventory::{Backpack, Inventory};
use homestead_logic::items::ItemCatalog;
use homestead_logic::placement::{PlacementConfig, PlacementCtx, PlacementError, PlacementManager};
use homestead_logic::planner::{GridConfig, GridPlanner, PathPlanner};
use rand::rngs::StdRng;
use rand::SeedableRng;
use serde::{Deserialize, Serialize};

use crate::components::*;
use crate::farm::FarmState;
use crate::generation::{generate_farm, FarmConfig};
use crate::physics::{collider_id, EntityLocator};
use crate::terrain::Terrain;

/// Engine tunables, loadable from JSON
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub follower: FollowerConfig,
    pub placement: PlacementConfig,
    /// Planner grid; origin and dimensions are derived from the terrain
    pub grid: GridConfig,
    pub backpack_slots: usize,
    pub stack_limit: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            follower: FollowerConfig::default(),
            placement: PlacementConfig::default(),
            grid: GridConfig::default(),
            backpack_slots: 12,
            stack_limit: 99,
        }
    }
}

impl EngineConfig {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

/// Main farm engine
pub struct FarmEngine {
    /// ECS world, terrain and collider snapshot
    pub farm: FarmState,
    pub backpack: Backpack,
    pub catalog: ItemCatalog,
    follower: PathFollower,
    placement: PlacementManager,
    planner: GridPlanner,
    player: Option<Entity>,
    config: EngineConfig,
    /// Keyboard-style input used while the follower is idle
    direct_input: MovementCommand,
    events: Vec<GameEvent>,
    time_scale: f32,
}

impl FarmEngine {
    /// Wrap an existing farm. The first entity tagged `Player` is driven.
    pub fn new(farm: FarmState, catalog: ItemCatalog, mut config: EngineConfig) -> Self {
        let player = find_player(&farm.world);
        if let Some(agent) = player.and_then(|p| farm.world.get::<&Agent>(p).ok().map(|a| *a)) {
            config.follower.agent_radius = agent.radius;
        }
        let planner = GridPlanner::new(grid_for(&farm.terrain, &config.grid));
        let mut backpack = Backpack::new(config.backpack_slots, config.stack_limit);
        backpack.set_item_limits(&catalog);
        Self {
            backpack,
            catalog,
            follower: PathFollower::new(config.follower.clone()),
            placement: PlacementManager::new(config.placement.clone()),
            planner,
            player,
            farm,
            config,
            direct_input: MovementCommand::default(),
            events: Vec::new(),
            time_scale: 1.0,
        }
    }

    /// Generate a farm from a seed
    pub fn generate(farm_config: &FarmConfig, seed: u64, catalog: ItemCatalog, config: EngineConfig) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut world = World::new();
        let layout = generate_farm(&mut world, farm_config, &mut rng);
        Self::new(FarmState::new(world, layout.terrain), catalog, config)
    }

    /// Update the farm by delta_seconds
    pub fn update(&mut self, delta_seconds: f32) {
        let dt = delta_seconds * self.time_scale;
        self.farm.sim_time += dt as f64;

        // Agents move every frame, so the snapshot is always rebuilt
        self.farm.refresh_colliders();
        if self.farm.take_obstacles_dirty() {
            self.rebuild_planner();
        }

        self.dispatch_inventory_changes();

        if let Some(player) = self.player {
            let agent = self.agent_body();
            let was_following = self.follower.is_following();
            let command = {
                let locator = EntityLocator {
                    world: &self.farm.world,
                };
                let nav = NavWorld {
                    planner: &self.planner,
                    obstacles: self.farm.colliders(),
                    targets: &locator,
                };
                self.follower.tick(dt, &agent, &nav)
            };
            let command = if was_following {
                command
            } else {
                self.direct_input
            };
            if let Ok(mut input) = self.farm.world.get::<&mut MoveInput>(player) {
                command.apply(&mut *input);
            }
        }

        self.farm.step_movement(dt);

        for event in self.follower.drain_events() {
            self.events.push(event.into());
            let result = self.with_placement(|pm, ctx| pm.handle_nav_event(&event, ctx));
            if let Err(e) = result {
                log::debug!("placement after {:?}: {}", event, e);
            }
            self.flush_placement_events();
        }

        self.dispatch_inventory_changes();
        self.placement.tick(dt);
    }

    // --- Input ---

    /// Left click: confirm placement when placement mode is on, else walk there.
    pub fn click(&mut self, point: Vec2) -> Result<(), PlacementError> {
        if !self.placement.is_active() {
            self.follower.set_destination(point, false);
            return Ok(());
        }
        let result = self.with_placement(|pm, ctx| pm.click(point, ctx));
        self.flush_placement_events();
        result
    }

    /// Right click / escape
    pub fn right_click(&mut self) {
        if self.placement.is_active() {
            self.with_placement(|pm, ctx| pm.cancel(ctx));
            self.flush_placement_events();
        } else {
            self.follower.cancel();
        }
    }

    pub fn pointer_moved(&mut self, point: Vec2) {
        self.with_placement(|pm, ctx| pm.update_pointer(point, ctx));
    }

    pub fn enter_placement(&mut self) -> Result<(), PlacementError> {
        let result = self.with_placement(|pm, ctx| pm.enter(ctx));
        self.flush_placement_events();
        result
    }

    pub fn exit_placement(&mut self) -> bool {
        let exited = self.with_placement(|pm, ctx| pm.exit(ctx));
        self.flush_placement_events();
        exited
    }

    /// Change the hotbar selection; placement reacts immediately.
    pub fn select_hotbar(&mut self, slot: Option<usize>) -> bool {
        let selected = self.backpack.select(slot);
        self.dispatch_inventory_changes();
        selected
    }

    pub fn undo(&mut self) -> Result<InstanceId, PlacementError> {
        let result = self.with_placement(|pm, ctx| pm.undo(ctx));
        self.flush_placement_events();
        // The returned item is a slot change like any other
        self.dispatch_inventory_changes();
        result
    }

    /// Walk to a point without placing anything
    pub fn walk_to(&mut self, point: Vec2, run: bool) -> bool {
        self.follower.set_destination(point, run)
    }

    /// Follow another entity until within `stop_radius` of it
    pub fn follow(&mut self, target: Entity, stop_radius: f32, run: bool) -> bool {
        self.follower.follow_target(collider_id(target), stop_radius, run)
    }

    /// Keyboard-style movement. A non-zero direction takes over from the
    /// follower and interrupts any placement walk.
    pub fn set_direct_input(&mut self, direction: Vec2, run: bool) {
        if !direction.is_zero() && self.follower.is_following() {
            if self.placement.snapshot().is_some() {
                self.with_placement(|pm, ctx| pm.cancel(ctx));
                self.flush_placement_events();
            } else {
                self.follower.cancel();
            }
            self.events
                .extend(self.follower.drain_events().into_iter().map(GameEvent::from));
        }
        let facing = homestead_logic::follower::facing_for(
            direction,
            self.config.follower.facing_vertical_bias,
        );
        self.direct_input = MovementCommand {
            direction,
            run,
            facing,
        };
    }

    pub fn set_season(&mut self, season: Season) {
        if self.farm.season != season {
            log::info!("season changed to {:?}", season);
            self.farm.season = season;
        }
    }

    // --- Queries ---

    pub fn drain_events(&mut self) -> Vec<GameEvent> {
        std::mem::take(&mut self.events)
    }

    pub fn player(&self) -> Option<Entity> {
        self.player
    }

    pub fn player_position(&self) -> Option<Vec2> {
        let player = self.player?;
        let pos = self.farm.world.get::<&Position>(player).ok()?;
        Some(pos.pos)
    }

    pub fn follower(&self) -> &PathFollower {
        &self.follower
    }

    pub fn placement(&self) -> &PlacementManager {
        &self.placement
    }

    pub fn planner(&self) -> &GridPlanner {
        &self.planner
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Simulation time in seconds
    pub fn sim_time(&self) -> f64 {
        self.farm.sim_time
    }

    /// Set time scale (1.0 = real-time, 2.0 = 2x speed, etc.)
    pub fn set_time_scale(&mut self, scale: f32) {
        self.time_scale = scale.max(0.0);
    }

    pub fn time_scale(&self) -> f32 {
        self.time_scale
    }

    /// Save farm state to a writer
    pub fn save<W: std::io::Write>(&self, writer: W) -> Result<(), crate::persistence::SaveError> {
        crate::persistence::save_farm(writer, &self.farm, &self.backpack)
    }

    /// Load farm state from a reader. Navigation, placement and undo
    /// history start fresh since they refer to entity handles.
    pub fn load<R: std::io::Read>(&mut self, reader: R) -> Result<(), crate::persistence::SaveError> {
        let loaded = crate::persistence::load_farm(reader)?;

        self.farm = loaded.farm;
        self.backpack = loaded.backpack;
        self.backpack.set_item_limits(&self.catalog);
        self.player = find_player(&self.farm.world);
        self.follower = PathFollower::new(self.config.follower.clone());
        self.placement = PlacementManager::new(self.config.placement.clone());
        self.planner = GridPlanner::new(grid_for(&self.farm.terrain, &self.config.grid));
        self.direct_input = MovementCommand::default();
        self.events.clear();

        Ok(())
    }

    // --- Internals ---

    fn agent_body(&self) -> AgentBody {
        self.player
            .and_then(|p| player_body(&self.farm.world, p))
            .unwrap_or_else(|| AgentBody::at(Vec2::ZERO))
    }

    fn with_placement<R>(
        &mut self,
        f: impl FnOnce(&mut PlacementManager, &mut PlacementCtx<'_>) -> R,
    ) -> R {
        let agent = self.agent_body();
        let mut ctx = PlacementCtx {
            inventory: &mut self.backpack,
            world: &mut self.farm,
            follower: &mut self.follower,
            catalog: &self.catalog,
            agent,
        };
        f(&mut self.placement, &mut ctx)
    }

    fn flush_placement_events(&mut self) {
        self.events
            .extend(self.placement.drain_events().into_iter().map(GameEvent::from));
    }

    fn dispatch_inventory_changes(&mut self) {
        let changes = self.backpack.take_changes();
        if changes.is_empty() {
            return;
        }
        self.with_placement(|pm, ctx| pm.handle_inventory_changes(&changes, ctx));
        self.flush_placement_events();
    }

    fn rebuild_planner(&mut self) {
        let agent = self.agent_body();
        let filter = ObstacleFilter::new(agent.collider, Some(agent.layer));
        self.planner
            .set_agent_radius(self.config.follower.inflation_radius());
        self.planner.rebuild(self.farm.colliders(), &filter);
        log::debug!(
            "planner rebuilt: {} walkable cells",
            self.planner.walkable_count()
        );
    }
}

fn find_player(world: &World) -> Option<Entity> {
    world.query::<&Player>().iter().map(|(e, _)| e).next()
}

fn player_body(world: &World, player: Entity) -> Option<AgentBody> {
    let pos = *world.get::<&Position>(player).ok()?;
    let center = world.get::<&Body>(player).ok().map(|b| b.center(pos.pos));
    Some(AgentBody {
        collider: Some(collider_id(player)),
        origin: pos.pos,
        collider_center: center,
        layer: pos.layer,
    })
}

/// Planner grid covering the whole terrain
fn grid_for(terrain: &Terrain, base: &GridConfig) -> GridConfig {
    let bounds = terrain.bounds();
    let cell_size = base.cell_size.max(0.05);
    GridConfig {
        origin: bounds.min,
        cell_size,
        width: (bounds.width() / cell_size).ceil().max(1.0) as u32,
        height: (bounds.height() / cell_size).ceil().max(1.0) as u32,
        ..base.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generation::spawn_player;
    use homestead_logic::events::{NavEvent, PlacementEvent};
    use homestead_logic::items::{ItemDef, ItemKind};
    use homestead_logic::placement::PlacementState;

    fn open_farm() -> FarmEngine {
        let mut world = World::new();
        spawn_player(&mut world, Vec2::new(2.5, 2.5));
        let farm = FarmState::new(world, Terrain::new(10, 10, 1.0));
        let catalog = ItemCatalog::from_defs(vec![ItemDef::new(5, "Chest", ItemKind::Container)]);
        FarmEngine::new(farm, catalog, EngineConfig::default())
    }

    #[test]
    fn test_engine_creation() {
        let engine = open_farm();
        assert!(engine.player().is_some());
        assert_eq!(engine.sim_time(), 0.0);
        assert_eq!(engine.planner().config().width, 20);
    }

    #[test]
    fn test_engine_generation() {
        let engine = FarmEngine::generate(
            &FarmConfig::default(),
            1,
            ItemCatalog::new(),
            EngineConfig::default(),
        );
        assert!(engine.player().is_some());
        assert!(engine.farm.world.query::<&Rock>().iter().count() > 0);
    }

    #[test]
    fn test_walk_to_point_arrives() {
        let mut engine = open_farm();
        assert!(engine.walk_to(Vec2::new(7.5, 2.5), false));
        for _ in 0..100 {
            engine.update(0.1);
        }
        let pos = engine.player_position().unwrap();
        assert!(pos.distance(Vec2::new(7.5, 2.5)) < 0.5, "ended at {:?}", pos);
        let events = engine.drain_events();
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::Navigation(NavEvent::ReachedTarget { .. }))));
        assert!(!engine.follower().is_following());
    }

    #[test]
    fn test_place_within_reach_commits_immediately() {
        let mut engine = open_farm();
        engine.backpack.add_item(5, 0, 3);
        engine.select_hotbar(Some(0));
        engine.update(0.1);
        engine.enter_placement().unwrap();
        engine.click(Vec2::new(3.5, 2.5)).unwrap();

        assert_eq!(engine.farm.placed_count(), 1);
        assert_eq!(engine.backpack.count_of(5, 0), 2);
        assert_eq!(engine.placement().state(), PlacementState::Preview);
        let events = engine.drain_events();
        assert!(events.contains(&GameEvent::Placement(PlacementEvent::ModeChanged(true))));
        assert!(events
            .iter()
            .any(|e| matches!(e, GameEvent::Placement(PlacementEvent::ItemPlaced { item_id: 5, .. }))));
    }

    #[test]
    fn test_direct_input_moves_player() {
        let mut engine = open_farm();
        engine.set_direct_input(Vec2::RIGHT, false);
        engine.update(0.5);
        let pos = engine.player_position().unwrap();
        assert!((pos.x - 4.0).abs() < 1e-4);
    }

    #[test]
    fn test_time_scale() {
        let mut engine = open_farm();
        engine.set_time_scale(2.0);
        engine.update(1.0);
        assert!((engine.sim_time() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_config_from_partial_json() {
        let config = EngineConfig::from_json(r#"{"backpack_slots": 24}"#).unwrap();
        assert_eq!(config.backpack_slots, 24);
        assert_eq!(config.stack_limit, 99);
    }

    #[test]
    fn backpack_follows_catalog_stack_limits() {
        let mut world = World::new();
        spawn_player(&mut world, Vec2::new(2.5, 2.5));
        let farm = FarmState::new(world, Terrain::new(10, 10, 1.0));
        let hoe = ItemDef {
            max_stack: 1,
            ..ItemDef::new(4, "Hoe", ItemKind::Tool)
        };
        let mut engine = FarmEngine::new(farm, ItemCatalog::from_defs(vec![hoe]), EngineConfig::default());
        assert_eq!(engine.backpack.add_item(4, 0, 2), 0);
        assert_eq!(engine.backpack.slot(0).map(|s| s.count), Some(1));
        assert_eq!(engine.backpack.slot(1).map(|s| s.count), Some(1));
    }
}
