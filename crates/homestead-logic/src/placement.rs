//! Placement workflow: preview, lock, walk over, commit.
//!
//! State machine:
//!
//! ```text
//! Idle ──enter──▶ Preview ──click (valid)──▶ Locked ──in reach──▶ commit
//!                   ▲                          │
//!                   │                          └──too far──▶ Navigating ──arrived──▶ commit
//!                   └──── interrupt (snapshot stale, cancel, invalid click,
//!                          hotbar change, navigation failed) ◀─────┘
//! ```
//!
//! A commit either loops back to Preview (same item still in the slot) or
//! exits to Idle. The `executing` flag is set for the duration of a commit
//! so the commit's own inventory deduction cannot interrupt it.

use std::collections::VecDeque;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::events::{CancelReason, InstanceId, InterruptReason, NavEvent, PlacementEvent};
use crate::feedback::{EffectKind, FeedbackEffects};
use crate::follower::{AgentBody, PathFollower};
use crate::footprint::{
    validate_footprint, CellState, FootprintEnvironment, FootprintReport, FootprintSize,
    InvalidReason,
};
use crate::geometry::{Aabb, CellCoord, Vec2};
use crate::inventory::{Inventory, InventoryChange};
use crate::items::{ItemCatalog, ItemDef, ItemId, ItemKind, PlacementCapability};

/// Tunables for the placement workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlacementConfig {
    /// Agent within this distance of the footprint bounds commits without walking.
    pub arrival_distance: f32,
    /// Whether the agent runs to the placement target.
    pub run_to_target: bool,
    /// Undo history depth; oldest entries are dropped first.
    pub history_capacity: usize,
    pub invalid_flash_duration: f32,
    pub shake_duration: f32,
}

impl Default for PlacementConfig {
    fn default() -> Self {
        Self {
            arrival_distance: 1.0,
            run_to_target: false,
            history_capacity: 10,
            invalid_flash_duration: 0.35,
            shake_duration: 0.2,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementState {
    Idle,
    Preview,
    Locked,
    Navigating,
}

/// Why a placement operation did not go through.
#[derive(Debug, Clone, PartialEq)]
pub enum PlacementError {
    /// Not in placement mode.
    NotActive,
    /// Operation not allowed while a placement is locked in.
    Busy,
    NoSelection,
    UnknownItem(ItemId),
    NotPlaceable(ItemKind),
    FootprintInvalid(Vec<CellState>),
    RuleFailed(InvalidReason),
    /// The locked slot no longer holds the snapshotted item.
    InvalidSnapshot,
    SpawnFailed,
    DeductionFailed,
    NothingToUndo,
    /// No backpack room to take the item back.
    InventoryFull,
}

impl fmt::Display for PlacementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PlacementError::NotActive => write!(f, "placement mode is not active"),
            PlacementError::Busy => write!(f, "a placement is already in progress"),
            PlacementError::NoSelection => write!(f, "no item selected"),
            PlacementError::UnknownItem(id) => write!(f, "unknown item id {}", id),
            PlacementError::NotPlaceable(kind) => write!(f, "{:?} items cannot be placed", kind),
            PlacementError::FootprintInvalid(cells) => {
                write!(f, "footprint blocked ({} invalid cells)", cells.len())
            }
            PlacementError::RuleFailed(reason) => write!(f, "placement rule failed: {:?}", reason),
            PlacementError::InvalidSnapshot => write!(f, "inventory changed since the placement was locked"),
            PlacementError::SpawnFailed => write!(f, "failed to spawn placed object"),
            PlacementError::DeductionFailed => write!(f, "failed to remove item from inventory"),
            PlacementError::NothingToUndo => write!(f, "nothing to undo"),
            PlacementError::InventoryFull => write!(f, "no room in the backpack"),
        }
    }
}

impl std::error::Error for PlacementError {}

/// Handles returned by the world for a freshly placed object.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpawnedInstance {
    pub instance: InstanceId,
    /// Growth/behaviour controller for saplings and similar; `None` for inert objects.
    pub controller: Option<InstanceId>,
}

/// World surface the workflow mutates.
pub trait PlacementWorld: FootprintEnvironment {
    /// Instantiate `def` so that its origin sits at `anchor`. `footprint` is
    /// the world-space area the object will cover.
    fn spawn_placed(&mut self, def: &ItemDef, anchor: Vec2, footprint: Aabb) -> Option<SpawnedInstance>;

    /// Remove a placed object. Returns false if it no longer exists.
    fn despawn_placed(&mut self, instance: InstanceId) -> bool;

    /// Put the object on the agent's floor/render layer.
    fn sync_layer(&mut self, instance: InstanceId, layer: u8);
}

/// Collaborators for one placement call.
pub struct PlacementCtx<'a> {
    pub inventory: &'a mut dyn Inventory,
    pub world: &'a mut dyn PlacementWorld,
    pub follower: &'a mut PathFollower,
    pub catalog: &'a ItemCatalog,
    pub agent: AgentBody,
}

/// The item currently being previewed, resolved once on selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ActiveItem {
    pub item_id: ItemId,
    pub quality: u8,
    pub slot: usize,
    pub capability: PlacementCapability,
    pub footprint: FootprintSize,
}

/// Immutable capture of what was committed to at lock time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlacementSnapshot {
    item_id: ItemId,
    quality: u8,
    slot: usize,
    position: Vec2,
    cell: CellCoord,
    size: FootprintSize,
}

impl PlacementSnapshot {
    /// Capture from the selected slot. Fails when nothing is selected or the
    /// selection no longer holds the active item.
    pub fn capture(
        inventory: &dyn Inventory,
        active: &ActiveItem,
        cell: CellCoord,
        position: Vec2,
    ) -> Option<Self> {
        let slot = inventory.selected_slot()?;
        let stack = inventory.slot(slot)?;
        if stack.item_id != active.item_id || stack.quality != active.quality || stack.count == 0 {
            return None;
        }
        Some(Self {
            item_id: stack.item_id,
            quality: stack.quality,
            slot,
            position,
            cell,
            size: active.footprint,
        })
    }

    pub fn item_id(&self) -> ItemId {
        self.item_id
    }

    pub fn quality(&self) -> u8 {
        self.quality
    }

    pub fn slot(&self) -> usize {
        self.slot
    }

    /// Center of the locked footprint in world space.
    pub fn position(&self) -> Vec2 {
        self.position
    }

    /// Bottom-left cell of the locked footprint.
    pub fn cell(&self) -> CellCoord {
        self.cell
    }

    pub fn size(&self) -> FootprintSize {
        self.size
    }

    /// Still backed by a non-empty slot holding the same item and quality.
    pub fn is_valid(&self, inventory: &dyn Inventory) -> bool {
        inventory
            .slot(self.slot)
            .map(|s| s.item_id == self.item_id && s.quality == self.quality && s.count > 0)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacementHistoryEntry {
    pub instance: InstanceId,
    pub item_id: ItemId,
    pub quality: u8,
    pub undoable: bool,
}

/// Bounded ring of recent placements, newest last.
#[derive(Debug, Clone)]
pub struct PlacementHistory {
    entries: VecDeque<PlacementHistoryEntry>,
    capacity: usize,
}

impl PlacementHistory {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity: capacity.max(1),
        }
    }

    pub fn push(&mut self, entry: PlacementHistoryEntry) {
        if self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Pop the newest entry if it may be undone.
    pub fn pop_undoable(&mut self) -> Option<PlacementHistoryEntry> {
        match self.entries.back() {
            Some(entry) if entry.undoable => self.entries.pop_back(),
            _ => None,
        }
    }

    /// Freeze an entry (e.g. the sapling started growing).
    pub fn mark_permanent(&mut self, instance: InstanceId) -> bool {
        match self.entries.iter_mut().find(|e| e.instance == instance) {
            Some(entry) => {
                entry.undoable = false;
                true
            }
            None => false,
        }
    }

    pub fn newest(&self) -> Option<&PlacementHistoryEntry> {
        self.entries.back()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PlacementHistoryEntry> {
        self.entries.iter()
    }
}

/// Where to spawn an object so its collider-bounds center lands on the
/// footprint center.
pub fn spawn_anchor(footprint: Aabb, pivot_offset: Vec2) -> Vec2 {
    footprint.center() - pivot_offset
}

/// Where the agent walks to before committing: `standoff` outside the
/// footprint on the side facing the agent, so the spawned object does not
/// land on top of it.
pub fn approach_point(footprint: Aabb, from: Vec2, standoff: f32) -> Vec2 {
    let edge = footprint.closest_point(from);
    edge + (from - edge).normalize() * standoff
}

/// Bottom-left cell of a footprint centered (rounding down) on the cell under `point`.
pub fn anchor_for_pointer(point: Vec2, size: FootprintSize, tile_size: f32) -> CellCoord {
    CellCoord::from_world(point, tile_size).offset(
        -((size.width as i32 - 1) / 2),
        -((size.height as i32 - 1) / 2),
    )
}

/// Drives placement for one agent.
pub struct PlacementManager {
    config: PlacementConfig,
    state: PlacementState,
    active: Option<ActiveItem>,
    pointer_anchor: Option<CellCoord>,
    preview: Option<FootprintReport>,
    snapshot: Option<PlacementSnapshot>,
    history: PlacementHistory,
    executing: bool,
    effects: FeedbackEffects,
    events: Vec<PlacementEvent>,
}

impl PlacementManager {
    pub fn new(config: PlacementConfig) -> Self {
        let history = PlacementHistory::new(config.history_capacity);
        Self {
            config,
            state: PlacementState::Idle,
            active: None,
            pointer_anchor: None,
            preview: None,
            snapshot: None,
            history,
            executing: false,
            effects: FeedbackEffects::new(),
            events: Vec::new(),
        }
    }

    pub fn config(&self) -> &PlacementConfig {
        &self.config
    }

    pub fn state(&self) -> PlacementState {
        self.state
    }

    pub fn is_active(&self) -> bool {
        self.state != PlacementState::Idle
    }

    pub fn active_item(&self) -> Option<&ActiveItem> {
        self.active.as_ref()
    }

    pub fn snapshot(&self) -> Option<&PlacementSnapshot> {
        self.snapshot.as_ref()
    }

    /// Validation of the footprint under the pointer (or the locked one).
    pub fn preview(&self) -> Option<&FootprintReport> {
        self.preview.as_ref()
    }

    pub fn history(&self) -> &PlacementHistory {
        &self.history
    }

    pub fn history_mut(&mut self) -> &mut PlacementHistory {
        &mut self.history
    }

    pub fn effects(&self) -> &FeedbackEffects {
        &self.effects
    }

    pub fn is_executing(&self) -> bool {
        self.executing
    }

    pub fn drain_events(&mut self) -> Vec<PlacementEvent> {
        std::mem::take(&mut self.events)
    }

    /// Enter placement mode with the selected item, or switch the previewed
    /// item when already previewing.
    pub fn enter(&mut self, ctx: &mut PlacementCtx<'_>) -> Result<(), PlacementError> {
        if matches!(self.state, PlacementState::Locked | PlacementState::Navigating) {
            return Err(PlacementError::Busy);
        }
        let active = resolve_selected(&*ctx.inventory, ctx.catalog)?;
        let was_idle = self.state == PlacementState::Idle;
        self.active = Some(active);
        self.state = PlacementState::Preview;
        self.refresh_preview(ctx);
        if was_idle {
            log::debug!("placement mode on (item {})", active.item_id);
            self.events.push(PlacementEvent::ModeChanged(true));
        }
        Ok(())
    }

    /// Leave placement mode from any state, cancelling navigation.
    pub fn exit(&mut self, ctx: &mut PlacementCtx<'_>) -> bool {
        if self.state == PlacementState::Idle {
            return false;
        }
        if matches!(self.state, PlacementState::Locked | PlacementState::Navigating)
            && ctx.follower.is_following()
        {
            ctx.follower.cancel();
        }
        self.state = PlacementState::Idle;
        self.active = None;
        self.snapshot = None;
        self.preview = None;
        self.pointer_anchor = None;
        log::debug!("placement mode off");
        self.events.push(PlacementEvent::ModeChanged(false));
        true
    }

    /// Track the pointer. Only moves the preview while unlocked.
    pub fn update_pointer(&mut self, point: Vec2, ctx: &PlacementCtx<'_>) {
        if self.state != PlacementState::Preview {
            return;
        }
        let Some(active) = self.active else {
            return;
        };
        let anchor = anchor_for_pointer(point, active.footprint, ctx.world.tile_size());
        if self.pointer_anchor != Some(anchor) || self.preview.is_none() {
            self.pointer_anchor = Some(anchor);
            self.refresh_preview(ctx);
        }
    }

    /// Left click at `point`.
    pub fn click(&mut self, point: Vec2, ctx: &mut PlacementCtx<'_>) -> Result<(), PlacementError> {
        match self.state {
            PlacementState::Idle => Err(PlacementError::NotActive),
            PlacementState::Locked => Err(PlacementError::Busy),
            PlacementState::Preview => {
                self.update_pointer(point, ctx);
                self.try_lock(ctx)
            }
            PlacementState::Navigating => {
                let active = self.active.ok_or(PlacementError::NotActive)?;
                let anchor = anchor_for_pointer(point, active.footprint, ctx.world.tile_size());
                let report = validate_footprint(&*ctx.world, ctx.agent.layer, anchor, active.footprint);
                if !report.is_placeable() {
                    let cells = report.invalid_cells();
                    self.start_flash();
                    self.interrupt(InterruptReason::InvalidClick, ctx);
                    return Err(PlacementError::FootprintInvalid(cells));
                }
                // Re-target: drop the current lock and lock again at the new cell.
                self.unlock(ctx);
                self.pointer_anchor = Some(anchor);
                self.preview = Some(report);
                self.try_lock(ctx)
            }
        }
    }

    /// Right click / escape.
    pub fn cancel(&mut self, ctx: &mut PlacementCtx<'_>) {
        match self.state {
            PlacementState::Locked | PlacementState::Navigating => {
                self.interrupt(InterruptReason::Cancelled, ctx)
            }
            PlacementState::Preview => {
                self.exit(ctx);
            }
            PlacementState::Idle => {}
        }
    }

    /// React to a navigation outcome for the agent this manager drives.
    pub fn handle_nav_event(
        &mut self,
        event: &NavEvent,
        ctx: &mut PlacementCtx<'_>,
    ) -> Result<(), PlacementError> {
        if self.state != PlacementState::Navigating {
            return Ok(());
        }
        match event {
            NavEvent::ReachedTarget { .. } => {
                self.state = PlacementState::Locked;
                self.commit(ctx)
            }
            // Our own interrupts cancel with `Requested`; those are already handled.
            NavEvent::NavigationCancelled {
                reason: CancelReason::Requested,
            } => Ok(()),
            NavEvent::NavigationCancelled { reason } => {
                log::debug!("placement navigation failed: {:?}", reason);
                self.interrupt(InterruptReason::NavigationFailed, ctx);
                Ok(())
            }
        }
    }

    /// Forward inventory notifications. Ignored while a commit is running.
    pub fn handle_inventory_changes(&mut self, changes: &[InventoryChange], ctx: &mut PlacementCtx<'_>) {
        if changes.is_empty() {
            return;
        }
        if self.executing {
            log::debug!("ignoring {} inventory changes during commit", changes.len());
            return;
        }
        for change in changes {
            match *change {
                InventoryChange::Selection(_) => self.on_hotbar_changed(ctx),
                InventoryChange::Slot(index) => self.on_slot_changed(index, ctx),
            }
        }
    }

    /// Revert the newest undoable placement. Nothing changes when the
    /// backpack has no room for the returned item.
    pub fn undo(&mut self, ctx: &mut PlacementCtx<'_>) -> Result<InstanceId, PlacementError> {
        let entry = self
            .history
            .pop_undoable()
            .ok_or(PlacementError::NothingToUndo)?;
        if ctx.inventory.room_for(entry.item_id, entry.quality) == 0 {
            log::debug!("undo: no room to return item {}", entry.item_id);
            self.history.push(entry);
            return Err(PlacementError::InventoryFull);
        }
        if !ctx.world.despawn_placed(entry.instance) {
            log::warn!("undo: placed instance {} was already gone", entry.instance);
        }
        ctx.inventory.add_item(entry.item_id, entry.quality, 1);
        log::info!("undid placement of item {} (instance {})", entry.item_id, entry.instance);
        self.events.push(PlacementEvent::Undone {
            instance: entry.instance,
            item_id: entry.item_id,
        });
        Ok(entry.instance)
    }

    /// Advance feedback effects.
    pub fn tick(&mut self, dt: f32) {
        self.effects.tick(dt);
    }

    fn try_lock(&mut self, ctx: &mut PlacementCtx<'_>) -> Result<(), PlacementError> {
        let active = self.active.ok_or(PlacementError::NotActive)?;
        let anchor = self.pointer_anchor.ok_or(PlacementError::NotActive)?;
        let report = validate_footprint(&*ctx.world, ctx.agent.layer, anchor, active.footprint);
        let placeable = report.is_placeable();
        let invalid = report.invalid_cells();
        self.preview = Some(report);
        if !placeable {
            self.reject(invalid.clone());
            return Err(PlacementError::FootprintInvalid(invalid));
        }

        let bounds = active.footprint.bounds(anchor, ctx.world.tile_size());
        let cells = active.footprint.cells(anchor);
        if let Some(rule) = ctx.catalog.get(active.item_id).and_then(|d| d.rule.as_ref()) {
            if let Err(reason) = rule.check(&*ctx.world, bounds.center(), &cells) {
                let flagged = cells
                    .into_iter()
                    .map(|cell| CellState::invalid(cell, reason))
                    .collect();
                self.reject(flagged);
                return Err(PlacementError::RuleFailed(reason));
            }
        }

        let Some(snapshot) =
            PlacementSnapshot::capture(&*ctx.inventory, &active, anchor, bounds.center())
        else {
            self.interrupt(InterruptReason::SnapshotInvalidated, ctx);
            return Err(PlacementError::InvalidSnapshot);
        };
        self.snapshot = Some(snapshot);
        self.state = PlacementState::Locked;

        let position = ctx.agent.position();
        if bounds.distance_to(position) <= self.config.arrival_distance {
            return self.commit(ctx);
        }
        let approach = approach_point(bounds, position, self.config.arrival_distance * 0.5);
        ctx.follower.set_destination(approach, self.config.run_to_target);
        self.state = PlacementState::Navigating;
        log::debug!(
            "walking to place item {} at ({:.2}, {:.2})",
            snapshot.item_id(),
            approach.x,
            approach.y
        );
        Ok(())
    }

    fn commit(&mut self, ctx: &mut PlacementCtx<'_>) -> Result<(), PlacementError> {
        // Changes queued before the commit are not ours to ignore.
        let pending = ctx.inventory.take_changes();
        self.handle_inventory_changes(&pending, ctx);
        if self.state != PlacementState::Locked {
            return Err(PlacementError::InvalidSnapshot);
        }

        let snapshot = match self.snapshot {
            Some(s) if s.is_valid(&*ctx.inventory) => s,
            _ => {
                self.interrupt(InterruptReason::SnapshotInvalidated, ctx);
                return Err(PlacementError::InvalidSnapshot);
            }
        };

        let bounds = snapshot.size().bounds(snapshot.cell(), ctx.world.tile_size());
        // Owned copy: listeners may drop the live item reference during deduction.
        let def = match ctx.catalog.get(snapshot.item_id()) {
            Some(def) => def.clone(),
            None => {
                self.interrupt(InterruptReason::CommitFailed, ctx);
                return Err(PlacementError::UnknownItem(snapshot.item_id()));
            }
        };

        if let Some(rule) = &def.rule {
            let cells = snapshot.size().cells(snapshot.cell());
            if let Err(reason) = rule.check(&*ctx.world, bounds.center(), &cells) {
                self.start_flash();
                self.interrupt(InterruptReason::RuleFailed(reason), ctx);
                return Err(PlacementError::RuleFailed(reason));
            }
        }

        let anchor = spawn_anchor(bounds, def.pivot_offset);
        let Some(spawned) = ctx.world.spawn_placed(&def, anchor, bounds) else {
            self.interrupt(InterruptReason::CommitFailed, ctx);
            return Err(PlacementError::SpawnFailed);
        };
        ctx.world.sync_layer(spawned.instance, ctx.agent.layer);

        self.executing = true;
        let deducted = ctx.inventory.remove_from_slot(snapshot.slot(), 1);
        let changes = ctx.inventory.take_changes();
        self.handle_inventory_changes(&changes, ctx);
        self.executing = false;

        if !deducted {
            ctx.world.despawn_placed(spawned.instance);
            self.interrupt(InterruptReason::CommitFailed, ctx);
            return Err(PlacementError::DeductionFailed);
        }

        self.history.push(PlacementHistoryEntry {
            instance: spawned.instance,
            item_id: def.id,
            quality: snapshot.quality(),
            undoable: true,
        });
        log::info!(
            "placed {} at ({:.2}, {:.2}) as instance {}",
            def.name,
            snapshot.position().x,
            snapshot.position().y,
            spawned.instance
        );
        self.events.push(PlacementEvent::ItemPlaced {
            position: snapshot.position(),
            item_id: def.id,
            name: def.name.clone(),
            instance: spawned.instance,
            kind: def.kind,
        });
        if def.capability() == PlacementCapability::Sapling {
            self.events.push(PlacementEvent::SaplingPlanted {
                position: snapshot.position(),
                item_id: def.id,
                instance: spawned.instance,
                controller: spawned.controller.unwrap_or(spawned.instance),
            });
        }

        self.snapshot = None;
        if snapshot.is_valid(&*ctx.inventory) {
            self.state = PlacementState::Preview;
            self.refresh_preview(ctx);
        } else {
            self.exit(ctx);
        }
        Ok(())
    }

    /// Back to Preview: navigation cancelled, snapshot cleared, preview unlocked.
    fn interrupt(&mut self, reason: InterruptReason, ctx: &mut PlacementCtx<'_>) {
        if self.state == PlacementState::Idle {
            return;
        }
        self.unlock(ctx);
        log::debug!("placement interrupted: {:?}", reason);
        self.events.push(PlacementEvent::Interrupted { reason });
    }

    fn unlock(&mut self, ctx: &mut PlacementCtx<'_>) {
        if ctx.follower.is_following() {
            ctx.follower.cancel();
        }
        self.snapshot = None;
        self.state = PlacementState::Preview;
    }

    fn on_hotbar_changed(&mut self, ctx: &mut PlacementCtx<'_>) {
        match self.state {
            PlacementState::Idle => {}
            PlacementState::Locked | PlacementState::Navigating => {
                self.interrupt(InterruptReason::HotbarChanged, ctx);
                match resolve_selected(&*ctx.inventory, ctx.catalog) {
                    Ok(active) => {
                        self.active = Some(active);
                        self.refresh_preview(ctx);
                    }
                    Err(_) => {
                        self.exit(ctx);
                    }
                }
            }
            PlacementState::Preview => match resolve_selected(&*ctx.inventory, ctx.catalog) {
                Ok(active) => {
                    self.active = Some(active);
                    self.refresh_preview(ctx);
                }
                Err(_) => {
                    self.exit(ctx);
                }
            },
        }
    }

    fn on_slot_changed(&mut self, index: usize, ctx: &mut PlacementCtx<'_>) {
        match self.state {
            PlacementState::Idle => {}
            PlacementState::Locked | PlacementState::Navigating => {
                let stale = self
                    .snapshot
                    .map(|s| s.slot() == index && !s.is_valid(&*ctx.inventory))
                    .unwrap_or(false);
                if stale {
                    self.interrupt(InterruptReason::SnapshotInvalidated, ctx);
                }
            }
            PlacementState::Preview => {
                if self.active.map(|a| a.slot) != Some(index) {
                    return;
                }
                match resolve_selected(&*ctx.inventory, ctx.catalog) {
                    Ok(active) => {
                        self.active = Some(active);
                        self.refresh_preview(ctx);
                    }
                    Err(_) => {
                        self.exit(ctx);
                    }
                }
            }
        }
    }

    fn refresh_preview(&mut self, ctx: &PlacementCtx<'_>) {
        self.preview = match (self.active, self.pointer_anchor) {
            (Some(active), Some(anchor)) => Some(validate_footprint(
                &*ctx.world,
                ctx.agent.layer,
                anchor,
                active.footprint,
            )),
            _ => None,
        };
    }

    fn reject(&mut self, cells: Vec<CellState>) {
        log::debug!("placement rejected: {} invalid cells", cells.len());
        self.start_flash();
        self.events.push(PlacementEvent::PlacementRejected { cells });
    }

    fn start_flash(&mut self) {
        self.effects
            .start(EffectKind::InvalidFlash, self.config.invalid_flash_duration);
        self.effects.start(EffectKind::Shake, self.config.shake_duration);
    }
}

fn resolve_selected(inventory: &dyn Inventory, catalog: &ItemCatalog) -> Result<ActiveItem, PlacementError> {
    let slot = inventory.selected_slot().ok_or(PlacementError::NoSelection)?;
    let stack = inventory.slot(slot).ok_or(PlacementError::NoSelection)?;
    let def = catalog
        .get(stack.item_id)
        .ok_or(PlacementError::UnknownItem(stack.item_id))?;
    let capability = def.capability();
    if !capability.can_place() {
        return Err(PlacementError::NotPlaceable(def.kind));
    }
    Ok(ActiveItem {
        item_id: def.id,
        quality: stack.quality,
        slot,
        capability,
        footprint: def.footprint,
    })
}
