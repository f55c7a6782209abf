//! Domain events published by the navigation and placement components.
//!
//! Components push events into their own outbox in the order they happen;
//! the engine drains outboxes once per tick in a fixed order, so listeners
//! always observe the same sequence for the same inputs.

use serde::{Deserialize, Serialize};

use crate::footprint::{CellState, InvalidReason};
use crate::geometry::Vec2;
use crate::items::{ItemId, ItemKind};

/// Handle to a placed world instance (entity bits in the engine).
pub type InstanceId = u64;

/// Why a navigation request ended without reaching its target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CancelReason {
    /// `cancel()` was called by the owner.
    Requested,
    /// Stuck detection exhausted its retries.
    Stuck,
    /// The followed target no longer exists.
    TargetLost,
}

/// Path follower notifications.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum NavEvent {
    ReachedTarget { position: Vec2 },
    NavigationCancelled { reason: CancelReason },
}

/// Why an in-progress placement was sent back to preview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InterruptReason {
    /// The locked slot no longer holds the snapshotted item.
    SnapshotInvalidated,
    /// Right-click or explicit cancel.
    Cancelled,
    /// Clicked an invalid cell while walking to the target.
    InvalidClick,
    /// Hotbar selection changed.
    HotbarChanged,
    /// Navigation gave up before arriving.
    NavigationFailed,
    /// An item-specific rule failed at commit time.
    RuleFailed(InvalidReason),
    /// Spawning or inventory deduction failed at commit time.
    CommitFailed,
}

/// Placement workflow notifications.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum PlacementEvent {
    /// Entered (`true`) or left (`false`) placement mode.
    ModeChanged(bool),
    ItemPlaced {
        position: Vec2,
        item_id: ItemId,
        name: String,
        instance: InstanceId,
        kind: ItemKind,
    },
    SaplingPlanted {
        position: Vec2,
        item_id: ItemId,
        instance: InstanceId,
        controller: InstanceId,
    },
    /// Confirm refused because some footprint cells are invalid.
    PlacementRejected { cells: Vec<CellState> },
    Interrupted { reason: InterruptReason },
    Undone { instance: InstanceId, item_id: ItemId },
}

/// Everything the engine publishes in one tick, in dispatch order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum GameEvent {
    Navigation(NavEvent),
    Placement(PlacementEvent),
}

impl From<NavEvent> for GameEvent {
    fn from(e: NavEvent) -> Self {
        GameEvent::Navigation(e)
    }
}

impl From<PlacementEvent> for GameEvent {
    fn from(e: PlacementEvent) -> Self {
        GameEvent::Placement(e)
    }
}
