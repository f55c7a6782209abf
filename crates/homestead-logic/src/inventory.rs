//! Inventory contract and the slot-based backpack implementation.
//!
//! Every mutation appends to a change log instead of invoking callbacks.
//! Whoever owns the backpack drains the log and forwards it, so the order
//! in which listeners see changes is always the order they happened.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::items::{ItemCatalog, ItemId};

/// A stack of identical items in one slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemStack {
    pub item_id: ItemId,
    pub quality: u8,
    pub count: u32,
}

impl ItemStack {
    pub fn new(item_id: ItemId, quality: u8, count: u32) -> Self {
        Self {
            item_id,
            quality,
            count,
        }
    }

    pub fn same_item(&self, other: &ItemStack) -> bool {
        self.item_id == other.item_id && self.quality == other.quality
    }
}

/// Something observable happened to the inventory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InventoryChange {
    /// Contents of this slot index changed.
    Slot(usize),
    /// The hotbar selection changed.
    Selection(Option<usize>),
}

/// Inventory surface used by placement. All mutations go through here so
/// snapshots observe ground truth.
pub trait Inventory {
    fn slot_count(&self) -> usize;

    /// Contents of a slot; `None` when empty or out of range.
    fn slot(&self, index: usize) -> Option<ItemStack>;

    /// Remove `count` items from a slot. Fails without side effects when the
    /// slot holds fewer.
    fn remove_from_slot(&mut self, index: usize, count: u32) -> bool;

    /// Merge into existing stacks, then fill empty slots. Returns how many
    /// items did not fit.
    fn add_item(&mut self, item_id: ItemId, quality: u8, count: u32) -> u32;

    /// How many more of this item would fit.
    fn room_for(&self, item_id: ItemId, quality: u8) -> u32;

    fn selected_slot(&self) -> Option<usize>;

    /// Drain pending change notifications, oldest first.
    fn take_changes(&mut self) -> Vec<InventoryChange>;

    fn selected_stack(&self) -> Option<ItemStack> {
        self.selected_slot().and_then(|i| self.slot(i))
    }
}

/// Fixed-size slot inventory with a hotbar selection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Backpack {
    slots: Vec<Option<ItemStack>>,
    selected: Option<usize>,
    stack_limit: u32,
    /// Per-item caps below `stack_limit`, taken from the catalog.
    #[serde(skip)]
    item_limits: HashMap<ItemId, u32>,
    #[serde(skip)]
    changes: Vec<InventoryChange>,
}

impl Backpack {
    pub fn new(slot_count: usize, stack_limit: u32) -> Self {
        Self {
            slots: vec![None; slot_count],
            selected: None,
            stack_limit: stack_limit.max(1),
            item_limits: HashMap::new(),
            changes: Vec::new(),
        }
    }

    /// Cap stacks at each item's `max_stack`. Not persisted; reapply after loading.
    pub fn set_item_limits(&mut self, catalog: &ItemCatalog) {
        self.item_limits = catalog
            .iter()
            .map(|def| (def.id, def.max_stack.max(1)))
            .collect();
    }

    /// Largest stack of `item_id` a slot may hold.
    pub fn stack_limit_for(&self, item_id: ItemId) -> u32 {
        self.item_limits
            .get(&item_id)
            .map_or(self.stack_limit, |&limit| limit.min(self.stack_limit))
    }

    /// Select a hotbar slot (or clear the selection). Out-of-range indices
    /// are ignored.
    pub fn select(&mut self, index: Option<usize>) -> bool {
        if let Some(i) = index {
            if i >= self.slots.len() {
                return false;
            }
        }
        if self.selected != index {
            self.selected = index;
            self.changes.push(InventoryChange::Selection(index));
        }
        true
    }

    /// Overwrite a slot directly (trading, chests, debug tools).
    pub fn set_slot(&mut self, index: usize, stack: Option<ItemStack>) -> bool {
        match self.slots.get_mut(index) {
            Some(slot) => {
                *slot = stack.filter(|s| s.count > 0);
                self.changes.push(InventoryChange::Slot(index));
                true
            }
            None => false,
        }
    }

    pub fn count_of(&self, item_id: ItemId, quality: u8) -> u32 {
        self.slots
            .iter()
            .flatten()
            .filter(|s| s.item_id == item_id && s.quality == quality)
            .map(|s| s.count)
            .sum()
    }

    pub fn has_pending_changes(&self) -> bool {
        !self.changes.is_empty()
    }
}

impl Inventory for Backpack {
    fn slot_count(&self) -> usize {
        self.slots.len()
    }

    fn slot(&self, index: usize) -> Option<ItemStack> {
        self.slots.get(index).copied().flatten()
    }

    fn remove_from_slot(&mut self, index: usize, count: u32) -> bool {
        let Some(slot) = self.slots.get_mut(index) else {
            return false;
        };
        let Some(stack) = slot.as_mut() else {
            return false;
        };
        if stack.count < count {
            return false;
        }
        stack.count -= count;
        if stack.count == 0 {
            *slot = None;
        }
        self.changes.push(InventoryChange::Slot(index));
        true
    }

    fn add_item(&mut self, item_id: ItemId, quality: u8, count: u32) -> u32 {
        let mut remaining = count;
        let limit = self.stack_limit_for(item_id);

        for (i, slot) in self.slots.iter_mut().enumerate() {
            if remaining == 0 {
                break;
            }
            if let Some(stack) = slot {
                if stack.item_id == item_id && stack.quality == quality && stack.count < limit {
                    let moved = remaining.min(limit - stack.count);
                    stack.count += moved;
                    remaining -= moved;
                    self.changes.push(InventoryChange::Slot(i));
                }
            }
        }

        for (i, slot) in self.slots.iter_mut().enumerate() {
            if remaining == 0 {
                break;
            }
            if slot.is_none() {
                let moved = remaining.min(limit);
                *slot = Some(ItemStack::new(item_id, quality, moved));
                remaining -= moved;
                self.changes.push(InventoryChange::Slot(i));
            }
        }

        remaining
    }

    fn room_for(&self, item_id: ItemId, quality: u8) -> u32 {
        let limit = self.stack_limit_for(item_id);
        self.slots
            .iter()
            .map(|slot| match slot {
                None => limit,
                Some(s) if s.item_id == item_id && s.quality == quality => limit.saturating_sub(s.count),
                Some(_) => 0,
            })
            .sum()
    }

    fn selected_slot(&self) -> Option<usize> {
        self.selected
    }

    fn take_changes(&mut self) -> Vec<InventoryChange> {
        std::mem::take(&mut self.changes)
    }
}
