//! Item definitions and the catalog they are looked up in.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::footprint::{FootprintSize, PlacementRule};
use crate::geometry::Vec2;

pub type ItemId = u32;

/// Closed classification of items.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ItemKind {
    /// Planted through the farming workflow, never placed.
    Seed,
    /// Furniture, fences, decorations.
    Placeable,
    Sapling,
    Container,
    Tool,
    Material,
}

/// What the placement workflow may do with an item. Resolved once per
/// definition so the workflow never re-inspects the kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PlacementCapability {
    /// Handled by the farming subsystem.
    Plantable,
    Object,
    Sapling,
    Container,
    None,
}

impl PlacementCapability {
    pub fn can_place(self) -> bool {
        matches!(
            self,
            PlacementCapability::Object | PlacementCapability::Sapling | PlacementCapability::Container
        )
    }
}

impl ItemKind {
    pub fn capability(self) -> PlacementCapability {
        match self {
            ItemKind::Seed => PlacementCapability::Plantable,
            ItemKind::Placeable => PlacementCapability::Object,
            ItemKind::Sapling => PlacementCapability::Sapling,
            ItemKind::Container => PlacementCapability::Container,
            ItemKind::Tool | ItemKind::Material => PlacementCapability::None,
        }
    }
}

/// Static description of an item type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemDef {
    pub id: ItemId,
    pub name: String,
    pub kind: ItemKind,
    #[serde(default)]
    pub footprint: FootprintSize,
    /// Offset from the spawn anchor to the placed collider's bounds center.
    /// Non-zero for bottom-aligned assets.
    #[serde(default)]
    pub pivot_offset: Vec2,
    #[serde(default)]
    pub rule: Option<PlacementRule>,
    #[serde(default = "default_has_collider")]
    pub has_collider: bool,
    #[serde(default = "default_max_stack")]
    pub max_stack: u32,
}

fn default_has_collider() -> bool {
    true
}

fn default_max_stack() -> u32 {
    99
}

impl ItemDef {
    pub fn new(id: ItemId, name: impl Into<String>, kind: ItemKind) -> Self {
        Self {
            id,
            name: name.into(),
            kind,
            footprint: FootprintSize::SINGLE,
            pivot_offset: Vec2::ZERO,
            rule: None,
            has_collider: true,
            max_stack: default_max_stack(),
        }
    }

    pub fn with_footprint(mut self, width: u32, height: u32) -> Self {
        self.footprint = FootprintSize::new(width, height);
        self
    }

    pub fn with_pivot_offset(mut self, offset: Vec2) -> Self {
        self.pivot_offset = offset;
        self
    }

    pub fn with_rule(mut self, rule: PlacementRule) -> Self {
        self.rule = Some(rule);
        self
    }

    pub fn without_collider(mut self) -> Self {
        self.has_collider = false;
        self
    }

    pub fn capability(&self) -> PlacementCapability {
        self.kind.capability()
    }
}

/// All item definitions, keyed by id.
#[derive(Debug, Clone, Default)]
pub struct ItemCatalog {
    items: HashMap<ItemId, ItemDef>,
}

impl ItemCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later definitions with a duplicate id replace earlier ones.
    pub fn from_defs(defs: impl IntoIterator<Item = ItemDef>) -> Self {
        let mut catalog = Self::new();
        for def in defs {
            catalog.insert(def);
        }
        catalog
    }

    pub fn insert(&mut self, def: ItemDef) {
        if let Some(old) = self.items.insert(def.id, def) {
            log::debug!("item {} ({}) redefined", old.id, old.name);
        }
    }

    pub fn get(&self, id: ItemId) -> Option<&ItemDef> {
        self.items.get(&id)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ItemDef> {
        self.items.values()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::footprint::SaplingRule;

    #[test]
    fn capability_per_kind() {
        assert_eq!(ItemKind::Seed.capability(), PlacementCapability::Plantable);
        assert!(!ItemKind::Seed.capability().can_place());
        assert!(ItemKind::Placeable.capability().can_place());
        assert!(ItemKind::Sapling.capability().can_place());
        assert!(ItemKind::Container.capability().can_place());
        assert!(!ItemKind::Tool.capability().can_place());
    }

    #[test]
    fn defs_deserialize_with_defaults() {
        let json = r#"[
            {"id": 1, "name": "Fence", "kind": "Placeable"},
            {"id": 2, "name": "Oak Sapling", "kind": "Sapling",
             "footprint": {"width": 1, "height": 1},
             "rule": {"Sapling": {"seasons": ["Spring"], "min_tree_distance": 2.5}},
             "has_collider": false}
        ]"#;
        let defs: Vec<ItemDef> = serde_json::from_str(json).unwrap();
        let catalog = ItemCatalog::from_defs(defs);
        assert_eq!(catalog.len(), 2);

        let fence = catalog.get(1).unwrap();
        assert_eq!(fence.footprint, FootprintSize::SINGLE);
        assert!(fence.has_collider);
        assert_eq!(fence.max_stack, 99);

        let sapling = catalog.get(2).unwrap();
        assert!(!sapling.has_collider);
        match &sapling.rule {
            Some(PlacementRule::Sapling(rule)) => {
                assert!(rule.forbid_farmland);
                assert_eq!(rule.min_tree_distance, 2.5);
            }
            other => panic!("unexpected rule {:?}", other),
        }
    }

    #[test]
    fn builder_sets_fields() {
        let def = ItemDef::new(7, "Chest", ItemKind::Container)
            .with_footprint(2, 1)
            .with_pivot_offset(Vec2::new(0.0, 0.25))
            .with_rule(PlacementRule::Sapling(SaplingRule::default()))
            .without_collider();
        assert_eq!(def.footprint, FootprintSize::new(2, 1));
        assert_eq!(def.pivot_offset.y, 0.25);
        assert!(!def.has_collider);
        assert!(def.rule.is_some());
    }
}
