//! Item catalog loading from JSON data files.

use homestead_logic::items::{ItemCatalog, ItemDef};

/// Parse a JSON array of item definitions.
pub fn load_catalog(json: &str) -> Result<ItemCatalog, serde_json::Error> {
    let defs: Vec<ItemDef> = serde_json::from_str(json)?;
    log::debug!("loaded {} item definitions", defs.len());
    Ok(ItemCatalog::from_defs(defs))
}
