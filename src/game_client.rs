//! The game client contract (§6): an external collaborator whose concrete
//! implementation (the game protocol itself) is out of scope. This module
//! defines the trait the rest of the crate depends on, plus a deterministic
//! in-memory fake used by tests.

use async_trait::async_trait;

use crate::world::Position;

#[derive(Debug, Clone)]
pub struct RawBlock {
    pub name: String,
    pub position: Position,
}

#[derive(Debug, Clone)]
pub struct RawEntity {
    pub name: String,
    pub entity_type: String,
    pub position: Position,
    pub hostile: bool,
    pub health: Option<f64>,
}

#[derive(Debug, Clone)]
pub struct InventoryItem {
    pub name: String,
    pub count: u32,
    pub slot: u8,
}

#[derive(Debug, Clone, Default)]
pub struct MissingMaterials {
    pub items: Vec<(String, u32)>,
}

/// Capability bundle the rest of the crate depends on. Absent sub-capabilities
/// (pathfinding, auto-eat, PVP, collect-block, armor manager, best-tool-for-block)
/// degrade gracefully to no-op; this trait models only the operations the
/// control plane actually calls.
#[async_trait]
pub trait GameClient: Send + Sync {
    fn is_spawned(&self) -> bool;
    fn position(&self) -> Option<Position>;
    fn health(&self) -> f64;
    fn food(&self) -> f64;
    fn time_of_day(&self) -> i64;
    fn is_raining(&self) -> bool;
    fn dimension(&self) -> String;

    fn inventory_items(&self) -> Vec<InventoryItem>;

    /// Up to `count` matches of `matching` within `max_distance`, nearest-agnostic
    /// (the perceiver is responsible for sorting).
    async fn find_blocks(&self, matching: &str, max_distance: f64, count: usize) -> Vec<RawBlock>;
    async fn block_at(&self, position: Position) -> Option<RawBlock>;
    fn nearby_entities(&self, max_distance: f64) -> Vec<RawEntity>;

    async fn dig(&self, block: &RawBlock) -> Result<(), String>;
    async fn craft(&self, recipe: &str, count: u32, crafting_table: bool) -> Result<(), String>;
    fn can_craft(&self, recipe: &str, count: u32) -> bool;
    fn missing_materials(&self, recipe: &str, count: u32) -> MissingMaterials;

    async fn goto(&self, position: Position) -> Result<(), String>;
    async fn consume(&self) -> Result<(), String>;
    async fn equip(&self, item: &str, slot: &str) -> Result<(), String>;

    /// Releases the underlying connection. No-op by default; a connected
    /// implementation overrides this to close its socket cleanly.
    async fn disconnect(&self) {}
}

/// Deterministic in-memory fake for tests: a fixed position/health/food and a
/// scriptable set of nearby blocks/entities.
#[derive(Default)]
pub struct FakeGameClient {
    pub spawned: bool,
    pub position: Option<Position>,
    pub health: f64,
    pub food: f64,
    pub dimension: String,
    pub blocks: Vec<RawBlock>,
    pub entities: Vec<RawEntity>,
    pub inventory: Vec<InventoryItem>,
}

#[async_trait]
impl GameClient for FakeGameClient {
    fn is_spawned(&self) -> bool {
        self.spawned
    }
    fn position(&self) -> Option<Position> {
        self.position
    }
    fn health(&self) -> f64 {
        self.health
    }
    fn food(&self) -> f64 {
        self.food
    }
    fn time_of_day(&self) -> i64 {
        0
    }
    fn is_raining(&self) -> bool {
        false
    }
    fn dimension(&self) -> String {
        self.dimension.clone()
    }
    fn inventory_items(&self) -> Vec<InventoryItem> {
        self.inventory.clone()
    }
    async fn find_blocks(&self, matching: &str, max_distance: f64, count: usize) -> Vec<RawBlock> {
        let origin = self.position.unwrap_or(Position { x: 0.0, y: 0.0, z: 0.0 });
        self.blocks
            .iter()
            .filter(|b| b.name == matching)
            .filter(|b| distance(origin, b.position) <= max_distance)
            .take(count)
            .cloned()
            .collect()
    }
    async fn block_at(&self, position: Position) -> Option<RawBlock> {
        self.blocks.iter().find(|b| b.position == position).cloned()
    }
    fn nearby_entities(&self, max_distance: f64) -> Vec<RawEntity> {
        let origin = self.position.unwrap_or(Position { x: 0.0, y: 0.0, z: 0.0 });
        self.entities
            .iter()
            .filter(|e| distance(origin, e.position) <= max_distance)
            .cloned()
            .collect()
    }
    async fn dig(&self, _block: &RawBlock) -> Result<(), String> {
        Ok(())
    }
    async fn craft(&self, _recipe: &str, _count: u32, _crafting_table: bool) -> Result<(), String> {
        Ok(())
    }
    fn can_craft(&self, _recipe: &str, _count: u32) -> bool {
        true
    }
    fn missing_materials(&self, _recipe: &str, _count: u32) -> MissingMaterials {
        MissingMaterials::default()
    }
    async fn goto(&self, _position: Position) -> Result<(), String> {
        Ok(())
    }
    async fn consume(&self) -> Result<(), String> {
        Ok(())
    }
    async fn equip(&self, _item: &str, _slot: &str) -> Result<(), String> {
        Ok(())
    }
}

pub fn distance(a: Position, b: Position) -> f64 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2) + (a.z - b.z).powi(2)).sqrt()
}
