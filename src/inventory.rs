//! The Inventory Tracker (C3): diff-based change feed, categorization, and the
//! resource queries consumed by the strategic layer.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

use crate::game_client::GameClient;

const CAPACITY_SLOTS: usize = 36;
const CHANGE_RING_CAPACITY: usize = 100;

const TOOL_KEYWORDS: &[&str] = &["pickaxe", "axe", "shovel", "hoe"];
const WEAPON_KEYWORDS: &[&str] = &["sword", "bow", "crossbow", "trident"];
const ARMOR_KEYWORDS: &[&str] = &["helmet", "chestplate", "leggings", "boots", "shield"];
const FOOD_ALLOWLIST: &[&str] = &[
    "bread", "apple", "cooked_beef", "cooked_porkchop", "cooked_chicken", "carrot", "potato",
    "baked_potato", "golden_apple", "cookie", "melon_slice",
];
const ORE_ALLOWLIST: &[&str] = &[
    "coal_ore", "iron_ore", "gold_ore", "diamond_ore", "redstone_ore", "lapis_ore", "emerald_ore",
    "raw_iron", "raw_gold", "coal", "iron_ingot", "gold_ingot", "diamond", "emerald",
];
const BLOCK_KEYWORDS: &[&str] = &["_block", "stone", "dirt", "planks", "log"];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ChangeKind {
    Added,
    Removed,
    Changed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InventoryChange {
    pub timestamp: DateTime<Utc>,
    pub kind: ChangeKind,
    pub item: String,
    pub count_before: u32,
    pub count_after: u32,
    pub delta: i64,
}

#[derive(Debug, Clone, Default)]
pub struct Categorization {
    pub tools: Vec<String>,
    pub weapons: Vec<String>,
    pub armor: Vec<String>,
    pub food: Vec<String>,
    pub blocks: Vec<String>,
    pub ores: Vec<String>,
    pub other: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct InventorySummary {
    pub items: HashMap<String, u32>,
    pub used_slots: usize,
    pub free_slots: usize,
    pub categorization: Categorization,
}

#[derive(Debug, Clone, Default)]
pub struct Resources {
    pub has_wood_pickaxe: bool,
    pub has_stone_pickaxe: bool,
    pub has_iron_pickaxe: bool,
    pub has_diamond_pickaxe: bool,
    pub has_sword: bool,
    pub has_food: bool,
    pub has_torch: bool,
    pub has_crafting_table: bool,
    pub wood_count: u32,
    pub stone_count: u32,
    pub iron_count: u32,
    pub diamond_count: u32,
    pub food_count: u32,
}

fn categorize(name: &str) -> &'static str {
    let lower = name.to_lowercase();
    if TOOL_KEYWORDS.iter().any(|k| lower.contains(k)) {
        "tools"
    } else if WEAPON_KEYWORDS.iter().any(|k| lower.contains(k)) {
        "weapons"
    } else if ARMOR_KEYWORDS.iter().any(|k| lower.contains(k)) {
        "armor"
    } else if FOOD_ALLOWLIST.contains(&lower.as_str()) {
        "food"
    } else if ORE_ALLOWLIST.contains(&lower.as_str()) {
        "ores"
    } else if BLOCK_KEYWORDS.iter().any(|k| lower.contains(k)) {
        "blocks"
    } else {
        "other"
    }
}

struct Inner {
    aggregate: HashMap<String, u32>,
    changes: Vec<InventoryChange>,
}

pub struct InventoryTracker {
    client: Arc<dyn GameClient>,
    state: Mutex<Inner>,
}

impl InventoryTracker {
    pub fn new(client: Arc<dyn GameClient>) -> Self {
        InventoryTracker {
            client,
            state: Mutex::new(Inner {
                aggregate: HashMap::new(),
                changes: Vec::new(),
            }),
        }
    }

    fn rebuild_aggregate(&self) -> HashMap<String, u32> {
        let mut aggregate = HashMap::new();
        for item in self.client.inventory_items() {
            *aggregate.entry(item.name).or_insert(0) += item.count;
        }
        aggregate
    }

    /// Rebuilds the aggregate map without emitting changes.
    pub async fn update_inventory_snapshot(&self) {
        let aggregate = self.rebuild_aggregate();
        self.state.lock().await.aggregate = aggregate;
    }

    /// Called when the game client reports "item added" or "item dropped";
    /// rebuilds the aggregate map and emits one `InventoryChange` per differing entry.
    pub async fn on_inventory_event(&self) {
        let new_aggregate = self.rebuild_aggregate();
        let mut inner = self.state.lock().await;
        let old_aggregate = inner.aggregate.clone();

        let mut keys: Vec<&String> = old_aggregate.keys().chain(new_aggregate.keys()).collect();
        keys.sort();
        keys.dedup();

        for key in keys {
            let before = *old_aggregate.get(key).unwrap_or(&0);
            let after = *new_aggregate.get(key).unwrap_or(&0);
            if before == after {
                continue;
            }
            let delta = after as i64 - before as i64;
            let kind = if before == 0 {
                ChangeKind::Added
            } else if after == 0 {
                ChangeKind::Removed
            } else {
                ChangeKind::Changed
            };
            inner.changes.push(InventoryChange {
                timestamp: Utc::now(),
                kind,
                item: key.clone(),
                count_before: before,
                count_after: after,
                delta,
            });
            if inner.changes.len() > CHANGE_RING_CAPACITY {
                let excess = inner.changes.len() - CHANGE_RING_CAPACITY;
                inner.changes.drain(0..excess);
            }
        }

        inner.aggregate = new_aggregate;
    }

    pub async fn changes(&self) -> Vec<InventoryChange> {
        self.state.lock().await.changes.clone()
    }

    pub async fn get_inventory_summary(&self) -> InventorySummary {
        let inner = self.state.lock().await;
        let mut categorization = Categorization::default();
        for name in inner.aggregate.keys() {
            match categorize(name) {
                "tools" => categorization.tools.push(name.clone()),
                "weapons" => categorization.weapons.push(name.clone()),
                "armor" => categorization.armor.push(name.clone()),
                "food" => categorization.food.push(name.clone()),
                "ores" => categorization.ores.push(name.clone()),
                "blocks" => categorization.blocks.push(name.clone()),
                _ => categorization.other.push(name.clone()),
            }
        }
        InventorySummary {
            used_slots: inner.aggregate.len(),
            free_slots: CAPACITY_SLOTS.saturating_sub(inner.aggregate.len()),
            items: inner.aggregate.clone(),
            categorization,
        }
    }

    pub async fn has_item(&self, name: &str, min: u32) -> bool {
        self.get_item_count(name).await >= min
    }

    pub async fn get_item_count(&self, name: &str) -> u32 {
        *self.state.lock().await.aggregate.get(name).unwrap_or(&0)
    }

    pub async fn find_item(&self, name: &str) -> Option<(String, u32)> {
        self.state
            .lock()
            .await
            .aggregate
            .get(name)
            .map(|count| (name.to_string(), *count))
    }

    pub async fn check_resources(&self) -> Resources {
        let inner = self.state.lock().await;
        let count = |n: &str| *inner.aggregate.get(n).unwrap_or(&0);
        let any_of = |names: &[&str]| names.iter().any(|n| count(n) > 0);

        Resources {
            has_wood_pickaxe: count("wooden_pickaxe") > 0,
            has_stone_pickaxe: count("stone_pickaxe") > 0,
            has_iron_pickaxe: count("iron_pickaxe") > 0,
            has_diamond_pickaxe: count("diamond_pickaxe") > 0,
            has_sword: WEAPON_KEYWORDS
                .iter()
                .any(|k| inner.aggregate.keys().any(|item| item.contains(k))),
            has_food: any_of(FOOD_ALLOWLIST),
            has_torch: count("torch") > 0,
            has_crafting_table: count("crafting_table") > 0,
            wood_count: inner
                .aggregate
                .iter()
                .filter(|(k, _)| k.contains("log") || k.contains("planks"))
                .map(|(_, v)| *v)
                .sum(),
            stone_count: count("cobblestone") + count("stone"),
            iron_count: count("iron_ingot"),
            diamond_count: count("diamond"),
            food_count: FOOD_ALLOWLIST.iter().map(|n| count(n)).sum(),
        }
    }

    pub fn can_craft(&self, recipe: &str, count: u32) -> bool {
        self.client.can_craft(recipe, count)
    }

    pub fn get_missing_materials(&self, recipe: &str, count: u32) -> Vec<(String, u32)> {
        self.client.missing_materials(recipe, count).items
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_client::{FakeGameClient, InventoryItem};

    #[tokio::test]
    async fn diff_emits_changes_with_consistent_delta() {
        let client = Arc::new(FakeGameClient {
            spawned: true,
            inventory: vec![InventoryItem {
                name: "cobblestone".to_string(),
                count: 10,
                slot: 0,
            }],
            ..Default::default()
        });
        let tracker = InventoryTracker::new(client);
        tracker.on_inventory_event().await;
        let changes = tracker.changes().await;
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].kind, ChangeKind::Added);
        assert!(changes[0].delta > 0);
        assert_eq!(changes[0].count_after, changes[0].count_before as i64 as u32 + changes[0].delta as u32);
    }

    #[tokio::test]
    async fn categorization_matches_keyword_tables() {
        let client = Arc::new(FakeGameClient {
            spawned: true,
            inventory: vec![
                InventoryItem { name: "iron_pickaxe".to_string(), count: 1, slot: 0 },
                InventoryItem { name: "bread".to_string(), count: 3, slot: 1 },
            ],
            ..Default::default()
        });
        let tracker = InventoryTracker::new(client);
        tracker.update_inventory_snapshot().await;
        let summary = tracker.get_inventory_summary().await;
        assert!(summary.categorization.tools.contains(&"iron_pickaxe".to_string()));
        assert!(summary.categorization.food.contains(&"bread".to_string()));
    }
}
