//! The World Perceiver (C2): periodic and on-demand sampling, danger detection.

use std::sync::Arc;
use std::sync::Mutex as StdMutex;

use chrono::Utc;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;

use crate::error::{AgentError, Result};
use crate::game_client::{distance, GameClient};
use crate::world::snapshot::{
    BlockCategory, BlockObservation, Danger, DangerKind, EntityObservation, Position, Severity,
    WorldSnapshot,
};

const INTERESTING_ORES: &[&str] = &[
    "coal_ore",
    "iron_ore",
    "gold_ore",
    "diamond_ore",
    "redstone_ore",
    "lapis_ore",
    "emerald_ore",
];
const INTERESTING_WOOD: &[&str] = &["oak_log", "birch_log", "spruce_log", "jungle_log"];
const INTERESTING_OTHER: &[&str] = &["crafting_table", "furnace", "chest", "lava", "water"];

#[derive(Debug, Clone)]
pub struct ScanPolicy {
    pub block_radius: f64,
    pub entity_radius: f64,
    pub update_interval_secs: u64,
    pub track_ores: bool,
    pub track_mobs: bool,
    pub track_dangers: bool,
}

impl Default for ScanPolicy {
    fn default() -> Self {
        ScanPolicy {
            block_radius: 32.0,
            entity_radius: 32.0,
            update_interval_secs: 5,
            track_ores: true,
            track_mobs: true,
            track_dangers: true,
        }
    }
}

fn categorize_block(name: &str) -> BlockCategory {
    if INTERESTING_ORES.contains(&name) {
        BlockCategory::Ore
    } else if INTERESTING_WOOD.contains(&name) {
        BlockCategory::Wood
    } else if name.contains("stone") {
        BlockCategory::Stone
    } else if name.contains("dirt") {
        BlockCategory::Dirt
    } else {
        BlockCategory::Other
    }
}

pub struct WorldPerceiver {
    client: Arc<dyn GameClient>,
    policy: ScanPolicy,
    last_snapshot: Mutex<Option<WorldSnapshot>>,
    running: StdMutex<bool>,
    timer_handle: StdMutex<Option<JoinHandle<()>>>,
}

impl WorldPerceiver {
    pub fn new(client: Arc<dyn GameClient>, policy: ScanPolicy) -> Self {
        WorldPerceiver {
            client,
            policy,
            last_snapshot: Mutex::new(None),
            running: StdMutex::new(false),
            timer_handle: StdMutex::new(None),
        }
    }

    /// Produces one snapshot. Fails with `BotNotSpawned` iff the bot has no position.
    pub async fn observe(&self) -> Result<WorldSnapshot> {
        let position = self.client.position().ok_or(AgentError::BotNotSpawned)?;

        let mut blocks = Vec::new();
        if self.policy.track_ores {
            for name in INTERESTING_ORES.iter().chain(INTERESTING_WOOD.iter()).chain(INTERESTING_OTHER.iter()) {
                let matches = self
                    .client
                    .find_blocks(name, self.policy.block_radius, 10)
                    .await;
                for raw in matches {
                    blocks.push(BlockObservation {
                        distance: distance(position, raw.position),
                        category: categorize_block(&raw.name),
                        name: raw.name,
                        position: raw.position,
                    });
                }
            }
        }

        let mut entities = Vec::new();
        if self.policy.track_mobs {
            for raw in self.client.nearby_entities(self.policy.entity_radius) {
                entities.push(EntityObservation {
                    distance: distance(position, raw.position),
                    name: raw.name,
                    entity_type: raw.entity_type,
                    position: raw.position,
                    hostile: raw.hostile,
                    health: raw.health,
                });
            }
        }

        let health = self.client.health();
        let food = self.client.food();

        let mut snapshot = WorldSnapshot {
            timestamp: Utc::now(),
            position,
            health,
            food,
            dimension: self.client.dimension(),
            nearby_blocks: blocks,
            nearby_entities: entities,
            dangers: Vec::new(),
            time_of_day: self.client.time_of_day(),
            weather: if self.client.is_raining() { "rain" } else { "clear" }.to_string(),
        }
        .normalize();

        if self.policy.track_dangers {
            snapshot.dangers = self.detect_dangers(&snapshot).await;
        }

        *self.last_snapshot.lock().await = Some(snapshot.clone());
        Ok(snapshot)
    }

    async fn detect_dangers(&self, snapshot: &WorldSnapshot) -> Vec<Danger> {
        let mut dangers = Vec::new();

        if snapshot.health <= 5.0 {
            dangers.push(Danger {
                kind: DangerKind::LowHealth,
                severity: Severity::Critical,
                description: format!("Critical health: {}/20", snapshot.health as i32),
                position: None,
            });
        } else if snapshot.health <= 10.0 {
            dangers.push(Danger {
                kind: DangerKind::LowHealth,
                severity: Severity::High,
                description: format!("Low health: {}/20", snapshot.health as i32),
                position: None,
            });
        }

        if snapshot.food <= 5.0 {
            dangers.push(Danger {
                kind: DangerKind::LowFood,
                severity: Severity::High,
                description: format!("Critical food: {}/20", snapshot.food as i32),
                position: None,
            });
        } else if snapshot.food <= 10.0 {
            dangers.push(Danger {
                kind: DangerKind::LowFood,
                severity: Severity::Medium,
                description: format!("Low food: {}/20", snapshot.food as i32),
                position: None,
            });
        }

        if let Some(lava) = snapshot
            .nearby_blocks
            .iter()
            .find(|b| b.name == "lava" && b.distance <= 8.0)
        {
            let severity = if lava.distance < 3.0 {
                Severity::Critical
            } else {
                Severity::Medium
            };
            dangers.push(Danger {
                kind: DangerKind::Lava,
                severity,
                description: format!("Lava nearby at distance {}", lava.distance),
                position: Some(lava.position),
            });
        }

        // Nearest hostile entity from the *last* snapshot, per the detection rule.
        if let Some(last) = self.last_snapshot.lock().await.as_ref() {
            if let Some(hostile) = last.nearby_entities.iter().find(|e| e.hostile) {
                let severity = if hostile.distance < 5.0 {
                    Severity::Critical
                } else if hostile.distance < 10.0 {
                    Severity::High
                } else {
                    Severity::Medium
                };
                dangers.push(Danger {
                    kind: DangerKind::HostileMob,
                    severity,
                    description: format!("Hostile {} nearby", hostile.name),
                    position: Some(hostile.position),
                });
            }
        }

        if let Some(cliff) = self.detect_cliff(snapshot.position).await {
            dangers.push(cliff);
        }

        dangers
    }

    async fn detect_cliff(&self, origin: Position) -> Option<Danger> {
        let offsets = [(-1.0, -1.0), (-1.0, 1.0), (1.0, -1.0), (1.0, 1.0), (0.0, -1.0), (0.0, 1.0), (-1.0, 0.0), (1.0, 0.0)];
        for (dx, dz) in offsets {
            let probe = Position {
                x: origin.x + dx,
                y: origin.y,
                z: origin.z + dz,
            };
            let mut found_at = None;
            for drop in 1..=10 {
                let below = Position {
                    x: probe.x,
                    y: probe.y - drop as f64,
                    z: probe.z,
                };
                if self.client.block_at(below).await.is_some() {
                    found_at = Some(drop);
                    break;
                }
            }
            match found_at {
                Some(drop) if drop > 4 => return Some(cliff_danger(drop, Severity::Medium, probe)),
                Some(_) => {}
                None => return Some(cliff_danger(11, Severity::High, probe)),
            }
        }
        None
    }

    /// Schedules periodic observation; issues one immediate observation first.
    /// Calling start while already running is a no-op warning, not an error.
    pub async fn start_observing(self: &Arc<Self>) -> Result<()> {
        {
            let mut running = self.running.lock().unwrap();
            if *running {
                log::warn!("WorldPerceiver::start_observing called while already running");
                return Ok(());
            }
            *running = true;
        }

        self.observe().await?;

        let this = Arc::clone(self);
        let interval = self.policy.update_interval_secs;
        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(std::time::Duration::from_secs(interval));
            loop {
                ticker.tick().await;
                if !*this.running.lock().unwrap() {
                    break;
                }
                if let Err(e) = this.observe().await {
                    log::warn!("WorldPerceiver periodic observe failed: {}", e);
                }
            }
        });
        *self.timer_handle.lock().unwrap() = Some(handle);
        Ok(())
    }

    pub fn stop_observing(&self) {
        *self.running.lock().unwrap() = false;
        if let Some(handle) = self.timer_handle.lock().unwrap().take() {
            handle.abort();
        }
    }

    pub async fn last_snapshot(&self) -> Option<WorldSnapshot> {
        self.last_snapshot.lock().await.clone()
    }

    pub async fn find_nearby_block_type(&self, name: &str, max_distance: f64) -> Vec<BlockObservation> {
        match self.last_snapshot.lock().await.as_ref() {
            Some(s) => s
                .nearby_blocks
                .iter()
                .filter(|b| b.name == name && b.distance <= max_distance)
                .take(50)
                .cloned()
                .collect(),
            None => Vec::new(),
        }
    }

    pub async fn find_nearest_ore(&self) -> Option<BlockObservation> {
        self.last_snapshot
            .lock()
            .await
            .as_ref()
            .and_then(|s| s.nearby_blocks.iter().find(|b| b.category == BlockCategory::Ore).cloned())
    }

    pub async fn find_nearest_wood(&self) -> Option<BlockObservation> {
        self.last_snapshot
            .lock()
            .await
            .as_ref()
            .and_then(|s| s.nearby_blocks.iter().find(|b| b.category == BlockCategory::Wood).cloned())
    }

    pub async fn is_safe_position(&self, p: Position) -> bool {
        match self.last_snapshot.lock().await.as_ref() {
            Some(s) => !s.dangers.iter().any(|d| match d.position {
                Some(dp) => distance(dp, p) <= 5.0,
                None => false,
            }),
            None => true,
        }
    }
}

fn cliff_danger(drop: i32, severity: Severity, position: Position) -> Danger {
    Danger {
        kind: DangerKind::Cliff,
        severity,
        description: format!("Cliff drop of {} blocks detected", drop),
        position: Some(position),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_client::{FakeGameClient, RawBlock};

    /// Solid ground one block below each of the 8 ring offsets around
    /// `origin`, so `detect_cliff` finds footing everywhere and tests that
    /// aren't about cliffs aren't also tripped by one.
    fn solid_ground_under(origin: Position) -> Vec<RawBlock> {
        [(-1.0, -1.0), (-1.0, 1.0), (1.0, -1.0), (1.0, 1.0), (0.0, -1.0), (0.0, 1.0), (-1.0, 0.0), (1.0, 0.0)]
            .iter()
            .map(|(dx, dz)| RawBlock {
                name: "stone".to_string(),
                position: Position { x: origin.x + dx, y: origin.y - 1.0, z: origin.z + dz },
            })
            .collect()
    }

    #[tokio::test]
    async fn danger_detection_critical_health() {
        let origin = Position { x: 0.0, y: 64.0, z: 0.0 };
        let client = FakeGameClient {
            spawned: true,
            position: Some(origin),
            health: 4.0,
            food: 20.0,
            dimension: "overworld".to_string(),
            blocks: solid_ground_under(origin),
            ..Default::default()
        };
        let perceiver = WorldPerceiver::new(Arc::new(client), ScanPolicy::default());
        let snapshot = perceiver.observe().await.unwrap();
        assert_eq!(snapshot.dangers.len(), 1);
        assert_eq!(snapshot.dangers[0].kind, DangerKind::LowHealth);
        assert_eq!(snapshot.dangers[0].severity, Severity::Critical);
        assert_eq!(snapshot.dangers[0].description, "Critical health: 4/20");
    }

    #[tokio::test]
    async fn cliff_with_no_solid_cell_within_ten_is_high_severity() {
        let origin = Position { x: 0.0, y: 64.0, z: 0.0 };
        let client = FakeGameClient {
            spawned: true,
            position: Some(origin),
            health: 20.0,
            food: 20.0,
            dimension: "overworld".to_string(),
            // No blocks anywhere: every probe falls through without finding ground.
            ..Default::default()
        };
        let perceiver = WorldPerceiver::new(Arc::new(client), ScanPolicy::default());
        let snapshot = perceiver.observe().await.unwrap();
        let cliff = snapshot.dangers.iter().find(|d| d.kind == DangerKind::Cliff).unwrap();
        assert_eq!(cliff.severity, Severity::High);
    }

    #[tokio::test]
    async fn cliff_with_solid_cell_past_depth_four_is_medium_severity() {
        let origin = Position { x: 0.0, y: 64.0, z: 0.0 };
        let mut blocks = solid_ground_under(origin);
        // Deepen the ledge to the west past the medium threshold (drop > 4),
        // leaving every other direction footed at drop = 1.
        blocks.retain(|b| b.position != Position { x: origin.x - 1.0, y: origin.y - 1.0, z: origin.z });
        blocks.push(RawBlock { name: "stone".to_string(), position: Position { x: origin.x - 1.0, y: origin.y - 6.0, z: origin.z } });

        let client = FakeGameClient {
            spawned: true,
            position: Some(origin),
            health: 20.0,
            food: 20.0,
            dimension: "overworld".to_string(),
            blocks,
            ..Default::default()
        };
        let perceiver = WorldPerceiver::new(Arc::new(client), ScanPolicy::default());
        let snapshot = perceiver.observe().await.unwrap();
        let cliff = snapshot.dangers.iter().find(|d| d.kind == DangerKind::Cliff).unwrap();
        assert_eq!(cliff.severity, Severity::Medium);
    }

    #[tokio::test]
    async fn observe_fails_when_not_spawned() {
        let client = FakeGameClient::default();
        let perceiver = WorldPerceiver::new(Arc::new(client), ScanPolicy::default());
        assert!(matches!(perceiver.observe().await, Err(AgentError::BotNotSpawned)));
    }

    #[tokio::test]
    async fn blocks_and_entities_sorted_by_distance() {
        let client = FakeGameClient {
            spawned: true,
            position: Some(Position { x: 0.0, y: 64.0, z: 0.0 }),
            health: 20.0,
            food: 20.0,
            dimension: "overworld".to_string(),
            blocks: vec![
                crate::game_client::RawBlock {
                    name: "iron_ore".to_string(),
                    position: Position { x: 5.0, y: 64.0, z: 0.0 },
                },
                crate::game_client::RawBlock {
                    name: "iron_ore".to_string(),
                    position: Position { x: 1.0, y: 64.0, z: 0.0 },
                },
            ],
            ..Default::default()
        };
        let perceiver = WorldPerceiver::new(Arc::new(client), ScanPolicy::default());
        let snapshot = perceiver.observe().await.unwrap();
        let distances: Vec<f64> = snapshot.nearby_blocks.iter().map(|b| b.distance).collect();
        let mut sorted = distances.clone();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
        assert_eq!(distances, sorted);
    }
}
