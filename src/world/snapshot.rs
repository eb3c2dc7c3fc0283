//! The immutable `WorldSnapshot` and its nested observation types.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
    pub z: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum BlockCategory {
    Ore,
    Wood,
    Stone,
    Dirt,
    Other,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlockObservation {
    pub name: String,
    pub position: Position,
    pub distance: f64,
    pub category: BlockCategory,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EntityObservation {
    pub name: String,
    pub entity_type: String,
    pub position: Position,
    pub distance: f64,
    pub hostile: bool,
    pub health: Option<f64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DangerKind {
    Lava,
    Cliff,
    HostileMob,
    LowHealth,
    LowFood,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Danger {
    pub kind: DangerKind,
    pub severity: Severity,
    pub description: String,
    pub position: Option<Position>,
}

/// An immutable observation of the world at a point in time. Never mutated
/// after publication; superseded wholesale by the next snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorldSnapshot {
    pub timestamp: DateTime<Utc>,
    pub position: Position,
    pub health: f64,
    pub food: f64,
    pub dimension: String,
    pub nearby_blocks: Vec<BlockObservation>,
    pub nearby_entities: Vec<EntityObservation>,
    pub dangers: Vec<Danger>,
    pub time_of_day: i64,
    pub weather: String,
}

fn round_to_one_decimal(d: f64) -> f64 {
    (d * 10.0).round() / 10.0
}

impl WorldSnapshot {
    /// Rounds distances to one decimal and sorts blocks/entities ascending by
    /// distance, as required of every published snapshot (I3).
    pub fn normalize(mut self) -> Self {
        for b in &mut self.nearby_blocks {
            b.distance = round_to_one_decimal(b.distance);
        }
        for e in &mut self.nearby_entities {
            e.distance = round_to_one_decimal(e.distance);
        }
        self.nearby_blocks
            .sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap());
        self.nearby_entities
            .sort_by(|a, b| a.distance.partial_cmp(&b.distance).unwrap());
        self
    }
}
