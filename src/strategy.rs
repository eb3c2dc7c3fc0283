//! The strategic layer consulted by the Agent Loop's Assess step: given
//! current inventory and vitals, derives a speedrun phase and a single
//! recommended next action. Expressed as a trait so the bundled
//! `SpeedrunStrategy` can be swapped for a different playstyle without
//! touching the Decision Cycle.

use crate::inventory::{InventorySummary, Resources};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum SpeedrunPhase {
    EarlyGame,
    NetherPrep,
    Nether,
    EndPrep,
    EndFight,
    Completed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Priority {
    Low,
    Medium,
    High,
    Critical,
}

#[derive(Debug, Clone)]
pub struct StrategyDecision {
    pub phase: SpeedrunPhase,
    pub priority: Priority,
    pub action: String,
    pub rationale: String,
    pub estimated_seconds: u64,
    pub risks: Vec<String>,
}

#[derive(Debug, Clone, Default)]
pub struct Readiness {
    pub ready: bool,
    pub missing: Vec<String>,
}

pub trait StrategyEngine: Send + Sync {
    fn assess(
        &self,
        summary: &InventorySummary,
        resources: &Resources,
        health: f64,
        food: f64,
    ) -> (StrategyDecision, Readiness);
}

/// Derives the speedrun phase from the items a run has accumulated so far.
/// Phases only advance, never regress, because each check subsumes the
/// previous tier's requirements.
pub fn derive_phase(summary: &InventorySummary) -> SpeedrunPhase {
    let has = |name: &str| summary.items.contains_key(name);

    if has("eye_of_ender") && has("diamond_pickaxe") {
        SpeedrunPhase::EndFight
    } else if has("blaze_rod") && has("ender_pearl") {
        SpeedrunPhase::EndPrep
    } else if has("obsidian") && has("flint_and_steel") {
        SpeedrunPhase::Nether
    } else if has("iron_pickaxe") {
        SpeedrunPhase::NetherPrep
    } else {
        SpeedrunPhase::EarlyGame
    }
}

pub struct SpeedrunStrategy;

impl StrategyEngine for SpeedrunStrategy {
    fn assess(
        &self,
        summary: &InventorySummary,
        resources: &Resources,
        health: f64,
        food: f64,
    ) -> (StrategyDecision, Readiness) {
        if health <= 10.0 {
            return (
                StrategyDecision {
                    phase: derive_phase(summary),
                    priority: Priority::Critical,
                    action: "retreat to safety and recover health".to_string(),
                    rationale: format!("health at {:.0}/20", health),
                    estimated_seconds: 20,
                    risks: vec!["death".to_string()],
                },
                Readiness { ready: false, missing: vec!["safe location".to_string()] },
            );
        }
        if food <= 10.0 && resources.has_food {
            return (
                StrategyDecision {
                    phase: derive_phase(summary),
                    priority: Priority::High,
                    action: "eat food".to_string(),
                    rationale: format!("food at {:.0}/20", food),
                    estimated_seconds: 3,
                    risks: vec![],
                },
                Readiness { ready: true, missing: vec![] },
            );
        }

        let phase = derive_phase(summary);
        match phase {
            SpeedrunPhase::EarlyGame => {
                let missing: Vec<String> = [
                    (!resources.has_wood_pickaxe && !resources.has_stone_pickaxe, "a pickaxe"),
                    (resources.wood_count == 0, "wood"),
                ]
                .into_iter()
                .filter(|(cond, _)| *cond)
                .map(|(_, label)| label.to_string())
                .collect();
                (
                    StrategyDecision {
                        phase,
                        priority: Priority::Medium,
                        action: "gather wood and stone tools".to_string(),
                        rationale: "no iron tools yet".to_string(),
                        estimated_seconds: 300,
                        risks: vec!["hostile mobs at night".to_string()],
                    },
                    Readiness { ready: missing.is_empty(), missing },
                )
            }
            SpeedrunPhase::NetherPrep => (
                StrategyDecision {
                    phase,
                    priority: Priority::Medium,
                    action: "mine obsidian and craft a flint and steel".to_string(),
                    rationale: "iron pickaxe acquired".to_string(),
                    estimated_seconds: 240,
                    risks: vec!["lava".to_string()],
                },
                Readiness { ready: resources.iron_count > 0, missing: vec!["flint and steel".to_string()] },
            ),
            SpeedrunPhase::Nether => (
                StrategyDecision {
                    phase,
                    priority: Priority::High,
                    action: "enter the nether and find a fortress".to_string(),
                    rationale: "portal materials ready".to_string(),
                    estimated_seconds: 600,
                    risks: vec!["ghasts".to_string(), "lava".to_string()],
                },
                Readiness { ready: true, missing: vec![] },
            ),
            SpeedrunPhase::EndPrep => (
                StrategyDecision {
                    phase,
                    priority: Priority::High,
                    action: "trade blaze rods and ender pearls for eyes of ender".to_string(),
                    rationale: "blaze rods and ender pearls acquired".to_string(),
                    estimated_seconds: 450,
                    risks: vec!["blazes".to_string(), "endermen".to_string()],
                },
                Readiness { ready: true, missing: vec![] },
            ),
            SpeedrunPhase::EndFight => (
                StrategyDecision {
                    phase,
                    priority: Priority::Critical,
                    action: "locate the stronghold portal and enter the end".to_string(),
                    rationale: "eyes of ender and diamond pickaxe acquired".to_string(),
                    estimated_seconds: 900,
                    risks: vec!["ender dragon".to_string(), "void".to_string()],
                },
                Readiness { ready: true, missing: vec![] },
            ),
            SpeedrunPhase::Completed => (
                StrategyDecision {
                    phase,
                    priority: Priority::Low,
                    action: "idle".to_string(),
                    rationale: "run complete".to_string(),
                    estimated_seconds: 0,
                    risks: vec![],
                },
                Readiness { ready: true, missing: vec![] },
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn summary_with(items: &[&str]) -> InventorySummary {
        let mut map = HashMap::new();
        for item in items {
            map.insert(item.to_string(), 1);
        }
        InventorySummary {
            items: map,
            used_slots: items.len(),
            free_slots: 36 - items.len(),
            categorization: Default::default(),
        }
    }

    #[test]
    fn phase_derivation_advances_with_accumulated_items() {
        assert_eq!(derive_phase(&summary_with(&["iron_pickaxe"])), SpeedrunPhase::NetherPrep);
        assert_eq!(
            derive_phase(&summary_with(&["iron_pickaxe", "obsidian", "flint_and_steel"])),
            SpeedrunPhase::Nether
        );
        assert_eq!(
            derive_phase(&summary_with(&[
                "iron_pickaxe",
                "obsidian",
                "flint_and_steel",
                "blaze_rod",
                "ender_pearl"
            ])),
            SpeedrunPhase::EndPrep
        );
        assert_eq!(
            derive_phase(&summary_with(&[
                "iron_pickaxe",
                "obsidian",
                "flint_and_steel",
                "blaze_rod",
                "ender_pearl",
                "eye_of_ender",
                "diamond_pickaxe"
            ])),
            SpeedrunPhase::EndFight
        );
    }

    #[test]
    fn critical_health_overrides_phase_action() {
        let summary = summary_with(&["iron_pickaxe"]);
        let resources = Resources::default();
        let (decision, readiness) = SpeedrunStrategy.assess(&summary, &resources, 4.0, 20.0);
        assert_eq!(decision.priority, Priority::Critical);
        assert!(!readiness.ready);
    }
}
