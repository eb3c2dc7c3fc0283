//! World perception: periodic and on-demand sampling of bot/world state, with
//! deterministic danger detection.

mod perceiver;
mod snapshot;

pub use perceiver::{ScanPolicy, WorldPerceiver};
pub use snapshot::{
    BlockCategory, BlockObservation, Danger, DangerKind, EntityObservation, Position, Severity,
    WorldSnapshot,
};
