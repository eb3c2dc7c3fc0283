//! The canonical game tool set (§4.5): `get_position`, `get_health`,
//! `get_inventory`, `get_nearby_blocks`, `goto_location`, `mine_block`,
//! `craft_item`, `eat_food`.

use std::sync::Arc;

use serde_json::Value;

use crate::game_client::GameClient;
use crate::inventory::InventoryTracker;
use crate::tools::{ParameterType, ToolMetadata, ToolParameter, ToolRegistry, ToolResult};
use crate::world::{Position, WorldPerceiver};

/// Shared context every game-tool handler closes over: the bot capability
/// bundle plus the perceiver/inventory it may need to consult. Handlers are
/// strictly synchronous actors on the bot — they never call back into the
/// agent loop.
pub struct ToolContext {
    pub client: Arc<dyn GameClient>,
    pub perceiver: Arc<WorldPerceiver>,
    pub inventory: Arc<InventoryTracker>,
}

fn arg_str(args: &Value, name: &str) -> Result<String, String> {
    args.get(name)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| format!("missing required string argument '{}'", name))
}

fn arg_f64(args: &Value, name: &str) -> Result<f64, String> {
    args.get(name)
        .and_then(|v| v.as_f64())
        .ok_or_else(|| format!("missing required numeric argument '{}'", name))
}

fn arg_u32(args: &Value, name: &str, default: u32) -> u32 {
    args.get(name).and_then(|v| v.as_u64()).map(|v| v as u32).unwrap_or(default)
}

pub fn register_game_tools(registry: &mut ToolRegistry, ctx: Arc<ToolContext>) {
    {
        let ctx = Arc::clone(&ctx);
        registry.add_tool(
            ToolMetadata::new("get_position", "Returns the bot's current x/y/z position."),
            Arc::new(move |_args| {
                let ctx = Arc::clone(&ctx);
                Box::pin(async move {
                    match ctx.client.position() {
                        Some(p) => ToolResult::success(
                            format!("Position: ({:.1}, {:.1}, {:.1})", p.x, p.y, p.z),
                            Some(serde_json::json!({ "x": p.x, "y": p.y, "z": p.z })),
                        ),
                        None => ToolResult::failure("bot has not spawned yet"),
                    }
                })
            }),
        );
    }

    {
        let ctx = Arc::clone(&ctx);
        registry.add_tool(
            ToolMetadata::new("get_health", "Returns the bot's current health out of 20."),
            Arc::new(move |_args| {
                let ctx = Arc::clone(&ctx);
                Box::pin(async move {
                    let health = ctx.client.health();
                    ToolResult::success(format!("Health: {}/20", health), Some(serde_json::json!({ "health": health })))
                })
            }),
        );
    }

    {
        let ctx = Arc::clone(&ctx);
        registry.add_tool(
            ToolMetadata::new("get_inventory", "Returns a summary of the bot's current inventory."),
            Arc::new(move |_args| {
                let ctx = Arc::clone(&ctx);
                Box::pin(async move {
                    let summary = ctx.inventory.get_inventory_summary().await;
                    ToolResult::success(
                        format!("{} item types, {} slots used", summary.items.len(), summary.used_slots),
                        Some(serde_json::json!({
                            "items": summary.items,
                            "usedSlots": summary.used_slots,
                            "freeSlots": summary.free_slots,
                        })),
                    )
                })
            }),
        );
    }

    {
        let ctx = Arc::clone(&ctx);
        registry.add_tool(
            ToolMetadata::new("get_nearby_blocks", "Finds nearby blocks matching a type within a max distance.")
                .with_parameter(
                    ToolParameter::new("blockType", ParameterType::String)
                        .with_description("Block name to search for")
                        .required(),
                )
                .with_parameter(
                    ToolParameter::new("maxDistance", ParameterType::Number)
                        .with_description("Maximum search distance, capped at 128")
                        .with_range(1.0, 128.0)
                        .with_default(serde_json::json!(32)),
                ),
            Arc::new(move |args| {
                let ctx = Arc::clone(&ctx);
                Box::pin(async move {
                    let block_type = match arg_str(&args, "blockType") {
                        Ok(v) => v,
                        Err(e) => return ToolResult::failure(e),
                    };
                    let max_distance = args.get("maxDistance").and_then(|v| v.as_f64()).unwrap_or(32.0).min(128.0);
                    let blocks = ctx.perceiver.find_nearby_block_type(&block_type, max_distance).await;
                    ToolResult::success(
                        format!("Found {} block(s) of type {}", blocks.len(), block_type),
                        Some(serde_json::to_value(&blocks).unwrap_or(Value::Null)),
                    )
                })
            }),
        );
    }

    {
        let ctx = Arc::clone(&ctx);
        registry.add_tool(
            ToolMetadata::new("goto_location", "Walks the bot to the given coordinates.")
                .with_parameter(ToolParameter::new("x", ParameterType::Number).required())
                .with_parameter(ToolParameter::new("y", ParameterType::Number).required())
                .with_parameter(ToolParameter::new("z", ParameterType::Number).required()),
            Arc::new(move |args| {
                let ctx = Arc::clone(&ctx);
                Box::pin(async move {
                    let (x, y, z) = match (arg_f64(&args, "x"), arg_f64(&args, "y"), arg_f64(&args, "z")) {
                        (Ok(x), Ok(y), Ok(z)) => (x, y, z),
                        _ => return ToolResult::failure("x, y, and z are required numeric arguments"),
                    };
                    match ctx.client.goto(Position { x, y, z }).await {
                        Ok(()) => ToolResult::success(format!("Arrived at ({:.1}, {:.1}, {:.1})", x, y, z), None),
                        Err(e) => ToolResult::failure(e),
                    }
                })
            }),
        );
    }

    {
        let ctx = Arc::clone(&ctx);
        registry.add_tool(
            ToolMetadata::new("mine_block", "Mines a given number of blocks of a type.")
                .with_parameter(
                    ToolParameter::new("blockType", ParameterType::String).required(),
                )
                .with_parameter(
                    ToolParameter::new("count", ParameterType::Number)
                        .with_range(1.0, 64.0)
                        .with_default(serde_json::json!(1)),
                ),
            Arc::new(move |args| {
                let ctx = Arc::clone(&ctx);
                Box::pin(async move {
                    let block_type = match arg_str(&args, "blockType") {
                        Ok(v) => v,
                        Err(e) => return ToolResult::failure(e),
                    };
                    let count = arg_u32(&args, "count", 1).clamp(1, 64);
                    let candidates = ctx.client.find_blocks(&block_type, 32.0, count as usize).await;
                    if candidates.is_empty() {
                        return ToolResult::failure(format!("no {} found nearby", block_type));
                    }
                    let mut mined = 0u32;
                    for block in candidates.iter().take(count as usize) {
                        if ctx.client.dig(block).await.is_ok() {
                            mined += 1;
                        }
                    }
                    ToolResult::success(
                        format!("Mined {} of {} {}", mined, count, block_type),
                        Some(serde_json::json!({ "mined": mined })),
                    )
                })
            }),
        );
    }

    {
        let ctx = Arc::clone(&ctx);
        registry.add_tool(
            ToolMetadata::new("craft_item", "Crafts a given number of an item.")
                .with_parameter(ToolParameter::new("itemName", ParameterType::String).required())
                .with_parameter(
                    ToolParameter::new("count", ParameterType::Number)
                        .with_range(1.0, 64.0)
                        .with_default(serde_json::json!(1)),
                ),
            Arc::new(move |args| {
                let ctx = Arc::clone(&ctx);
                Box::pin(async move {
                    let item_name = match arg_str(&args, "itemName") {
                        Ok(v) => v,
                        Err(e) => return ToolResult::failure(e),
                    };
                    let count = arg_u32(&args, "count", 1).clamp(1, 64);
                    if !ctx.client.can_craft(&item_name, count) {
                        let missing = ctx.client.missing_materials(&item_name, count);
                        return ToolResult::failure(format!(
                            "cannot craft {} x{}: missing {:?}",
                            item_name, count, missing.items
                        ));
                    }
                    match ctx.client.craft(&item_name, count, false).await {
                        Ok(()) => ToolResult::success(format!("Crafted {} x{}", item_name, count), None),
                        Err(e) => ToolResult::failure(e),
                    }
                })
            }),
        );
    }

    {
        let ctx = Arc::clone(&ctx);
        registry.add_tool(
            ToolMetadata::new("eat_food", "Consumes food from the hotbar to restore hunger."),
            Arc::new(move |_args| {
                let ctx = Arc::clone(&ctx);
                Box::pin(async move {
                    match ctx.client.consume().await {
                        Ok(()) => ToolResult::success("Ate food", None),
                        Err(e) => ToolResult::failure(e),
                    }
                })
            }),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_client::FakeGameClient;

    #[tokio::test]
    async fn get_position_reports_current_location() {
        let client: Arc<dyn GameClient> = Arc::new(FakeGameClient {
            spawned: true,
            position: Some(Position { x: 1.0, y: 2.0, z: 3.0 }),
            ..Default::default()
        });
        let perceiver = Arc::new(WorldPerceiver::new(Arc::clone(&client), Default::default()));
        let inventory = Arc::new(InventoryTracker::new(Arc::clone(&client)));
        let ctx = Arc::new(ToolContext { client, perceiver, inventory });
        let mut registry = ToolRegistry::new();
        register_game_tools(&mut registry, ctx);

        let call = crate::tools::ToolCall {
            id: "1".to_string(),
            name: "get_position".to_string(),
            arguments: serde_json::json!({}),
        };
        let result = registry.execute_tool(&call).await;
        assert!(result.success);
    }
}
