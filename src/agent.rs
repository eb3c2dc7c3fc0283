//! The Agent Loop (C7, part 2): wires the Perceiver, Inventory Tracker,
//! Memory, State Machine, Tool Registry, LLM Bridge, Persistence, and
//! strategic layer into the Decision Cycle — Observe, Assess, Plan, Decide,
//! Reflect, Persist, Reschedule.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Mutex as AsyncMutex;
use tokio::task::JoinHandle;

use crate::error::{AgentError, Result};
use crate::event::{AgentEvent, EventHandler, LoggingEventHandler};
use crate::game_client::GameClient;
use crate::goals::Goal;
use crate::inventory::InventoryTracker;
use crate::llm::{ChatOptions, LlmBridge, Message};
use crate::memory::{ContextOptions, Memory};
use crate::persistence::PersistencePort;
use crate::state_machine::{BotState, StateMachine};
use crate::strategy::{Priority, StrategyEngine};
use crate::tools::{ToolContext, ToolRegistry};
use crate::world::WorldPerceiver;

const QUIESCENCE_DELAY: Duration = Duration::from_secs(2);
const ERROR_RETRY_DELAY: Duration = Duration::from_secs(5);

/// Everything one Decision Cycle needs, bundled so `Agent::new` reads as a
/// single dependency list rather than eight positional arguments.
pub struct AgentDeps {
    pub client: Arc<dyn GameClient>,
    pub perceiver: Arc<WorldPerceiver>,
    pub inventory: Arc<InventoryTracker>,
    pub memory: Arc<Memory>,
    pub state_machine: Arc<StateMachine>,
    pub tools: Arc<ToolRegistry>,
    pub llm: Arc<dyn LlmBridge>,
    pub persistence: Arc<PersistencePort>,
    pub strategy: Arc<dyn StrategyEngine>,
}

pub struct Agent {
    client: Arc<dyn GameClient>,
    perceiver: Arc<WorldPerceiver>,
    inventory: Arc<InventoryTracker>,
    memory: Arc<Memory>,
    state_machine: Arc<StateMachine>,
    tools: Arc<ToolRegistry>,
    llm: Arc<dyn LlmBridge>,
    persistence: Arc<PersistencePort>,
    strategy: Arc<dyn StrategyEngine>,
    events: Arc<dyn EventHandler>,
    running: Arc<AtomicBool>,
    is_processing: Arc<AtomicBool>,
    loop_handle: AsyncMutex<Option<JoinHandle<()>>>,
}

impl Agent {
    pub fn new(deps: AgentDeps) -> Self {
        Agent {
            client: deps.client,
            perceiver: deps.perceiver,
            inventory: deps.inventory,
            memory: deps.memory,
            state_machine: deps.state_machine,
            tools: deps.tools,
            llm: deps.llm,
            persistence: deps.persistence,
            strategy: deps.strategy,
            events: Arc::new(LoggingEventHandler),
            running: Arc::new(AtomicBool::new(false)),
            is_processing: Arc::new(AtomicBool::new(false)),
            loop_handle: AsyncMutex::new(None),
        }
    }

    pub fn with_event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.events = handler;
        self
    }

    /// Idempotent: a second call while already running logs a warning and
    /// returns without spawning a duplicate loop.
    pub async fn start(self: &Arc<Self>) -> Result<()> {
        if self.running.swap(true, Ordering::SeqCst) {
            log::warn!("Agent::start called while already running");
            return Ok(());
        }
        self.perceiver.start_observing().await?;

        let this = Arc::clone(self);
        let handle = tokio::spawn(async move {
            while this.running.load(Ordering::SeqCst) {
                let delay = match this.run_cycle().await {
                    Ok(()) => QUIESCENCE_DELAY,
                    Err(e) => {
                        log::error!("decision cycle failed: {}", e);
                        this.state_machine.transition_to_error(e.to_string()).await;
                        this.events.on_event(&AgentEvent::CycleFailed { error: e.to_string() }).await;
                        ERROR_RETRY_DELAY
                    }
                };
                if !this.running.load(Ordering::SeqCst) {
                    break;
                }
                tokio::time::sleep(delay).await;
            }
        });
        *self.loop_handle.lock().await = Some(handle);
        Ok(())
    }

    /// Cooperative: flips the running flag, stops the perceiver's timer, and
    /// forces the state machine back to idle. The in-flight cycle, if any,
    /// runs to completion.
    pub async fn stop(&self) {
        self.running.store(false, Ordering::SeqCst);
        self.perceiver.stop_observing();
        if let Some(handle) = self.loop_handle.lock().await.take() {
            let _ = handle.await;
        }
        self.state_machine.reset().await;
    }

    async fn run_cycle(&self) -> Result<()> {
        if self.is_processing.swap(true, Ordering::SeqCst) {
            log::warn!("run_cycle invoked while a cycle is already in flight; skipping");
            return Ok(());
        }
        let result = self.run_cycle_inner().await;
        self.is_processing.store(false, Ordering::SeqCst);
        result
    }

    async fn run_cycle_inner(&self) -> Result<()> {
        self.events.on_event(&AgentEvent::CycleStarted).await;

        // 1. Observe.
        let snapshot = self.perceiver.observe().await?;
        self.inventory.update_inventory_snapshot().await;
        self.memory.update_world_snapshot(snapshot.clone()).await;
        self.persistence
            .insert_world_state(snapshot.position, snapshot.health, snapshot.food, snapshot.dimension.clone())
            .await?;
        self.events.on_event(&AgentEvent::ObservationCompleted { dangers: snapshot.dangers.clone() }).await;

        // 2. Assess.
        let summary = self.inventory.get_inventory_summary().await;
        let resources = self.inventory.check_resources().await;
        let (decision, readiness) = self.strategy.assess(&summary, &resources, snapshot.health, snapshot.food);

        // 3. Plan.
        self.state_machine
            .transition(BotState::Planning, Some("assess complete".to_string()), |_| Ok(()), |_| Ok(()))
            .await?;
        let situation = format!(
            "Phase: {:?}. Priority: {:?}. Recommended action: {}. Rationale: {}. Ready: {} (missing: {}). Estimated time: {}s.",
            decision.phase,
            decision.priority,
            decision.action,
            decision.rationale,
            readiness.ready,
            readiness.missing.join(", "),
            decision.estimated_seconds,
        );
        self.memory.add_message(Message::user(situation)).await;

        // 4. Decide.
        self.events.on_event(&AgentEvent::LlmCallStarted).await;
        let context = self.memory.build_context(&ContextOptions { include_world_summary: true, include_goals: true }).await;
        let tool_declarations = self.tools.list_tools();
        let max_tool_iterations = if matches!(decision.priority, Priority::Critical) { 2 } else { 5 };
        let options = ChatOptions { max_tool_iterations: Some(max_tool_iterations), ..Default::default() };
        let result = self.llm.chat_with_tools(&context, &tool_declarations, Arc::clone(&self.tools), &options).await?;

        if let Some(usage) = result.usage {
            self.memory.update_token_usage(usage.clone()).await;
            self.events
                .on_event(&AgentEvent::LlmCallCompleted { tokens_used: Some(usage), response_length: result.content.len() })
                .await;
        } else {
            self.events.on_event(&AgentEvent::LlmCallCompleted { tokens_used: None, response_length: result.content.len() }).await;
        }
        if !result.content.is_empty() {
            self.memory.add_message(Message::assistant(result.content.clone())).await;
        }

        // 5. Reflect on executed tools: transition after the handler ran.
        for call in &result.tool_calls {
            self.events
                .on_event(&AgentEvent::ToolCallDetected { tool_name: call.name.clone(), parameters: call.arguments.clone() })
                .await;
            self.events
                .on_event(&AgentEvent::ToolExecutionCompleted { tool_name: call.name.clone(), success: true, error: None })
                .await;
        }
        // Enter the matching activity state if the last tool warrants one, then
        // return to idle regardless of whether that transition was accepted —
        // the table may legally reject it (e.g. from `planning`), and the cycle
        // must still end at idle rather than stranded mid-activity.
        if let Some(state) = result.tool_calls.last().and_then(|call| state_for_tool(&call.name)) {
            self.state_machine.transition(state, None, |_| Ok(()), |_| Ok(())).await?;
        }
        self.state_machine.transition(BotState::Idle, None, |_| Ok(()), |_| Ok(())).await?;

        // 6. Persist.
        self.memory.save_to_database().await?;

        self.events.on_event(&AgentEvent::CycleCompleted { duration_ms: 0 }).await;
        Ok(())
    }

    pub async fn enqueue_goal(&self, goal: Goal) -> Result<()> {
        self.persistence.insert_goal(goal).await
    }

    pub async fn active_goals(&self) -> Vec<Goal> {
        self.persistence.get_pending_goals().await
    }

    pub fn client(&self) -> Arc<dyn GameClient> {
        Arc::clone(&self.client)
    }
}

fn state_for_tool(tool_name: &str) -> Option<BotState> {
    match tool_name {
        "mine_block" => Some(BotState::Mining),
        "craft_item" => Some(BotState::Crafting),
        "goto_location" => Some(BotState::Navigating),
        "eat_food" => Some(BotState::Eating),
        _ => None,
    }
}

/// Builds the canonical tool registry wired against a single `GameClient`
/// capability bundle — the composition root used by the process entry point.
pub fn build_tool_registry(client: Arc<dyn GameClient>, perceiver: Arc<WorldPerceiver>, inventory: Arc<InventoryTracker>) -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    let ctx = Arc::new(ToolContext { client, perceiver, inventory });
    crate::tools::register_game_tools(&mut registry, ctx);
    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game_client::FakeGameClient;
    use crate::llm::{ChatResult, ToolChatResult};
    use crate::world::{Position, ScanPolicy};
    use async_trait::async_trait;
    use tokio::sync::mpsc;

    struct NoopBridge;

    #[async_trait]
    impl LlmBridge for NoopBridge {
        async fn chat(&self, _messages: &[Message], _options: &ChatOptions) -> Result<ChatResult> {
            Ok(ChatResult { content: String::new(), usage: None })
        }
        async fn stream_chat(&self, _messages: &[Message], _options: &ChatOptions) -> Result<mpsc::Receiver<String>> {
            let (_tx, rx) = mpsc::channel(1);
            Ok(rx)
        }
        async fn chat_with_tools(
            &self,
            _messages: &[Message],
            _tool_declarations: &[crate::tools::ToolMetadata],
            _registry: Arc<ToolRegistry>,
            _options: &ChatOptions,
        ) -> Result<ToolChatResult> {
            Ok(ToolChatResult { content: "looks safe".to_string(), tool_calls: vec![], usage: None })
        }
    }

    fn build_agent(dir: &std::path::Path) -> Arc<Agent> {
        let client: Arc<dyn GameClient> = Arc::new(FakeGameClient {
            spawned: true,
            position: Some(Position { x: 0.0, y: 64.0, z: 0.0 }),
            health: 20.0,
            food: 20.0,
            dimension: "overworld".to_string(),
            ..Default::default()
        });
        let perceiver = Arc::new(WorldPerceiver::new(Arc::clone(&client), ScanPolicy::default()));
        let inventory = Arc::new(InventoryTracker::new(Arc::clone(&client)));
        let persistence = Arc::new(PersistencePort::open(dir).unwrap());
        let memory = Arc::new(Memory::new(Arc::clone(&persistence), 100_000, 20));
        let state_machine = Arc::new(StateMachine::new());
        let tools = Arc::new(build_tool_registry(Arc::clone(&client), Arc::clone(&perceiver), Arc::clone(&inventory)));

        Arc::new(Agent::new(AgentDeps {
            client,
            perceiver,
            inventory,
            memory,
            state_machine,
            tools,
            llm: Arc::new(NoopBridge),
            persistence,
            strategy: Arc::new(crate::strategy::SpeedrunStrategy),
        }))
    }

    #[tokio::test]
    async fn single_cycle_returns_to_idle() {
        let dir = tempfile::tempdir().unwrap();
        let agent = build_agent(dir.path());
        agent.run_cycle().await.unwrap();
        assert!(agent.state_machine.is_idle().await);
    }

    #[tokio::test]
    async fn concurrent_cycle_is_skipped_not_queued() {
        let dir = tempfile::tempdir().unwrap();
        let agent = build_agent(dir.path());
        agent.is_processing.store(true, Ordering::SeqCst);
        agent.run_cycle().await.unwrap();
        // is_processing remains as we set it; run_cycle bailed immediately.
        assert!(agent.is_processing.load(Ordering::SeqCst));
    }
}
