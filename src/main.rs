//! Process entry point: loads configuration, wires the composition root, and
//! runs the Agent Loop until SIGINT/SIGTERM.

use std::sync::Arc;

use clap::Parser;
use gamecraft_agent::agent::{build_tool_registry, Agent, AgentDeps};
use gamecraft_agent::config::Cli;
use gamecraft_agent::game_client::{FakeGameClient, GameClient};
use gamecraft_agent::inventory::InventoryTracker;
use gamecraft_agent::llm::OpenAiCompatibleBridge;
use gamecraft_agent::memory::Memory;
use gamecraft_agent::persistence::PersistencePort;
use gamecraft_agent::state_machine::StateMachine;
use gamecraft_agent::strategy::SpeedrunStrategy;
use gamecraft_agent::world::{ScanPolicy, WorldPerceiver};
use gamecraft_agent::AgentConfig;

#[tokio::main]
async fn main() {
    env_logger::Builder::from_default_env()
        .filter_level(log::LevelFilter::Info)
        .init();

    if let Err(e) = run().await {
        log::error!("fatal: {}", e);
        std::process::exit(1);
    }
}

async fn run() -> gamecraft_agent::error::Result<()> {
    let cli = Cli::parse();
    let config = AgentConfig::load(&cli.config)?;

    log::info!(
        "starting {} against {} ({})",
        env!("CARGO_PKG_NAME"),
        config.llm.base_url,
        config.llm.model
    );

    // The crate ships no concrete game-protocol client (out of scope); a real
    // deployment swaps `FakeGameClient` for a connected implementation of
    // `GameClient` here.
    let client: Arc<dyn GameClient> = Arc::new(FakeGameClient::default());

    let perceiver = Arc::new(WorldPerceiver::new(Arc::clone(&client), ScanPolicy::default()));
    let inventory = Arc::new(InventoryTracker::new(Arc::clone(&client)));
    let persistence = Arc::new(PersistencePort::open(&config.persistence.path)?);
    let memory = Arc::new(Memory::new(
        Arc::clone(&persistence),
        config.memory.max_tokens,
        config.memory.keep_messages,
    ));
    let state_machine = Arc::new(StateMachine::new());
    let tools = Arc::new(build_tool_registry(Arc::clone(&client), Arc::clone(&perceiver), Arc::clone(&inventory)));
    let llm = Arc::new(OpenAiCompatibleBridge::new(
        config.llm.base_url.clone(),
        config.llm.api_key.clone(),
        config.llm.model.clone(),
    ));

    let agent = Arc::new(Agent::new(AgentDeps {
        client: Arc::clone(&client),
        perceiver,
        inventory,
        memory,
        state_machine,
        tools,
        llm,
        persistence,
        strategy: Arc::new(SpeedrunStrategy),
    }));

    agent.start().await?;
    log::info!("agent loop running, waiting for shutdown signal");
    wait_for_shutdown_signal().await;

    log::info!("shutdown signal received, stopping agent loop");
    agent.stop().await;
    client.disconnect().await;
    log::info!("shutdown complete");
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm = signal(SignalKind::terminate()).expect("SIGTERM handler installs");
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
}
