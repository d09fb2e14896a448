//! Process entry point (spec §6): loads configuration, wires every
//! process-wide singleton, and serves the tool catalog over stdio until
//! asked to shut down.

mod config;
mod http_generate;
mod mcp;

use config::Config;
use http_generate::HttpGenerateFn;
use mcp::McpServer;
use reasoning_arbiter::{ArbiterConfig, ProviderArbiter};
use reasoning_cache::{CacheConfig, ReasoningCache};
use reasoning_health::{
    EventBus, EventBusCheck, HealthRegistry, MemoryCheck, ProviderAvailabilityCheck, StartupCheck,
};
use reasoning_memory::MemoryProtocol;
use reasoning_provider::{GenericHttpProvider, InMemoryCodeReader, Provider};
use reasoning_session::{SessionManager, SessionStore};
use reasoning_tool::{ModelRegistry, ToolDispatcher};
use reasoning_tournament::TournamentEngine;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

const SERVER_NAME: &str = "reasoning-orchestration-server";
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;
    let filter = EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_providers(config: &Config, reader: Arc<InMemoryCodeReader>) -> Vec<Arc<dyn Provider>> {
    let primary = Arc::new(GenericHttpProvider::new(
        "primary",
        0,
        config.api_key_primary.is_some(),
        Arc::new(HttpGenerateFn::new(
            config.endpoint_primary.clone(),
            config.model_primary.clone(),
            config.api_key_primary.clone().unwrap_or_default(),
        )),
        reader.clone(),
    ));
    let secondary = Arc::new(GenericHttpProvider::new(
        "secondary",
        1,
        config.api_key_secondary.is_some(),
        Arc::new(HttpGenerateFn::new(
            config.endpoint_secondary.clone(),
            config.model_secondary.clone(),
            config.api_key_secondary.clone().unwrap_or_default(),
        )),
        reader,
    ));
    vec![primary, secondary]
}

async fn install_signal_handlers() {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};
        let mut sigterm = signal(SignalKind::terminate()).expect("install SIGTERM handler");
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                tracing::info!("received SIGINT, shutting down");
            }
            _ = sigterm.recv() => {
                tracing::info!("received SIGTERM, shutting down");
            }
        }
    }
    #[cfg(not(unix))]
    {
        let _ = tokio::signal::ctrl_c().await;
        tracing::info!("received ctrl-c, shutting down");
    }
}

#[tokio::main]
async fn main() {
    let config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("configuration error: {e}");
            std::process::exit(1);
        }
    };

    init_tracing(&config.log_level);
    tracing::info!(version = SERVER_VERSION, "starting up");

    let startup_complete = Arc::new(AtomicBool::new(false));

    let reader = Arc::new(InMemoryCodeReader::default());
    let providers = build_providers(&config, reader);

    let cache = Arc::new(ReasoningCache::new(CacheConfig {
        max_entries: config.cache_max_entries,
        max_memory_bytes: config.cache_max_bytes,
        ttl_ms: config.cache_ttl_seconds * 1000,
        ..CacheConfig::default()
    }));

    let arbiter = Arc::new(ProviderArbiter::new(
        providers.clone(),
        Some(Arc::clone(&cache)),
        ArbiterConfig {
            circuit_failure_threshold: config.circuit_failure_threshold,
            circuit_reset_seconds: config.circuit_reset_seconds,
            cost_budget: config.cost_budget_usd,
        },
    ));

    let session_store = Arc::new(SessionStore::new(config.max_sessions, config.session_ttl_seconds));
    let session_manager = SessionManager::new(Arc::clone(&session_store), Arc::clone(&arbiter))
        .with_max_turns(config.max_session_turns);
    let tournaments = TournamentEngine::new(Arc::clone(&arbiter), session_manager.clone());

    let mut health = HealthRegistry::new();
    health.register(Arc::new(MemoryCheck::new(config.memory_limit_bytes)));
    health.register(Arc::new(StartupCheck::new(Arc::clone(&startup_complete))));
    health.register(Arc::new(EventBusCheck::new(Arc::new(EventBus::spawn()), 1000)));
    health.register(Arc::new(ProviderAvailabilityCheck::new(Arc::clone(&arbiter))));
    let health = Arc::new(health);

    let memory = Arc::new(MemoryProtocol::new(
        reasoning_memory::DEFAULT_MAX_CHECKPOINTS,
        reasoning_memory::DEFAULT_THOUGHTS_PER_CHECKPOINT,
        config.memory_checkpoint_path.clone(),
    ));

    let models = ModelRegistry::new(providers);
    let dispatcher = Arc::new(ToolDispatcher::new(
        Arc::clone(&arbiter),
        session_manager,
        tournaments,
        Arc::clone(&health),
        models,
        config.workspace_root.clone(),
    ));

    // Periodic sweeps, spawned once wiring is otherwise complete (spec §4.6,
    // §4.9, §4.11).
    {
        let cache = Arc::clone(&cache);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_millis(cache.sweep_interval_ms()));
            loop {
                ticker.tick().await;
                cache.sweep().await;
            }
        });
    }
    {
        let store = Arc::clone(&session_store);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(Duration::from_secs(
                reasoning_session::DEFAULT_SWEEP_INTERVAL_SECONDS,
            ));
            loop {
                ticker.tick().await;
                let expired = store.sweep_expired().await;
                if !expired.is_empty() {
                    tracing::info!(count = expired.len(), "swept expired sessions");
                }
            }
        });
    }
    Arc::clone(&health).spawn_scheduled(config.health_interval_seconds);

    startup_complete.store(true, Ordering::Release);
    tracing::info!("startup wiring complete, serving over stdio");

    let server = McpServer::new(dispatcher, session_store, arbiter, memory, SERVER_NAME, SERVER_VERSION);

    tokio::select! {
        result = server.serve_stdio() => {
            if let Err(e) = result {
                tracing::error!(error = %e, "mcp server exited with an error");
                std::process::exit(1);
            }
        }
        _ = install_signal_handlers() => {
            tracing::info!("shutdown signal received, exiting");
        }
    }
}
