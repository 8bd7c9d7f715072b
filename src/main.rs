//! Maestro server binary.
//!
//! Loads configuration from the environment, wires the orchestrator and
//! serves the HTTP API.

use std::sync::Arc;

use secrecy::ExposeSecret;
use serde_json::json;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use maestro::adapters::agents::general_agent;
use maestro::adapters::http::{build_router, OrchestrationAppState};
use maestro::adapters::llm::MockReply;
use maestro::adapters::{
    InMemoryResultCache, InMemorySessionStore, LlmSummarizer, MockLlmAdapter, OpenAiAdapter,
    OpenAiConfig,
};
use maestro::application::{Orchestrator, SessionManager};
use maestro::config::AppConfig;
use maestro::domain::capability::CapabilityRegistry;
use maestro::ports::{LlmAdapter, ResultCache};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load()?;
    init_tracing(&config);
    config.validate()?;

    let llm = build_llm(&config)?;

    let mut registry = CapabilityRegistry::new();
    registry.register_group(general_agent(llm.clone()))?;
    let registry = Arc::new(registry);

    let mut sessions = SessionManager::from_config(
        &config.session,
        Arc::new(InMemorySessionStore::new()),
    );
    if config.orchestrator.use_llm_summarizer {
        sessions = sessions.with_summarizer(Arc::new(LlmSummarizer::new(llm.clone())));
    }
    let sessions = Arc::new(sessions);
    let cache: Arc<dyn ResultCache> = Arc::new(InMemoryResultCache::new());

    let sweeper = sessions
        .clone()
        .spawn_sweeper(config.session.sweep_interval(), Some(cache.clone()));

    let orchestrator = Arc::new(Orchestrator::from_config(
        &config,
        registry.clone(),
        llm,
        sessions,
        Some(cache),
    ));
    let app = build_router(OrchestrationAppState::new(orchestrator), &config.server);

    let addr = config.server.socket_addr()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!(
        %addr,
        capabilities = registry.public_count(),
        environment = ?config.server.environment,
        "Maestro listening"
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    sweeper.abort();
    info!("Maestro stopped");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.server.log_level));

    if config.server.is_production() {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json())
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer())
            .init();
    }
}

fn build_llm(config: &AppConfig) -> Result<Arc<dyn LlmAdapter>, Box<dyn std::error::Error>> {
    match config.llm.api_key.as_ref().filter(|_| config.llm.has_api_key()) {
        Some(key) => {
            let adapter = OpenAiAdapter::new(
                OpenAiConfig::new(key.expose_secret().clone())
                    .with_model(&config.llm.model)
                    .with_base_url(&config.llm.base_url)
                    .with_timeout(config.llm.timeout())
                    .with_max_retries(config.llm.max_retries),
            )?;
            Ok(Arc::new(adapter))
        }
        None => {
            warn!("No LLM API key configured, using offline mock adapter");
            // one reply shape that parses as both a plan and a synthesis
            let offline = MockLlmAdapter::new().with_fallback(MockReply::Json(json!({
                "decisions": [],
                "reasoning": "offline mode",
                "response": "I'm running without a language model, so I can only acknowledge your message.",
                "answer": "offline"
            })));
            Ok(Arc::new(offline))
        }
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for shutdown signal");
    }
    info!("Shutdown signal received");
}
