use health_turn_orchestrator::{
    agent::TurnOrchestrator,
    api::start_server,
    config::AppConfig,
    memory::{ContextSummarizer, MemoryCompactor},
    oracle::{gemini::GeminiClient, CompletionOracle},
    state::{InMemoryStateStore, PgStateStore, StateStore},
};
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AppConfig::from_env()?;

    if config.gemini_api_key.is_empty() {
        warn!("GEMINI_API_KEY not set in .env, every generation will fail");
    }

    info!("🚀 Health Turn Orchestrator - API Server");
    info!("📍 Port: {}", config.port);
    info!("🤖 Model: {}", config.gemini_model);

    // Create components
    let oracle: Arc<dyn CompletionOracle> = Arc::new(GeminiClient::new(
        config.gemini_api_key.clone(),
        config.gemini_model.clone(),
    )?);

    let store: Arc<dyn StateStore> = match config.database_url.as_deref() {
        Some(url) => Arc::new(PgStateStore::connect_lazy(url)?),
        None => {
            info!("State store backend: in-memory");
            Arc::new(InMemoryStateStore::new())
        }
    };

    let compactor = MemoryCompactor::with_config(
        ContextSummarizer::new(oracle.clone()),
        config.compaction.clone(),
    );

    // Create orchestrator
    let orchestrator = Arc::new(TurnOrchestrator::new(
        store,
        oracle,
        compactor,
        config.orchestrator.clone(),
    ));

    info!("✅ Orchestrator initialized");
    info!("📡 Starting API server...");

    start_server(orchestrator, config.port).await?;

    Ok(())
}
