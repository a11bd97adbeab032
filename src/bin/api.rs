use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use umkm_advisor::{
    api::start_server, knowledge::KnowledgeStore, AdvisorConfig, SessionManager, SessionServices,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenv::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = AdvisorConfig::from_env()?;

    if config.llm.api_key.is_none() {
        warn!("LLM_API_KEY / GROQ_API_KEY not set in .env, answers come from the offline keyword model");
    }

    info!("INA - Asisten UMKM API Server");
    info!("Port: {}", config.port);
    info!("Model: {} @ {}", config.llm.model, config.llm.base_url);

    // Create components
    let knowledge = Arc::new(KnowledgeStore::initialize(&config).await?);
    let services = SessionServices::initialize(&config, knowledge.clone()).await?;
    let profiles = services.profiles.clone();
    let sessions = Arc::new(SessionManager::from_config(services, &config));

    info!("Orchestrator initialized");

    // Start API server
    let served = start_server(sessions, config.port).await;

    if let Err(e) = knowledge.shutdown().await {
        warn!("Failed to save knowledge index: {}", e);
    }
    profiles.shutdown().await;

    served
}
