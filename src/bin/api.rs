use ledger_query_assistant::{
    aggregator::FinancialContextAggregator,
    agent::Orchestrator,
    api::start_server,
    completion::GeminiClient,
    config::AssistantConfig,
    ledger::{InMemoryLedger, LedgerStore, PgLedger},
    pipeline::FinancialPipeline,
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

    let config = AssistantConfig::from_env()?;

    if config.gemini_api_key.is_empty() {
        warn!("GEMINI_API_KEY not set; open-ended questions will get the generic error reply");
    }

    info!("Ledger Query Assistant - API Server");
    info!("Port: {}", config.port);

    let ledger: Arc<dyn LedgerStore> = match &config.database_url {
        Some(url) => {
            info!("Using Postgres ledger");
            Arc::new(PgLedger::connect_lazy(url, config.database_max_connections)?)
        }
        None => {
            warn!("No DATABASE_URL configured, using an empty in-memory ledger");
            Arc::new(InMemoryLedger::new())
        }
    };

    let provider = GeminiClient::new(
        config.gemini_api_key.clone(),
        &config.gemini_model,
        &config.gemini_base_url,
    )?;

    info!(endpoint = %provider.endpoint(), "Completion provider configured");

    let pipeline = FinancialPipeline::from_config(&config, Arc::new(provider))?;
    let orchestrator = Arc::new(Orchestrator::new(FinancialContextAggregator::new(ledger), pipeline));

    info!("Orchestrator initialized");

    start_server(orchestrator, config.port).await?;

    Ok(())
}
