use country_finance_agent::{api::start_server, AppConfig, CountryFinanceAgent};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let config = AppConfig::from_env()?;

    info!("🚀 Country Finance Agent - API Server");
    info!("📍 Port: {}", config.api_port);

    let agent = Arc::new(CountryFinanceAgent::from_config(&config)?);

    info!("✅ Agent initialized");
    info!("📡 Starting API server...");

    start_server(agent, config.api_port).await?;

    Ok(())
}
