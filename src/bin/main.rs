use country_finance_agent::{report::render_text, AppConfig, CountryFinanceAgent};
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    // Load environment variables
    dotenv::dotenv().ok();

    let country = std::env::args().skip(1).collect::<Vec<_>>().join(" ");
    if country.trim().is_empty() {
        eprintln!("Usage: country-agent <country name>");
        eprintln!("Try countries like Japan, India, USA, UK, China, or South Korea");
        std::process::exit(2);
    }

    let config = AppConfig::from_env()?;
    let agent = CountryFinanceAgent::from_config(&config)?;

    info!(country = %country.trim(), "Country Finance Agent starting");

    let report = agent.run(&country).await;
    println!("{}", render_text(&report));

    Ok(())
}
