use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing::info;

use pricewatch::element_finder::SiteFamily;
use pricewatch::models::ProductsFile;
use pricewatch::runner::{RunOrchestrator, RunSummary};
use pricewatch::scraper::HtmlSnapshot;
use pricewatch::session::record_session;
use pricewatch::utils::logging;
use pricewatch::{AppConfig, PriceExtractor};

#[derive(Parser)]
#[command(name = "pricewatch", version, about = "Track product prices and alert on target drops")]
struct Cli {
    /// TOML configuration file (defaults to ./pricewatch.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Product list JSON, overriding paths.products_file
    #[arg(short, long, global = true)]
    products: Option<PathBuf>,

    /// Debug-level logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Open a visible browser on every product and save the session state
    Record,
    /// Check every product once
    Run,
    /// Run the selector table against a saved HTML page
    Probe {
        /// URL used to pick the site family
        #[arg(long)]
        url: String,
        /// Saved page markup
        #[arg(long)]
        html: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let mut config = AppConfig::load(cli.config.as_deref()).context("failed to load configuration")?;
    if let Some(products) = cli.products {
        config.paths.products_file = products;
    }

    let _log_guard = logging::init(cli.verbose, config.logging.directory.as_deref())?;
    info!("Starting pricewatch...");

    match cli.command {
        Command::Record => {
            let products = ProductsFile::load(&config.paths.products_file)
                .context("failed to load product list")?;
            record_session(&config.browser, &products, &config.paths.state_file).await?;
        }
        Command::Run => {
            let products = ProductsFile::load(&config.paths.products_file)
                .context("failed to load product list")?;
            let orchestrator = RunOrchestrator::new(config);
            let results = orchestrator.run(&products).await?;

            for result in &results {
                let price = result
                    .reading
                    .price
                    .map(|p| p.to_string())
                    .unwrap_or_else(|| "not found".to_string());
                println!("{}\t{}\t{:?}", result.reading.product_id, price, result.decision);
            }
            let summary = RunSummary::from_results(&results);
            println!(
                "{} checked, {} priced, {} not found, {} alerts",
                summary.checked, summary.priced, summary.not_found, summary.alerts
            );
        }
        Command::Probe { url, html } => {
            let markup = std::fs::read_to_string(&html)
                .with_context(|| format!("failed to read {}", html.display()))?;
            let page = HtmlSnapshot::new(markup);
            let extractor = PriceExtractor::new(config.extractor.clone());

            println!("site family: {}", SiteFamily::classify(&url));
            match extractor.read_price(&page, &url).await {
                Some(price) => println!("price: {}", price),
                None => println!("price: not found"),
            }
        }
    }

    info!("Shutting down...");
    Ok(())
}
