use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use browser_client::BrowserClient;
use gpw_common::Config;
use gpw_scout::inputs::{load_identities, select_only};
use gpw_scout::staleness::StalenessLog;
use gpw_scout::{ScrapeDeps, ScrapeScheduler};
use gpw_store::Store;

#[derive(Parser)]
#[command(name = "gpw-scout", about = "Scrape GPW company profiles into SQLite")]
struct Cli {
    /// File with one company URL per line
    #[arg(long)]
    urls: Option<PathBuf>,

    /// SQLite database URL
    #[arg(long)]
    database: Option<String>,

    /// Companies scraped at the same time
    #[arg(long)]
    concurrency: Option<usize>,

    /// Skip companies scraped within this many hours
    #[arg(long)]
    freshness_hours: Option<i64>,

    /// Ignore the freshness window
    #[arg(long)]
    force: bool,

    /// Only scrape these companies (ISIN or URL). Repeatable.
    #[arg(long)]
    only: Vec<String>,

    /// Emit logs as JSON
    #[arg(long, env = "GPW_LOG_JSON")]
    log_json: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.log_json)?;

    info!("GPW scout starting...");

    let mut config = Config::from_env()?;
    if let Some(urls) = cli.urls {
        config.urls_file = urls;
    }
    if let Some(database) = cli.database {
        config.database_url = database;
    }
    if let Some(concurrency) = cli.concurrency {
        config.concurrency_limit = concurrency;
    }
    if let Some(hours) = cli.freshness_hours {
        config.freshness_window = chrono::Duration::hours(hours);
    }
    if cli.force {
        config.freshness_window = chrono::Duration::zero();
    }
    config.validate()?;
    config.log_redacted();

    ensure_database_dir(&config.database_url)?;
    let store = Store::connect(&config.database_url).await?;
    let staleness = StalenessLog::load(store.clone(), config.freshness_window).await?;

    let identities = load_identities(&config.urls_file)
        .await
        .with_context(|| format!("Reading {}", config.urls_file.display()))?;
    let identities = select_only(identities, &cli.only);
    if identities.is_empty() {
        info!("No companies to scrape");
        return Ok(());
    }

    let user_agent = Some(config.user_agent.as_str());
    let browser = match config.browser_ws_url {
        Some(ref ws_url) => {
            let token = config.browser_token.as_deref();
            BrowserClient::connect(ws_url, token, user_agent).await?
        }
        None => BrowserClient::launch(config.chrome_bin.as_deref(), user_agent).await?,
    };
    let browser = Arc::new(browser);

    let deps = ScrapeDeps::builder()
        .pages(browser.clone())
        .store(store)
        .staleness(Arc::new(staleness))
        .concurrency_limit(config.concurrency_limit)
        .build();

    let report = ScrapeScheduler::new(deps).run(identities).await;
    println!("{report}");

    match Arc::try_unwrap(browser) {
        Ok(browser) => browser.close().await?,
        Err(_) => tracing::warn!("Browser still shared at shutdown, leaving it to drop"),
    }

    Ok(())
}

fn init_tracing(json: bool) -> Result<()> {
    let filter = EnvFilter::from_default_env()
        .add_directive("gpw=info".parse()?)
        .add_directive("browser_client=info".parse()?);
    if json {
        tracing_subscriber::fmt().with_env_filter(filter).json().init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
    Ok(())
}

/// SQLite creates the file but not its parent directory.
fn ensure_database_dir(database_url: &str) -> Result<()> {
    let path = database_url
        .strip_prefix("sqlite://")
        .or_else(|| database_url.strip_prefix("sqlite:"))
        .map(|rest| rest.split('?').next().unwrap_or(rest));
    if let Some(path) = path.filter(|p| !p.is_empty() && !p.starts_with(':')) {
        if let Some(parent) = PathBuf::from(path).parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Creating {}", parent.display()))?;
        }
    }
    Ok(())
}
