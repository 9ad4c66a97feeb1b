use std::sync::Arc;

use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use smartrss::app::AppContext;
use smartrss::cli::{commands, Cli, Commands};
use smartrss::config::Config;
use smartrss::daemon::{Daemon, DaemonConfig};
use smartrss::domain::FulltextMode;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = match cli.config {
        Some(ref path) => Config::load_from(path)?,
        None => Config::load()?,
    };
    let ctx = AppContext::new(config)?;

    match cli.command {
        Commands::Add {
            url,
            fulltext,
            selector,
            update_every,
            folder,
        } => {
            let options = commands::AddOptions {
                url,
                fulltext: FulltextMode::try_from(fulltext).map_err(anyhow::Error::msg)?,
                selector,
                update_every,
                folder,
            };
            commands::add_source(&ctx, options).await?;
        }
        Commands::Remove { url } => {
            commands::remove_source(&ctx, &url)?;
        }
        Commands::Update { force } => {
            commands::update_sources(&ctx, force).await?;
        }
        Commands::List { items } => {
            if items {
                commands::list_items(&ctx)?;
            } else {
                commands::list_sources(&ctx)?;
            }
        }
        Commands::Extract { url, mode, selector } => {
            let mode = FulltextMode::try_from(mode).map_err(anyhow::Error::msg)?;
            commands::extract_page(&ctx, &url, mode, selector).await?;
        }
        Commands::Daemon { tick } => {
            let config = DaemonConfig {
                tick_secs: DaemonConfig::parse_interval(&tick).map_err(anyhow::Error::msg)?,
            };
            Daemon::new(Arc::new(ctx), config).run().await?;
        }
    }

    Ok(())
}
