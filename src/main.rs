use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod api;
mod cli;
mod config;
mod core;
mod http_client;
mod server;

use cli::{Cli, Commands};
use config::Config;

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("warn,studio=info,tower_http=info")),
        )
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();

    match cli.command.unwrap_or_else(|| Commands::Serve(Default::default())) {
        Commands::Serve(args) => {
            cli::commands::serve::run(args, &Config::load_or_create()?).await?;
        }
        Commands::Generate(args) => {
            cli::commands::generate::run(args, &Config::load_or_create()?).await?;
        }
        Commands::Edit(args) => {
            cli::commands::edit::run(args, &Config::load_or_create()?).await?;
        }
        Commands::Chat(args) => {
            cli::commands::chat::run(args, &Config::load_or_create()?).await?;
        }
        Commands::Models(args) => {
            cli::commands::models::run(args, &Config::load_or_create()?)?;
        }
        Commands::Config(args) => {
            // Edit the file as written; environment credentials are not persisted
            let mut config = Config::load_file()?;
            cli::commands::config::run(args, &mut config)?;
        }
    }

    Ok(())
}
