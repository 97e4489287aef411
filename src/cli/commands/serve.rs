use anyhow::Result;
use clap::Args;

use crate::config::Config;
use crate::core::Studio;
use crate::server;

#[derive(Args, Default)]
pub struct ServeArgs {
    /// Address to listen on (overrides server.bind)
    #[arg(short, long)]
    pub bind: Option<String>,
}

pub async fn run(args: ServeArgs, config: &Config) -> Result<()> {
    let bind = args.bind.unwrap_or_else(|| config.server.bind.clone());
    let studio = Studio::from_config(config.clone());

    let availability = studio.availability();
    if !(availability.openai || availability.gemini) {
        tracing::warn!("No chat provider configured; /chat and /companion will fail");
    }

    server::serve(studio, &bind).await
}
