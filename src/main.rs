mod app;
mod capture;
mod commands;
mod config;
mod display;
mod error;
mod messages;
mod playback;
mod playlist;
mod services;
mod session;
mod track;

use app::App;
use config::Config;

use anyhow::Result;

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt::init();

    tracing::info!("Starting moodtune");

    // Load configuration
    let config = Config::load()?;
    config.validate()?;

    App::new(config).await?.run().await
}
