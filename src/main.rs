use price_archive::config::Settings;
use price_archive::server;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    listen_tracing::setup_tracing();
    tracing::info!("Starting price archive...");

    let settings = Settings::from_env()?;
    server::start(settings).await
}
