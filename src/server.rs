use crate::config::{ServerSettings, Settings};
use crate::domain::service::price_service::PriceService;
use crate::infra::db::sqlite;
use anyhow::Context;
use std::convert::Infallible;
use warp::Filter;

mod response;
mod routes;

const APPLICATION_NAME: &str = "PRICE_ARCHIVE";

#[derive(Clone, Debug)]
pub struct AppState {
    pub service: PriceService,
    pub settings: ServerSettings,
}

impl AppState {
    pub fn new(service: PriceService, settings: ServerSettings) -> Self {
        Self { service, settings }
    }
}

/// 全部路由，拒绝统一转换为通用 JSON 错误
pub fn app(
    state: AppState,
) -> impl Filter<Extract = impl warp::Reply, Error = Infallible> + Clone {
    routes::routes(state).recover(response::handle_rejection)
}

pub async fn start(settings: Settings) -> anyhow::Result<()> {
    let pool = sqlite::make_sqlite_pool(&settings.database)
        .with_context(|| format!("failed to open database {}", settings.database.url))?;
    sqlite::initialize(&pool).context("failed to initialize database schema")?;

    let service = PriceService::new(pool, settings.server.max_file_size);
    let app_state = AppState::new(service, settings.server.clone());

    let routes = app(app_state).with(warp::log(APPLICATION_NAME));

    let (bind_address, server) = warp::serve(routes)
        .try_bind_with_graceful_shutdown(settings.server.addr, shutdown_signal())
        .context("failed to bind server address")?;

    tracing::info!("You can access the server at {}", bind_address);
    server.await;
    tracing::info!("Server shut down gracefully.");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutting down gracefully...");
}
