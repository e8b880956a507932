use crate::server::response::reject;
use crate::server::AppState;
use serde_json::json;
use warp::{Rejection, Reply};

pub mod price_handlers;

pub fn index() -> &'static str {
    "Welcome to price archive!"
}

pub fn ping() -> &'static str {
    "ping pong!"
}

pub fn version() -> String {
    format!("price archive version {}", env!("CARGO_PKG_VERSION"))
}

pub async fn health(state: AppState) -> Result<impl Reply, Rejection> {
    state.service.health_check().await.map_err(reject)?;
    Ok(warp::reply::json(&json!({ "status": "ok" })))
}
