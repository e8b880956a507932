use super::AppState;
use crate::domain::model::AppError;
use crate::ingest::filter::PriceQuery;
use crate::server::response::reject;
use crate::server::routes::handlers::price_handlers::{get_prices, post_prices, UploadQuery};
use warp::{self, Filter, Rejection};

pub mod handlers;

/// multipart 边界与表单头部的额外余量
const MULTIPART_OVERHEAD: u64 = 16 * 1024;

pub fn routes(
    state: AppState,
) -> impl Filter<Extract = impl warp::Reply, Error = warp::Rejection> + Clone {
    let api = warp::path("api");

    let ping = api
        .and(warp::path("ping"))
        .and(warp::path::end())
        .and(warp::get())
        .map(handlers::ping);
    let version = api
        .and(warp::path("version"))
        .and(warp::path::end())
        .and(warp::get())
        .map(handlers::version);
    let health = api
        .and(warp::path("health"))
        .and(warp::path::end())
        .and(warp::get())
        .and(with_state(state.clone()))
        .and_then(handlers::health);

    let form_limit = state.settings.max_file_size.saturating_add(MULTIPART_OVERHEAD);
    let prices = api.and(warp::path("v0")).and(warp::path("prices")).and(warp::path::end());

    let upload = prices
        .and(warp::post())
        .and(warp::query::<UploadQuery>())
        .and(content_length_limit(form_limit))
        .and(warp::multipart::form().max_length(form_limit))
        .and(with_state(state.clone()))
        .and_then(post_prices);
    let download = prices
        .and(warp::get())
        .and(warp::query::<PriceQuery>())
        .and(with_state(state))
        .and_then(get_prices);

    warp::path::end()
        .and(warp::get())
        .map(handlers::index)
        .or(ping)
        .or(version)
        .or(health)
        .or(upload)
        .or(download)
}

fn with_state(
    state: AppState,
) -> impl Filter<Extract = (AppState,), Error = std::convert::Infallible> + Clone {
    warp::any().map(move || state.clone())
}

/// 在读取请求体之前按声明的长度拒绝
fn content_length_limit(limit: u64) -> impl Filter<Extract = (), Error = Rejection> + Clone {
    warp::header::optional::<u64>("content-length")
        .and_then(move |length: Option<u64>| async move {
            match length {
                Some(length) if length > limit => Err(reject(AppError::OversizedInput { limit })),
                _ => Ok(()),
            }
        })
        .untuple_one()
}
