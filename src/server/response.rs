use crate::domain::model::AppError;
use serde::Serialize;
use std::convert::Infallible;
use tracing::{error, warn};
use warp::http::StatusCode;
use warp::{Rejection, Reply};

/// 对外统一的错误响应体，不包含内部细节
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: &'static str,
}

pub fn reject(err: AppError) -> Rejection {
    warp::reject::custom(err)
}

pub fn status_of(err: &AppError) -> StatusCode {
    match err {
        AppError::MalformedArchive(_)
        | AppError::NoPayloadFound
        | AppError::InvalidHeader(_)
        | AppError::InvalidInput(_) => StatusCode::BAD_REQUEST,
        AppError::OversizedInput { .. } => StatusCode::PAYLOAD_TOO_LARGE,
        AppError::DeadlineExceeded => StatusCode::REQUEST_TIMEOUT,
        AppError::StorageFailure(_) | AppError::Pool(_) | AppError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

pub async fn handle_rejection(err: Rejection) -> Result<impl Reply, Infallible> {
    let (status, message) = if let Some(app_err) = err.find::<AppError>() {
        let status = status_of(app_err);
        if status.is_server_error() {
            error!(error = %app_err, "request failed");
        } else {
            warn!(error = %app_err, "request rejected");
        }
        (status, app_err.public_message())
    } else if err.is_not_found() {
        (StatusCode::NOT_FOUND, "not found")
    } else if err.find::<warp::reject::PayloadTooLarge>().is_some() {
        (StatusCode::PAYLOAD_TOO_LARGE, "file too large")
    } else if err.find::<warp::reject::InvalidQuery>().is_some() {
        (StatusCode::BAD_REQUEST, "invalid request parameters")
    } else if err.find::<warp::reject::MethodNotAllowed>().is_some() {
        (StatusCode::METHOD_NOT_ALLOWED, "method not allowed")
    } else if err.find::<warp::reject::InvalidHeader>().is_some()
        || err.find::<warp::reject::MissingHeader>().is_some()
        || err.find::<warp::reject::UnsupportedMediaType>().is_some()
    {
        (StatusCode::BAD_REQUEST, "failed to process file")
    } else {
        error!(rejection = ?err, "unhandled rejection");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    };

    let body = warp::reply::json(&ErrorResponse {
        code: status.as_u16(),
        message,
    });
    Ok(warp::reply::with_status(body, status))
}
