use diesel::r2d2::PoolError;
use diesel::result::Error as DieselError;
use thiserror::Error;

pub mod price;

pub type AppResult<T> = Result<T, AppError>;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Malformed archive: {0}")]
    MalformedArchive(String),

    #[error("No csv payload found in archive")]
    NoPayloadFound,

    #[error("Invalid header: {0}")]
    InvalidHeader(String),

    #[error("Storage failure: {0}")]
    StorageFailure(#[from] DieselError),

    #[error("Connection pool error: {0}")]
    Pool(#[from] PoolError),

    #[error("Input exceeds limit of {limit} bytes")]
    OversizedInput { limit: u64 },

    #[error("Deadline exceeded")]
    DeadlineExceeded,

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// 对外只暴露通用描述，细节留在日志里
    pub fn public_message(&self) -> &'static str {
        match self {
            AppError::MalformedArchive(_) => "failed to extract archive",
            AppError::NoPayloadFound => "no csv file found in the provided archive",
            AppError::InvalidHeader(_) => "failed to parse CSV",
            AppError::OversizedInput { .. } => "file too large",
            AppError::DeadlineExceeded => "request timed out",
            AppError::InvalidInput(_) => "invalid request parameters",
            AppError::StorageFailure(_) | AppError::Pool(_) | AppError::Internal(_) => {
                "internal server error"
            }
        }
    }
}

impl warp::reject::Reject for AppError {}
