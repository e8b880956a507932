use crate::domain::model::{AppError, AppResult};
use std::time::Instant;
use tracing::warn;

/// 超过截止时间返回 `DeadlineExceeded`，`None` 表示不限时
pub fn check_deadline(deadline: Option<Instant>) -> AppResult<()> {
    match deadline {
        Some(deadline) if Instant::now() >= deadline => {
            warn!("request deadline exceeded");
            Err(AppError::DeadlineExceeded)
        }
        _ => Ok(()),
    }
}
