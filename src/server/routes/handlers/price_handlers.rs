use crate::domain::model::{AppError, AppResult};
use crate::ingest::archive::ArchiveFormat;
use crate::ingest::filter::{PriceFilter, PriceQuery};
use crate::server::response::reject;
use crate::server::AppState;
use bytes::Buf;
use futures::{pin_mut, TryStreamExt};
use serde::Deserialize;
use tracing::debug;
use warp::http::header::{CONTENT_DISPOSITION, CONTENT_TYPE};
use warp::multipart::FormData;
use warp::{Rejection, Reply};

/// multipart 表单中上传文件的字段名
pub const FILE_FIELD: &str = "file";

#[derive(Debug, Default, Deserialize)]
pub struct UploadQuery {
    #[serde(rename = "type")]
    pub archive_type: Option<String>,
}

pub async fn post_prices(
    query: UploadQuery,
    form: FormData,
    state: AppState,
) -> Result<impl Reply, Rejection> {
    let format = ArchiveFormat::from_hint(query.archive_type.as_deref());
    let upload = read_file_part(form, state.settings.max_file_size)
        .await
        .map_err(reject)?;
    debug!(bytes = upload.len(), ?format, "upload received");

    let stats = state
        .service
        .import(upload, format, state.settings.upload_timeout)
        .await
        .map_err(reject)?;
    Ok(warp::reply::json(&stats))
}

pub async fn get_prices(query: PriceQuery, state: AppState) -> Result<impl Reply, Rejection> {
    let format = ArchiveFormat::from_hint(query.archive_type.as_deref());
    let filter = PriceFilter::try_from(&query).map_err(reject)?;

    let archive = state.service.export(filter, format).await.map_err(reject)?;
    let disposition = format!("attachment; filename=\"{}\"", format.download_name());

    let reply = warp::reply::with_header(archive, CONTENT_TYPE, format.content_type());
    Ok(warp::reply::with_header(reply, CONTENT_DISPOSITION, disposition))
}

/// 缓存 `file` 字段内容，超过 `limit` 立即停止
async fn read_file_part(form: FormData, limit: u64) -> AppResult<Vec<u8>> {
    pin_mut!(form);
    while let Some(part) = form.try_next().await.map_err(invalid_form)? {
        if part.name() != FILE_FIELD {
            continue;
        }

        let mut data = Vec::new();
        let stream = part.stream();
        pin_mut!(stream);
        while let Some(mut chunk) = stream.try_next().await.map_err(invalid_form)? {
            if (data.len() + chunk.remaining()) as u64 > limit {
                return Err(AppError::OversizedInput { limit });
            }
            while chunk.has_remaining() {
                let bytes = chunk.chunk();
                let n = bytes.len();
                data.extend_from_slice(bytes);
                chunk.advance(n);
            }
        }
        return Ok(data);
    }
    Err(AppError::InvalidInput(format!("missing form field {:?}", FILE_FIELD)))
}

fn invalid_form(err: warp::Error) -> AppError {
    AppError::InvalidInput(format!("multipart: {}", err))
}
