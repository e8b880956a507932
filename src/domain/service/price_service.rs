use crate::domain::model::price::PriceStatistics;
use crate::domain::model::{AppError, AppResult};
use crate::domain::repository::price_repository::PriceRepository;
use crate::domain::repository::{BatchRepository, FilterableRepository};
use crate::infra::db::sqlite::{self, SqlitePool, SqlitePooledConnection};
use crate::ingest::archive::ArchiveFormat;
use crate::ingest::filter::PriceFilter;
use crate::ingest::{aggregate, parser};
use crate::util::check_deadline;
use std::time::{Duration, Instant};
use tracing::{info, instrument, warn};

/// 导出归档内 CSV 文件名
pub const EXPORT_ENTRY_NAME: &str = "data.csv";

/// 导入/导出入口，不持有请求状态，克隆后仅共享连接池
#[derive(Clone)]
pub struct PriceService {
    pool: SqlitePool,
    max_input_size: u64,
}

impl PriceService {
    pub fn new(pool: SqlitePool, max_input_size: u64) -> Self {
        Self {
            pool,
            max_input_size,
        }
    }

    /// 主入口：解包、解析、落库并返回统计
    ///
    /// 阻塞任务与外层 timeout 使用同一截止时间，被放弃的任务会回滚而不是延迟提交
    #[instrument(name = "import_prices", skip(self, upload), fields(size = upload.len()))]
    pub async fn import(
        &self,
        upload: Vec<u8>,
        format: ArchiveFormat,
        timeout: Duration,
    ) -> AppResult<PriceStatistics> {
        // 溢出时不设截止时间，外层 timeout 仍然生效
        let deadline = Instant::now().checked_add(timeout);
        let service = self.clone();
        let task = tokio::task::spawn_blocking(move || {
            service.import_blocking(&upload, format, deadline)
        });

        match tokio::time::timeout(timeout, task).await {
            Ok(joined) => joined.map_err(|err| AppError::Internal(err.to_string()))?,
            Err(_) => {
                warn!(timeout_secs = timeout.as_secs(), "import timed out");
                Err(AppError::DeadlineExceeded)
            }
        }
    }

    pub fn import_blocking(
        &self,
        upload: &[u8],
        format: ArchiveFormat,
        deadline: Option<Instant>,
    ) -> AppResult<PriceStatistics> {
        if upload.len() as u64 > self.max_input_size {
            return Err(AppError::OversizedInput {
                limit: self.max_input_size,
            });
        }

        let payload = format.extract(upload, self.max_input_size)?;
        check_deadline(deadline)?;

        let batch = parser::parse(payload.as_slice())?;
        check_deadline(deadline)?;

        let mut conn = self.connection()?;
        let store = PriceRepository::new(&mut conn).insert_and_aggregate(&batch.records, deadline)?;

        let stats = aggregate::assemble(&batch, &store);
        info!(
            ?format,
            total_count = stats.total_count,
            duplicates_count = stats.duplicates_count,
            accepted = batch.records.len(),
            store_duplicates = store.duplicates,
            "prices imported"
        );
        Ok(stats)
    }

    #[instrument(name = "export_prices", skip(self))]
    pub async fn export(&self, filter: PriceFilter, format: ArchiveFormat) -> AppResult<Vec<u8>> {
        let service = self.clone();
        tokio::task::spawn_blocking(move || service.export_blocking(&filter, format))
            .await
            .map_err(|err| AppError::Internal(err.to_string()))?
    }

    pub fn export_blocking(&self, filter: &PriceFilter, format: ArchiveFormat) -> AppResult<Vec<u8>> {
        let mut conn = self.connection()?;
        let records = PriceRepository::new(&mut conn).get_filtered(filter)?;

        let csv = parser::serialize(&records)?;
        let archive = format.archive(&csv, EXPORT_ENTRY_NAME)?;
        info!(rows = records.len(), bytes = archive.len(), ?format, "prices exported");
        Ok(archive)
    }

    pub async fn health_check(&self) -> AppResult<()> {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || sqlite::health_check(&pool))
            .await
            .map_err(|err| AppError::Internal(err.to_string()))?
    }

    fn connection(&self) -> AppResult<SqlitePooledConnection> {
        Ok(self.pool.get()?)
    }
}

impl std::fmt::Debug for PriceService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PriceService")
            .field("pool", &"<redacted>")
            .field("max_input_size", &self.max_input_size)
            .finish()
    }
}
