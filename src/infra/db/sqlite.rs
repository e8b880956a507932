use crate::config::DatabaseSettings;
use crate::domain::model::AppResult;
use diesel::connection::SimpleConnection;
use diesel::r2d2::{ConnectionManager, CustomizeConnection, Pool, PoolError, PooledConnection};
use diesel::sqlite::SqliteConnection;
use std::time::Duration;
use tracing::{debug, info};

pub type SqlitePool = Pool<ConnectionManager<SqliteConnection>>;
pub type SqlitePooledConnection = PooledConnection<ConnectionManager<SqliteConnection>>;

const CREATE_PRICES_TABLE: &str = r#"
    CREATE TABLE IF NOT EXISTS prices (
        id BIGINT PRIMARY KEY NOT NULL,
        name TEXT NOT NULL,
        category TEXT NOT NULL,
        price_cents BIGINT NOT NULL CHECK (price_cents >= 0),
        create_date TIMESTAMP NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_prices_create_date ON prices (create_date);
"#;

/// 每个连接获取时设置的 PRAGMA
#[derive(Debug, Clone, Copy)]
struct ConnectionOptions {
    busy_timeout: Duration,
}

impl CustomizeConnection<SqliteConnection, diesel::r2d2::Error> for ConnectionOptions {
    fn on_acquire(&self, conn: &mut SqliteConnection) -> Result<(), diesel::r2d2::Error> {
        conn.batch_execute(&format!(
            "PRAGMA busy_timeout = {}; PRAGMA foreign_keys = ON;",
            self.busy_timeout.as_millis()
        ))
        .map_err(diesel::r2d2::Error::QueryError)
    }
}

/// 使用 r2d2 + diesel 初始化 SQLite 连接池
pub fn make_sqlite_pool(settings: &DatabaseSettings) -> Result<SqlitePool, PoolError> {
    let manager = ConnectionManager::<SqliteConnection>::new(settings.url.as_str());

    let pool = Pool::builder()
        .max_size(settings.pool_size)
        .min_idle(Some(1))
        .connection_timeout(Duration::from_secs(5))
        .idle_timeout(Some(Duration::from_secs(300)))
        .connection_customizer(Box::new(ConnectionOptions {
            busy_timeout: Duration::from_secs(5),
        }))
        .build(manager)?;

    info!(url = %settings.url, pool_size = settings.pool_size, "sqlite pool ready");
    Ok(pool)
}

/// prices 表不存在时创建
pub fn initialize(pool: &SqlitePool) -> AppResult<()> {
    debug!("initializing sqlite schema");
    let mut conn = pool.get()?;
    conn.batch_execute(CREATE_PRICES_TABLE)?;
    Ok(())
}

pub fn health_check(pool: &SqlitePool) -> AppResult<()> {
    debug!("sqlite healthz");
    let mut conn = pool.get()?;
    conn.batch_execute("SELECT 1")?;
    Ok(())
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::TempDir;

    /// 基于全新数据库文件的连接池，测试期间需持有 `TempDir`
    pub(crate) fn temp_pool() -> (TempDir, SqlitePool) {
        let dir = tempfile::tempdir().unwrap();
        let settings = DatabaseSettings {
            url: dir.path().join("prices.db").to_string_lossy().into_owned(),
            pool_size: 4,
        };
        let pool = make_sqlite_pool(&settings).unwrap();
        initialize(&pool).unwrap();
        (dir, pool)
    }
}
