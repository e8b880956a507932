use anyhow::{bail, Context, Result};
use dotenv::dotenv;
use std::env;
use std::net::SocketAddr;
use std::time::Duration;
use tracing::info;

pub const DEFAULT_SERVER_ADDR: &str = "127.0.0.1:8080";
pub const DEFAULT_MAX_FILE_SIZE: u64 = 10 * 1024 * 1024; // 10 MB
pub const DEFAULT_UPLOAD_TIMEOUT: Duration = Duration::from_secs(60);
pub const DEFAULT_DATABASE_URL: &str = "prices.db";
pub const DEFAULT_POOL_SIZE: u32 = 8;

const MIN_UPLOAD_TIMEOUT: Duration = Duration::from_secs(5);
const MAX_UPLOAD_TIMEOUT: Duration = Duration::from_secs(3600);

#[derive(Debug, Clone)]
pub struct ServerSettings {
    pub addr: SocketAddr,
    /// 上传文件（以及解压后负载）的最大字节数
    pub max_file_size: u64,
    /// 单次导入请求的整体截止时间
    pub upload_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct DatabaseSettings {
    pub url: String,
    pub pool_size: u32,
}

#[derive(Debug, Clone)]
pub struct Settings {
    pub server: ServerSettings,
    pub database: DatabaseSettings,
}

impl Settings {
    /// 从进程环境变量加载配置，存在 `.env` 时先读取
    pub fn from_env() -> Result<Self> {
        dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let addr = get("SERVER_ADDR")
            .unwrap_or_else(|| DEFAULT_SERVER_ADDR.to_string())
            .parse::<SocketAddr>()
            .context("invalid SERVER_ADDR")?;

        let max_file_size = match get("MAX_FILE_SIZE") {
            Some(raw) => parse_file_size(&raw).context("invalid MAX_FILE_SIZE")?,
            None => DEFAULT_MAX_FILE_SIZE,
        };

        let upload_timeout = match get("FILE_UPLOAD_TIMEOUT_SECS") {
            Some(raw) => Duration::from_secs(
                raw.parse::<u64>()
                    .context("invalid FILE_UPLOAD_TIMEOUT_SECS")?,
            ),
            None => DEFAULT_UPLOAD_TIMEOUT,
        };

        let pool_size = match get("DATABASE_POOL_SIZE") {
            Some(raw) => raw.parse::<u32>().context("invalid DATABASE_POOL_SIZE")?,
            None => DEFAULT_POOL_SIZE,
        };

        let settings = Settings {
            server: ServerSettings {
                addr,
                max_file_size,
                upload_timeout,
            },
            database: DatabaseSettings {
                url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
                pool_size,
            },
        };
        settings.validate().context("invalid configuration")?;

        info!(
            addr = %settings.server.addr,
            max_file_size = settings.server.max_file_size,
            upload_timeout_secs = settings.server.upload_timeout.as_secs(),
            database = %settings.database.url,
            "configuration loaded"
        );
        Ok(settings)
    }

    pub fn validate(&self) -> Result<()> {
        if self.server.max_file_size == 0 {
            bail!("max_file_size must be greater than 0");
        }
        if self.server.upload_timeout < MIN_UPLOAD_TIMEOUT {
            bail!(
                "file_upload_timeout must be at least {} seconds",
                MIN_UPLOAD_TIMEOUT.as_secs()
            );
        }
        if self.server.upload_timeout > MAX_UPLOAD_TIMEOUT {
            bail!(
                "file_upload_timeout must be at most {} seconds",
                MAX_UPLOAD_TIMEOUT.as_secs()
            );
        }
        if self.database.pool_size == 0 {
            bail!("database pool_size must be at least 1");
        }
        Ok(())
    }
}

/// 解析 `1024`、`512KB`、`10MB`、`1GB`（按 1024 进位）为字节数
pub fn parse_file_size(value: &str) -> Result<u64> {
    let value = value.trim();
    let (digits, multiplier) = if let Some(n) = value.strip_suffix("KB") {
        (n, 1024)
    } else if let Some(n) = value.strip_suffix("MB") {
        (n, 1024 * 1024)
    } else if let Some(n) = value.strip_suffix("GB") {
        (n, 1024 * 1024 * 1024)
    } else {
        (value, 1)
    };

    let number = digits
        .trim()
        .parse::<u64>()
        .with_context(|| format!("not a file size: {:?}", value))?;
    number
        .checked_mul(multiplier)
        .with_context(|| format!("file size overflows: {:?}", value))
}
