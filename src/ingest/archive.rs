use crate::domain::model::{AppError, AppResult};
use std::io::{Cursor, Read, Write};
use std::path::Path;
use tracing::debug;

/// 归档内负载文件的扩展名
const PAYLOAD_EXTENSION: &str = "csv";

/// 写入归档条目的固定权限
const ENTRY_MODE: u32 = 0o600;

/// 各归档格式共享的解包/打包能力
pub trait Archiver: Send + Sync {
    /// 按归档原生顺序返回第一个 `.csv` 条目，最多读取 `limit` 字节
    fn extract(&self, archive: &[u8], limit: u64) -> AppResult<Vec<u8>>;

    /// 将 `payload` 打包为名为 `entry_name` 的唯一条目
    fn archive(&self, payload: &[u8], entry_name: &str) -> AppResult<Vec<u8>>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ArchiveFormat {
    Tar,
    #[default]
    Zip,
}

impl ArchiveFormat {
    /// `tar` 选择 tar，其余（包括未指定）默认 zip
    pub fn from_hint(hint: Option<&str>) -> Self {
        match hint {
            Some("tar") => ArchiveFormat::Tar,
            _ => ArchiveFormat::Zip,
        }
    }

    pub fn archiver(self) -> &'static dyn Archiver {
        match self {
            ArchiveFormat::Tar => &TarArchiver,
            ArchiveFormat::Zip => &ZipArchiver,
        }
    }

    pub fn extract(self, archive: &[u8], limit: u64) -> AppResult<Vec<u8>> {
        self.archiver().extract(archive, limit)
    }

    pub fn archive(self, payload: &[u8], entry_name: &str) -> AppResult<Vec<u8>> {
        self.archiver().archive(payload, entry_name)
    }

    pub fn content_type(self) -> &'static str {
        match self {
            ArchiveFormat::Tar => "application/x-tar",
            ArchiveFormat::Zip => "application/zip",
        }
    }

    pub fn download_name(self) -> &'static str {
        match self {
            ArchiveFormat::Tar => "data.tar",
            ArchiveFormat::Zip => "data.zip",
        }
    }
}

pub struct TarArchiver;

impl Archiver for TarArchiver {
    fn extract(&self, archive: &[u8], limit: u64) -> AppResult<Vec<u8>> {
        let mut tar = tar::Archive::new(Cursor::new(archive));
        let entries = tar.entries().map_err(malformed)?;

        for entry in entries {
            let entry = entry.map_err(malformed)?;
            if entry.header().entry_type().is_dir() {
                continue;
            }
            let is_csv = entry.path().map(|p| is_payload(&p)).map_err(malformed)?;
            if !is_csv {
                continue;
            }
            debug!(size = entry.header().size().unwrap_or_default(), "tar payload found");
            return read_capped(entry, limit);
        }

        Err(AppError::NoPayloadFound)
    }

    fn archive(&self, payload: &[u8], entry_name: &str) -> AppResult<Vec<u8>> {
        let mut builder = tar::Builder::new(Vec::new());

        let mut header = tar::Header::new_gnu();
        header.set_entry_type(tar::EntryType::Regular);
        header.set_size(payload.len() as u64);
        header.set_mode(ENTRY_MODE);
        header.set_mtime(0);

        builder
            .append_data(&mut header, entry_name, payload)
            .map_err(write_failed)?;
        builder.into_inner().map_err(write_failed)
    }
}

pub struct ZipArchiver;

impl Archiver for ZipArchiver {
    fn extract(&self, archive: &[u8], limit: u64) -> AppResult<Vec<u8>> {
        let mut zip = zip::ZipArchive::new(Cursor::new(archive)).map_err(malformed)?;

        for index in 0..zip.len() {
            let file = zip.by_index(index).map_err(malformed)?;
            // `foo.csv/` 这类目录条目不是负载
            if file.is_dir() || !is_payload(Path::new(file.name())) {
                continue;
            }
            debug!(name = file.name(), size = file.size(), "zip payload found");
            return read_capped(file, limit);
        }

        Err(AppError::NoPayloadFound)
    }

    fn archive(&self, payload: &[u8], entry_name: &str) -> AppResult<Vec<u8>> {
        let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = zip::write::FileOptions::default()
            .compression_method(zip::CompressionMethod::Deflated)
            .unix_permissions(ENTRY_MODE);

        writer.start_file(entry_name, options).map_err(write_failed)?;
        writer.write_all(payload).map_err(write_failed)?;
        let cursor = writer.finish().map_err(write_failed)?;
        Ok(cursor.into_inner())
    }
}

fn is_payload(path: &Path) -> bool {
    path.extension().map_or(false, |ext| ext == PAYLOAD_EXTENSION)
}

fn read_capped<R: Read>(reader: R, limit: u64) -> AppResult<Vec<u8>> {
    let mut payload = Vec::new();
    reader
        .take(limit.saturating_add(1))
        .read_to_end(&mut payload)
        .map_err(malformed)?;

    if payload.len() as u64 > limit {
        return Err(AppError::OversizedInput { limit });
    }
    Ok(payload)
}

fn malformed<E: std::fmt::Display>(err: E) -> AppError {
    AppError::MalformedArchive(err.to_string())
}

fn write_failed<E: std::fmt::Display>(err: E) -> AppError {
    AppError::Internal(format!("failed to build archive: {}", err))
}
