//! 记录写入服务 - 业务能力层
//!
//! 只负责"保存记录"能力，不关心流程，也不规定存储引擎。

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::StorageError;
use crate::models::record::Record;

/// 持久化契约：`save(Request|Output|Metrics|PromptPerformance)`
#[async_trait]
pub trait RecordStore: Send + Sync {
    async fn save(&self, record: Record) -> Result<(), StorageError>;
}

/// 追加写 JSON Lines 文件
pub struct JsonlRecordWriter {
    path: PathBuf,
    // 并发写入时保证一行不会被截断
    lock: Mutex<()>,
}

impl JsonlRecordWriter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write_error(&self, source: std::io::Error) -> StorageError {
        StorageError::WriteFailed {
            path: self.path.display().to_string(),
            source,
        }
    }
}

#[async_trait]
impl RecordStore for JsonlRecordWriter {
    async fn save(&self, record: Record) -> Result<(), StorageError> {
        let mut line = serde_json::to_string(&record)?;
        line.push('\n');

        let _guard = self.lock.lock().await;

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .map_err(|e| self.write_error(e))?;
            }
        }

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| self.write_error(e))?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| self.write_error(e))?;

        debug!("写入记录: {} ({} 字节)", record.kind(), line.len());
        Ok(())
    }
}

/// 内存实现（测试、嵌入式调用）
#[derive(Default)]
pub struct InMemoryRecordStore {
    records: Mutex<Vec<Record>>,
}

impl InMemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn records(&self) -> Vec<Record> {
        self.records.lock().await.clone()
    }

    pub async fn count_kind(&self, kind: &str) -> usize {
        self.records
            .lock()
            .await
            .iter()
            .filter(|r| r.kind() == kind)
            .count()
    }
}

#[async_trait]
impl RecordStore for InMemoryRecordStore {
    async fn save(&self, record: Record) -> Result<(), StorageError> {
        self.records.lock().await.push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::level::Level;
    use crate::models::request::{ItemNo, Request};

    #[tokio::test]
    async fn test_jsonl_writer_appends_lines() {
        let path = std::env::temp_dir().join(format!(
            "csat_records_{}_{}.jsonl",
            std::process::id(),
            chrono::Local::now().timestamp_nanos_opt().unwrap_or_default()
        ));
        let writer = JsonlRecordWriter::new(&path);
        for id in ["r1", "r2"] {
            writer
                .save(Record::Request(Request::new(id, ItemNo::Single(20), Level::Mid)))
                .await
                .unwrap();
        }

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["kind"], "request");
        assert_eq!(first["data"]["id"], "r1");
        assert_eq!(first["data"]["status"], "PENDING");

        std::fs::remove_file(&path).ok();
    }

    #[tokio::test]
    async fn test_in_memory_store() {
        let store = InMemoryRecordStore::new();
        store
            .save(Record::Request(Request::new("r1", ItemNo::Single(20), Level::Mid)))
            .await
            .unwrap();
        assert_eq!(store.count_kind("request").await, 1);
        assert_eq!(store.count_kind("output").await, 0);
    }
}
