//! 图表数据 - 业务能力层
//!
//! 图表题（25 题）的第三层校验需要图表数据；找不到数据不是错误，返回空对象。

use async_trait::async_trait;
use serde_json::{Map, Value as JsonValue};
use std::collections::HashMap;
use std::path::Path;
use tokio::fs;
use tracing::{debug, warn};

/// 图表存储契约：`getChartData(chartId) → JSON object or {}`
#[async_trait]
pub trait ChartStore: Send + Sync {
    async fn get_chart_data(&self, chart_id: &str) -> JsonValue;
}

/// 内存实现，可从目录下的 `<chart_id>.json` 批量加载
#[derive(Debug, Default, Clone)]
pub struct InMemoryChartStore {
    charts: HashMap<String, JsonValue>,
}

impl InMemoryChartStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, chart_id: impl Into<String>, data: JsonValue) {
        self.charts.insert(chart_id.into(), data);
    }

    /// 加载目录下所有 JSON 文件，坏文件只告警
    pub async fn load_from_dir(folder: &Path) -> anyhow::Result<Self> {
        let mut store = Self::new();
        let mut entries = fs::read_dir(folder).await?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            let chart_id = path
                .file_stem()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string();
            let parsed = fs::read_to_string(&path)
                .await
                .map_err(anyhow::Error::from)
                .and_then(|content| {
                    serde_json::from_str::<JsonValue>(&content).map_err(anyhow::Error::from)
                });
            match parsed {
                Ok(data) => {
                    debug!("加载图表数据: {}", chart_id);
                    store.insert(chart_id, data);
                }
                Err(e) => warn!("图表文件加载失败 {}: {}", path.display(), e),
            }
        }
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.charts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.charts.is_empty()
    }
}

#[async_trait]
impl ChartStore for InMemoryChartStore {
    async fn get_chart_data(&self, chart_id: &str) -> JsonValue {
        match self.charts.get(chart_id) {
            Some(data @ JsonValue::Object(_)) => data.clone(),
            Some(_) => {
                warn!("图表数据不是 JSON 对象，按空数据处理: {}", chart_id);
                JsonValue::Object(Map::new())
            }
            None => JsonValue::Object(Map::new()),
        }
    }
}

/// 图表数据是否为空（空对象、空数组都算空）
pub fn chart_is_empty(data: &JsonValue) -> bool {
    match data {
        JsonValue::Null => true,
        JsonValue::Object(map) => map.is_empty() || map.values().all(chart_is_empty),
        JsonValue::Array(items) => items.is_empty(),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_missing_chart_is_empty_object() {
        let store = InMemoryChartStore::new();
        let data = store.get_chart_data("25").await;
        assert_eq!(data, json!({}));
        assert!(chart_is_empty(&data));
    }

    #[tokio::test]
    async fn test_chart_lookup() {
        let mut store = InMemoryChartStore::new();
        store.insert("25", json!({"rows": [{"year": 2020, "value": 31.5}]}));
        store.insert("bad", json!([1, 2]));
        assert!(!chart_is_empty(&store.get_chart_data("25").await));
        assert_eq!(store.get_chart_data("bad").await, json!({}));
        assert!(chart_is_empty(&json!({"rows": []})));
    }
}
