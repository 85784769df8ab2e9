use serde::Deserialize;
use std::path::Path;

use crate::error::{PipelineError, PipelineResult};

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    /// 单题最大尝试次数（MAX_RETRY）
    pub max_retry: u32,
    /// 同时生成的题目数量
    pub max_concurrent_items: usize,
    /// 首次生成温度
    pub base_temperature: f32,
    /// 每次重试增加的温度
    pub temperature_step: f32,
    /// 温度上限
    pub max_temperature: f32,
    /// 告警所需的最小样本数
    pub alert_min_sample: u64,
    /// 是否启用第四层 LLM 评估
    pub enable_holistic_review: bool,
    /// 任务文件目录
    pub job_folder: String,
    /// prompt 模板目录文件（可选）
    pub prompt_catalog_file: Option<String>,
    /// 图表数据目录（可选）
    pub chart_folder: Option<String>,
    /// 结果保存文件（JSON Lines）
    pub store_file: String,
    /// 输出日志文件
    pub output_log_file: String,
    // --- LLM 配置 ---
    pub llm_api_key: String,
    pub llm_api_base_url: String,
    pub llm_model_name: String,
    /// LLM 客户端内部的网络重试次数
    pub llm_transport_retries: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            max_retry: 3,
            max_concurrent_items: 4,
            base_temperature: 0.7,
            temperature_step: 0.1,
            max_temperature: 1.0,
            alert_min_sample: 5,
            enable_holistic_review: true,
            job_folder: "jobs".to_string(),
            prompt_catalog_file: None,
            chart_folder: None,
            store_file: "output/records.jsonl".to_string(),
            output_log_file: "output.txt".to_string(),
            llm_api_key: String::new(),
            llm_api_base_url: "https://api.openai.com/v1".to_string(),
            llm_model_name: "gpt-4o-mini".to_string(),
            llm_transport_retries: 2,
        }
    }
}

impl Config {
    /// 从环境变量读取，未设置的项使用默认值
    pub fn from_env() -> Self {
        Self::default().overlay_env()
    }

    /// 先读 TOML 文件，再用环境变量覆盖
    pub fn from_toml_file(path: &Path) -> PipelineResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::config(format!("无法读取配置文件 {}: {}", path.display(), e))
        })?;
        let config: Config = toml::from_str(&content).map_err(|e| {
            PipelineError::config(format!("无法解析配置文件 {}: {}", path.display(), e))
        })?;
        Ok(config.overlay_env())
    }

    fn overlay_env(self) -> Self {
        let default = self;
        Self {
            max_retry: env_parse("MAX_RETRY").unwrap_or(default.max_retry),
            max_concurrent_items: env_parse("MAX_CONCURRENT_ITEMS").unwrap_or(default.max_concurrent_items),
            base_temperature: env_parse("BASE_TEMPERATURE").unwrap_or(default.base_temperature),
            temperature_step: env_parse("TEMPERATURE_STEP").unwrap_or(default.temperature_step),
            max_temperature: env_parse("MAX_TEMPERATURE").unwrap_or(default.max_temperature),
            alert_min_sample: env_parse("ALERT_MIN_SAMPLE").unwrap_or(default.alert_min_sample),
            enable_holistic_review: env_parse("ENABLE_HOLISTIC_REVIEW").unwrap_or(default.enable_holistic_review),
            job_folder: std::env::var("JOB_FOLDER").unwrap_or(default.job_folder),
            prompt_catalog_file: std::env::var("PROMPT_CATALOG_FILE").ok().or(default.prompt_catalog_file),
            chart_folder: std::env::var("CHART_FOLDER").ok().or(default.chart_folder),
            store_file: std::env::var("STORE_FILE").unwrap_or(default.store_file),
            output_log_file: std::env::var("OUTPUT_LOG_FILE").unwrap_or(default.output_log_file),
            llm_api_key: std::env::var("LLM_API_KEY").unwrap_or(default.llm_api_key),
            llm_api_base_url: std::env::var("LLM_API_BASE_URL").unwrap_or(default.llm_api_base_url),
            llm_model_name: std::env::var("LLM_MODEL_NAME").unwrap_or(default.llm_model_name),
            llm_transport_retries: env_parse("LLM_TRANSPORT_RETRIES").unwrap_or(default.llm_transport_retries),
        }
    }

    /// 启动前检查，失败即 ConfigError
    pub fn validate(&self) -> PipelineResult<()> {
        if self.llm_api_key.trim().is_empty() {
            return Err(PipelineError::config("缺少 LLM_API_KEY"));
        }
        if self.max_retry == 0 {
            return Err(PipelineError::config("max_retry 必须大于 0"));
        }
        if self.max_concurrent_items == 0 {
            return Err(PipelineError::config("max_concurrent_items 必须大于 0"));
        }
        if self.base_temperature > self.max_temperature {
            return Err(PipelineError::config(format!(
                "base_temperature ({}) 大于 max_temperature ({})",
                self.base_temperature, self.max_temperature
            )));
        }
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|v| v.parse().ok())
}
