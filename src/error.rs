//! 错误类型
//!
//! 可重试的错误（`ProviderError` / `ParseError` / 结构校验失败）在编排层被转换成一次
//! 失败的尝试记录，不会冒泡给调用方；只有非法状态迁移、重试耗尽和配置错误会返回给调用方。

use thiserror::Error;

use crate::models::record::AttemptLog;
use crate::models::request::{RequestId, RequestStatus};

/// LLM 提供方错误（网络、配额等）
#[derive(Debug, Clone, Error)]
#[error("LLM 调用失败 (模型: {model}): {message}")]
pub struct ProviderError {
    pub model: String,
    pub message: String,
}

impl ProviderError {
    pub fn new(model: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            message: message.into(),
        }
    }
}

/// 模型输出解析错误
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    /// 响应里找不到 `{...}`
    #[error("响应中没有 JSON 对象 (响应: {preview})")]
    NoJsonObject { preview: String },
    /// JSON 解析失败
    #[error("JSON 解析失败: {message}")]
    InvalidJson { message: String },
}

/// 持久化错误
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("写入记录失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("序列化记录失败: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// 流水线错误
#[derive(Debug, Error)]
pub enum PipelineError {
    /// 非法状态迁移，对该请求是致命错误，不重试
    #[error("非法状态迁移: 请求 {request_id} 当前状态 {current}，无法迁移到 {requested}")]
    InvalidState {
        request_id: RequestId,
        current: RequestStatus,
        requested: RequestStatus,
    },

    #[error("请求不存在: {0}")]
    UnknownRequest(RequestId),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Provider(#[from] ProviderError),

    /// 重试耗尽，附带全部尝试日志
    #[error("重试耗尽: 请求 {request_id} 共尝试 {} 次", attempts.len())]
    RetriesExhausted {
        request_id: RequestId,
        attempts: Vec<AttemptLog>,
    },

    /// 配置错误（缺少密钥、模板等），启动时致命
    #[error("配置错误: {0}")]
    Config(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl PipelineError {
    pub fn config(message: impl Into<String>) -> Self {
        PipelineError::Config(message.into())
    }

    /// 失败请求最后一次尝试的日志
    pub fn last_attempt_log(&self) -> Option<Vec<String>> {
        match self {
            PipelineError::RetriesExhausted { attempts, .. } => {
                attempts.last().map(AttemptLog::render)
            }
            _ => None,
        }
    }
}

/// 流水线结果类型
pub type PipelineResult<T> = Result<T, PipelineError>;
