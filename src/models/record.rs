//! 持久化记录
//!
//! 所有记录只追加不修改；重新生成靠 `generation` 区分新旧。

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::models::item::CandidateItem;
use crate::models::metrics::{Metrics, PromptPerformance};
use crate::models::outcome::{FailureKind, ValidationOutcome};
use crate::models::request::{Request, RequestId};

/// 单次生成尝试的记录
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AttemptLog {
    pub attempt: u32,
    pub temperature: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure: Option<FailureKind>,
    pub outcomes: Vec<ValidationOutcome>,
    pub metrics: Metrics,
}

impl AttemptLog {
    pub fn passed(&self) -> bool {
        self.failure.is_none()
    }

    /// 所有层的日志拼成文本，方便操作员直接查看
    pub fn render(&self) -> Vec<String> {
        let mut lines = vec![format!(
            "attempt {} (temperature {:.2}): {}",
            self.attempt,
            self.temperature,
            self.failure
                .map(|k| format!("failed ({})", k))
                .unwrap_or_else(|| "passed".to_string())
        )];
        for outcome in &self.outcomes {
            lines.extend(outcome.render_log());
        }
        lines
    }
}

/// 最终通过校验的题目
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Output {
    pub request_id: RequestId,
    pub generation: u32,
    pub prompt_key: String,
    pub item: CandidateItem,
    pub metrics: Metrics,
    pub created_at: DateTime<Local>,
}

/// 评分记录（成功或失败都会保存）
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsRecord {
    pub request_id: RequestId,
    pub generation: u32,
    pub attempt: u32,
    pub metrics: Metrics,
    pub outcomes: Vec<ValidationOutcome>,
    pub recorded_at: DateTime<Local>,
}

impl MetricsRecord {
    pub fn from_attempt(request_id: RequestId, generation: u32, attempt: &AttemptLog) -> Self {
        Self {
            request_id,
            generation,
            attempt: attempt.attempt,
            metrics: attempt.metrics.clone(),
            outcomes: attempt.outcomes.clone(),
            recorded_at: Local::now(),
        }
    }
}

/// 交给持久化层的记录
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", content = "data", rename_all = "snake_case")]
pub enum Record {
    Request(Request),
    Output(Output),
    Metrics(MetricsRecord),
    PromptPerformance(PromptPerformance),
}

impl Record {
    pub fn kind(&self) -> &'static str {
        match self {
            Record::Request(_) => "request",
            Record::Output(_) => "output",
            Record::Metrics(_) => "metrics",
            Record::PromptPerformance(_) => "prompt_performance",
        }
    }
}
