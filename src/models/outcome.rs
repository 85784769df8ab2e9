//! 校验结果数据结构

use serde::{Deserialize, Serialize};
use std::fmt;

/// 校验层
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Layer {
    /// 第一层：结构校验
    Structural,
    /// 第二层：内容校验
    Content,
    /// 第三层：题型校验
    Domain,
    /// 第四层：LLM 整体评估
    Holistic,
}

impl Layer {
    pub fn number(self) -> u8 {
        match self {
            Layer::Structural => 1,
            Layer::Content => 2,
            Layer::Domain => 3,
            Layer::Holistic => 4,
        }
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Layer{}", self.number())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Error,
}

/// 单条校验记录
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub severity: Severity,
    pub message: String,
}

impl Finding {
    pub fn info(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Info,
            message: message.into(),
        }
    }

    pub fn warning(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Warning,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
        }
    }
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.severity {
            Severity::Info => write!(f, "{}", self.message),
            Severity::Warning => write!(f, "[WARN] {}", self.message),
            Severity::Error => write!(f, "[FAIL] {}", self.message),
        }
    }
}

/// 单层校验结果
///
/// 日志永远不为空：没有任何发现时写入一条 "OK"，保证可追溯。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidationOutcome {
    pub layer: Layer,
    pub pass: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub score: Option<f64>,
    pub log: Vec<Finding>,
}

impl ValidationOutcome {
    pub fn new(layer: Layer) -> Self {
        Self {
            layer,
            pass: true,
            score: None,
            log: Vec::new(),
        }
    }

    pub fn info(&mut self, message: impl Into<String>) {
        self.log.push(Finding::info(message));
    }

    /// 警告不影响通过与否
    pub fn warn(&mut self, message: impl Into<String>) {
        self.log.push(Finding::warning(message));
    }

    /// 硬失败
    pub fn fail(&mut self, message: impl Into<String>) {
        self.pass = false;
        self.log.push(Finding::error(message));
    }

    pub fn with_score(mut self, score: f64) -> Self {
        self.score = Some(score.clamp(0.0, 100.0));
        self
    }

    /// 收尾：空日志补一条 OK
    pub fn finish(mut self) -> Self {
        if self.log.is_empty() {
            self.log.push(Finding::info("OK"));
        }
        self
    }

    pub fn warning_count(&self) -> usize {
        self.log
            .iter()
            .filter(|f| f.severity == Severity::Warning)
            .count()
    }

    pub fn score_or_zero(&self) -> f64 {
        self.score.unwrap_or(0.0)
    }

    /// 日志渲染成多行文本
    pub fn render_log(&self) -> Vec<String> {
        self.log
            .iter()
            .map(|f| format!("{}: {}", self.layer, f))
            .collect()
    }
}

/// 第四层 LLM 评估结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HolisticReview {
    pub clarity: f64,
    pub completeness: f64,
    pub consistency: f64,
    pub specificity: f64,
    pub domain_appropriateness: f64,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub weaknesses: Vec<String>,
    /// 改写后的 prompt（不是题目）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub improved_prompt: Option<String>,
}

impl HolisticReview {
    /// 五项平均分（0-10）
    pub fn overall(&self) -> f64 {
        let sum = [
            self.clarity,
            self.completeness,
            self.consistency,
            self.specificity,
            self.domain_appropriateness,
        ]
        .iter()
        .map(|s| s.clamp(0.0, 10.0))
        .sum::<f64>();
        sum / 5.0
    }
}

/// 一次尝试失败的归类，供反馈环统计
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Provider,
    Parse,
    Structural,
    Content,
    Domain,
}

impl FailureKind {
    pub const ALL: [FailureKind; 5] = [
        FailureKind::Provider,
        FailureKind::Parse,
        FailureKind::Structural,
        FailureKind::Content,
        FailureKind::Domain,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FailureKind::Provider => "provider",
            FailureKind::Parse => "parse",
            FailureKind::Structural => "structural",
            FailureKind::Content => "content",
            FailureKind::Domain => "domain",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
